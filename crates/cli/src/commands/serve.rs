//! `reflexion serve` — Start the HTTP API server.

use reflexion_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Reflexion Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:   {} ({})", config.generation.provider, config.generation.model);
    println!("   Search:     {}", config.search.provider);
    println!("   Iterations: {}", config.agent.max_iterations);

    reflexion_gateway::start(config).await?;

    Ok(())
}
