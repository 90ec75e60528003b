//! `reflexion doctor` — Diagnose configuration and credentials.

use reflexion_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Reflexion Doctor — System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ok    Config file found: {}", config_path.display());
    } else {
        println!("  warn  No config file, using defaults (run `reflexion onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ok    Configuration valid");
            config
        }
        Err(e) => {
            println!("  FAIL  Configuration invalid: {e}");
            println!("\n  1 issue(s) found. Fix the config before running other checks.");
            return Ok(());
        }
    };

    println!(
        "  info  Generation: {} / {} (timeout {}s)",
        config.generation.provider, config.generation.model, config.generation.timeout_secs
    );
    println!(
        "  info  Search:     {} (max {} results, {})",
        config.search.provider,
        config.search.max_results,
        if config.search.concurrent { "concurrent" } else { "sequential" }
    );
    println!(
        "  info  Agent:      {} iterations, persona \"{}\"",
        config.agent.max_iterations, config.agent.persona
    );

    let missing = config.missing_credentials();
    for credential in &missing {
        println!("  FAIL  Missing credential: {credential}");
        issues += 1;
    }
    if missing.is_empty() {
        println!("  ok    Credentials configured");
    }

    // Only probe the backend when it has a chance of answering.
    let generation_ready = !missing.iter().any(|m| m.starts_with("generation."));
    if generation_ready {
        let provider = reflexion_providers::build_from_config(&config.generation);
        match provider.health_check().await {
            Ok(true) => println!("  ok    Generation backend reachable ({})", provider.name()),
            Ok(false) => {
                println!("  FAIL  Generation backend answered but is not healthy");
                issues += 1;
            }
            Err(e) => {
                println!("  FAIL  Generation backend unreachable: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
