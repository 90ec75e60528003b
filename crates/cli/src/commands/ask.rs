//! `reflexion ask` — Run one reflexion loop and print the answer.

use reflexion_agent::{CancellationToken, LoopRequest, LoopResult, ReflexionAgent};
use reflexion_config::AppConfig;
use reflexion_core::error::Error;

pub async fn run(question: String, trace: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check credentials early — give a clear error
    let missing = config.missing_credentials();
    if !missing.is_empty() {
        eprintln!();
        eprintln!("  ERROR: Missing credentials:");
        for credential in &missing {
            eprintln!("    - {credential}");
        }
        eprintln!();
        eprintln!("  Add them to {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!("  or export them, then run `reflexion doctor`.");
        eprintln!();
        return Err("Missing credentials. See above for setup instructions.".into());
    }

    let provider = reflexion_providers::build_from_config(&config.generation);
    let lookup = reflexion_tools::build_from_config(&config.search);
    let agent = ReflexionAgent::from_config(&config, provider, lookup);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    eprint!("  Researching...");
    let outcome = agent
        .run(
            LoopRequest::new(question)
                .with_cancel(cancel)
                .with_trace(trace),
        )
        .await;
    eprint!("\r                \r");

    let result = match outcome {
        Ok(result) => result,
        Err(Error::Cancelled) => return Err("Cancelled".into()),
        Err(e) => return Err(format!("Reflexion run failed: {e}").into()),
    };

    tracing::debug!(
        iterations = result.iterations,
        messages = result.conversation.messages.len(),
        "Ask finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_plain(&result));
    }

    Ok(())
}

/// Human-readable output: the answer, then the trace when one was requested.
fn render_plain(result: &LoopResult) -> String {
    let mut out = format!("{}\n", result.final_answer);

    if let Some(trace) = &result.trace {
        out.push_str(&format!("\n--- Trace ({} tool rounds) ---\n", result.iterations));
        for record in trace {
            out.push_str(&format!("[{}] {:?}: {}\n", record.step, record.phase, record.summary));
        }
    }

    out
}
