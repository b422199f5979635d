//! # Tab Bridge Host
//!
//! Launched by the browser as a native messaging host. stdin and stdout
//! carry protocol frames, so every log line goes to stderr.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, `TAB_BRIDGE_CONFIG` file, environment)
//! 2. Initialize logging on stderr
//! 3. Start the HTTP gateway on an OS-assigned loopback port
//! 4. Serve frames until the browser closes stdin
//!
//! Exit status is 0 when the browser closes the stream and 1 after a
//! transport failure.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tab_bridge::domain::config::LoggingConfig;
use tab_bridge::{BridgeConfig, BridgeService, FrameWriter};

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&logging.level)
        .with_context(|| format!("invalid log filter {:?}", logging.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = BridgeConfig::from_env().context("failed to load configuration")?;
    init_logging(&config.logging)?;

    info!(version = tab_bridge::VERSION, "Starting tab bridge");

    let sender = Arc::new(FrameWriter::new(tokio::io::stdout()));
    let service = BridgeService::new(config, sender)?;

    // Held for the life of the process; exit tears the listener down.
    let _http = service.start_http().await;
    let result = service.run(tokio::io::stdin()).await;
    let code = BridgeService::exit_code(&result);

    info!(exit_code = code, "Tab bridge stopped");
    std::process::exit(code);
}
