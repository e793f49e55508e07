//! Affect Engine API server process entry point.

use affect_engine::EngineConfig;
use clap::Parser;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "affect-engine-server", about = "Runs the affect engine as a standalone API server")]
struct Args {
    /// Path to a TOML config file, layered under the built-in defaults.
    #[arg(long, env = "AFFECT_ENGINE_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = EngineConfig::load(args.config.as_deref())?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.server.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("initializing affect engine");
    let engine = match affect_engine::Engine::new(config.clone()) {
        Ok(engine) => engine,
        Err(err) => {
            error!(error = %err, "failed to initialize affect engine");
            return Err(err.into());
        }
    };

    let bind_addr = config.server.bind_addr.clone();
    info!(addr = %bind_addr, "starting affect engine API server");
    affect_engine::start_server(engine, &bind_addr).await?;

    Ok(())
}
