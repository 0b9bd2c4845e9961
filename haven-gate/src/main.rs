#![forbid(unsafe_code)]

use clap::Parser;
use haven_gate_lib::telemetry::init_tracing;
use haven_gate_lib::{load_from_path, run};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Haven gate: screening, rate limiting and access control in front of the app")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "HAVEN_GATE_CONFIG",
        default_value = "config/haven-gate.toml"
    )]
    config: PathBuf,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration {}: {err}", cli.config.display());
            std::process::exit(1);
        }
    };

    if let Err(err) =
        init_tracing(&cfg.logging.level, cfg.logging.show_target, &cfg.telemetry.otel_log_level)
    {
        eprintln!("failed to initialize logging: {err}");
        std::process::exit(1);
    }

    info!(
        listen = ?cfg.listen,
        upstream = %cfg.upstream.address,
        routes = cfg.routes.len(),
        tokens = cfg.security.auth.tokens.len(),
        "configuration loaded"
    );
    if cli.check {
        info!("configuration valid");
        return;
    }

    if let Err(err) = run(Arc::new(cfg)).await {
        error!(%err, "gate exited with error");
        std::process::exit(1);
    }
}
