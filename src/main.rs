use clap::Parser;
use tracing_subscriber::EnvFilter;

use tasknest::cli::commands::Cli;
use tasknest::cli::handlers;
use tasknest::io::config_io;

/// Environment variable holding a tracing filter, e.g. `tasknest=debug`
const LOG_ENV: &str = "TASKNEST_LOG";

fn main() {
    let cli = Cli::parse();

    let mut config = match config_io::load_config(&config_io::config_path()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let filter = std::env::var(LOG_ENV)
        .ok()
        .or_else(|| config.log.filter.clone())
        .unwrap_or_else(|| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    config_io::apply_overrides(
        &mut config,
        std::env::var(config_io::API_URL_ENV).ok(),
        cli.api_url.as_deref(),
    );

    if let Err(e) = handlers::dispatch(cli, config) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
