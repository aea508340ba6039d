use aegis_deploy::cli::{self, Cli};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(err) = cli::run(cli) {
        error!("{:#}", err);
        std::process::exit(cli::exit_code(&err));
    }
}
