use clap::Parser;
use kubectl_ai::{cli::Cli, config};
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> kubectl_ai::Result<()> {
    let cli = Cli::parse();

    cli.init_logging();

    let config = config::load_config(cli.config.as_deref())?;

    kubectl_ai::run_command(cli, config).await
}
