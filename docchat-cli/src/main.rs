use clap::Parser;
use docchat_cli::{Cli, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    telemetry::init(cli.verbose, cli.quiet);

    docchat_cli::run(cli).await
}
