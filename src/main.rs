mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use factorbox::{api, observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => api::run(args.address, args.config).await?,
    }

    Ok(())
}
