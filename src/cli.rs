use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "factorbox")]
#[command(about = "Asynchronous integer factorization service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API together with the dispatcher and worker pool
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (defaults to `server.bind_addr`)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// TOML configuration file (defaults to `$FACTORBOX_CONFIG` or `config/factorbox.toml`)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_args() {
        let cli = Cli::parse_from(["factorbox", "server", "--address", "127.0.0.1:7000"]);
        let Commands::Server(args) = cli.command;
        assert_eq!(args.address, Some("127.0.0.1:7000".parse().unwrap()));
        assert!(args.config.is_none());
    }
}
