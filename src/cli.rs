use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "streamsign")]
#[command(about = "Signing gateway for media playback", version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP gateway
    Server(ServerArgs),
    /// Print a signature token for an item, using the configured secret
    Sign(SignArgs),
    /// Decrypt a signature token and report whether it is still valid
    Verify(VerifyArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// Address to bind to, overrides `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct SignArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    pub item_id: String,

    pub media_source_id: String,

    /// Signature lifetime in seconds, defaults to `play_url_max_alive_secs`
    #[arg(long)]
    pub ttl: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    pub token: String,
}

impl Commands {
    pub fn common(&self) -> &ConfigArgs {
        match self {
            Commands::Server(args) => &args.common,
            Commands::Sign(args) => &args.common,
            Commands::Verify(args) => &args.common,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_args() {
        let cli = Cli::try_parse_from([
            "streamsign",
            "server",
            "--config",
            "/etc/streamsign.toml",
            "--address",
            "127.0.0.1:9000",
        ])
        .unwrap();

        match cli.command {
            Commands::Server(args) => {
                assert_eq!(args.common.config, Some(PathBuf::from("/etc/streamsign.toml")));
                assert_eq!(args.address, Some("127.0.0.1:9000".parse().unwrap()));
                assert_eq!(args.common.log_level, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sign_args() {
        let cli = Cli::try_parse_from(["streamsign", "sign", "42", "s1", "--ttl", "60"]).unwrap();

        match cli.command {
            Commands::Sign(args) => {
                assert_eq!(args.item_id, "42");
                assert_eq!(args.media_source_id, "s1");
                assert_eq!(args.ttl, Some(60));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_sign_requires_both_ids() {
        assert!(Cli::try_parse_from(["streamsign", "sign", "42"]).is_err());
    }
}
