use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP gateway for monitoring external commands", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Overrides the listen address (e.g. "127.0.0.1:7760").
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Logs commands instead of writing them to the command file.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Uses a JSON layer for logs (`--features json-logs`).
    #[arg(long, action = ArgAction::SetTrue)]
    pub json_logs: bool,

    /// Explicit log filter (e.g. "arbiter_gateway=debug").
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Validates the configuration and exits.
    #[arg(long, action = ArgAction::SetTrue)]
    pub check_config: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "arbiter-gateway",
            "--listen",
            "127.0.0.1:9000",
            "--dry-run",
            "--check-config",
        ])
        .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(cli.listen.map(|addr| addr.port()), Some(9000));
        assert!(cli.dry_run);
        assert!(cli.check_config);
        assert!(cli.config.is_none());
    }

    #[test]
    fn rejects_bad_listen_address() {
        assert!(Cli::try_parse_from(["arbiter-gateway", "--listen", "nowhere"]).is_err());
    }
}
