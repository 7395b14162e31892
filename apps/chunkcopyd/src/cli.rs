use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

/// chunkcopyd - chunkcopy receiving server.
#[derive(Debug, Parser)]
#[command(name = "chunkcopyd", version, about = "Receive files sent by chunkcopy clients")]
pub struct Cli {
    /// Port to listen on
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Address to listen on
    #[arg(short = 'b', long = "bind")]
    pub bind: Option<IpAddr>,

    /// Capacity of the accepted-connection queue
    #[arg(long = "conn-size")]
    pub conn_size: Option<usize>,

    /// Number of connection handler tasks
    #[arg(long = "worker-count")]
    pub worker_count: Option<usize>,

    /// Directory for chunks awaiting reassembly
    #[arg(long = "scratch-dir", value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// TOML file with default settings; flags override it
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_needed() {
        let cli = Cli::try_parse_from(["chunkcopyd"]).unwrap();
        assert!(cli.port.is_none());
        assert!(cli.bind.is_none());
    }

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "chunkcopyd",
            "--port",
            "6000",
            "--bind",
            "127.0.0.1",
            "--conn-size",
            "40",
            "--worker-count",
            "4",
            "--scratch-dir",
            "/var/tmp/cc",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(6000));
        assert_eq!(cli.bind, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(cli.conn_size, Some(40));
        assert_eq!(cli.worker_count, Some(4));
        assert_eq!(cli.scratch_dir, Some(PathBuf::from("/var/tmp/cc")));
    }

    #[test]
    fn rejects_bad_bind_address() {
        assert!(Cli::try_parse_from(["chunkcopyd", "--bind", "not-an-ip"]).is_err());
    }
}
