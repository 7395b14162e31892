use std::path::PathBuf;

use clap::Parser;

/// chunkcopy - copy a file to a chunkcopy server.
#[derive(Debug, Parser)]
#[command(name = "chunkcopy", version, about = "Copy a local file to a chunkcopy server")]
pub struct Cli {
    /// Destination server host and port (eg. localhost:5678)
    #[arg(long = "destination-address", value_name = "HOST:PORT")]
    pub destination_address: Option<String>,

    /// Local file to copy
    #[arg(long = "local-file", value_name = "PATH")]
    pub local_file: PathBuf,

    /// Remote file at the destination
    #[arg(long = "remote-file", value_name = "PATH")]
    pub remote_file: String,

    /// Multipart chunk size in bytes
    #[arg(long = "chunk-size", value_name = "BYTES")]
    pub chunk_size: Option<u64>,

    /// Number of concurrent upload workers
    #[arg(long = "worker-count")]
    pub worker_count: Option<usize>,

    /// TOML file with default settings; flags override it
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}
