use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(about = "Per-user profile photo storage service")]
pub struct Args {
    /// Host to bind the HTTP server to.
    #[arg(long, env = "FOTKA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP server to.
    #[arg(long, env = "FOTKA_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory holding the photo database. When omitted, photos are kept
    /// in a temporary directory that is discarded on shutdown.
    #[arg(long, env = "FOTKA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}
