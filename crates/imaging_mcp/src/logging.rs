use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use tracing_subscriber::{
    EnvFilter,
    fmt::writer::{BoxMakeWriter, MakeWriterExt},
};

use crate::config::LogConfig;
use crate::error::ServerError;

pub const LOG_FILE_NAME: &str = "imaging-mcp-server.log";

/// Install the global subscriber. Logs go to stderr because stdout carries
/// the stdio protocol; with capture on they are also appended to a file.
pub fn init_logging(config: &LogConfig) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let writer = if config.capture {
        fs::create_dir_all(&config.directory)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.directory.join(LOG_FILE_NAME))?;
        BoxMakeWriter::new(std::io::stderr.and(Mutex::new(file)))
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| ServerError::Logging(e.to_string()))
}
