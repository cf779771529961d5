use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

use crate::CliError;

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// With a log file, events are appended as JSON lines with RFC 3339 UTC
/// timestamps; otherwise they go to stderr in the human-readable format.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logging(log_file: Option<&Path>) -> Result<(), CliError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let file = Arc::new(Mutex::new(file));
            let make_writer = BoxMakeWriter::new(move || SharedWriter {
                file: Arc::clone(&file),
            });

            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_writer(make_writer);

            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
        None => {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
    };

    result.map_err(|err| CliError::Logging(err.to_string()))
}

struct SharedWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "failed to lock log file"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "failed to lock log file"))?;
        file.flush()
    }
}
