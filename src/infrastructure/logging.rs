use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE: &str = "taxwiz.log";

static TRACING_INIT: Once = Once::new();

/// Installs the global tracing subscriber, writing to `<data_dir>/taxwiz.log`.
///
/// The terminal is owned by the UI, so log lines never go to stdout or
/// stderr. `RUST_LOG` overrides the default `taxwiz=info` filter.
pub fn init_tracing(data_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(data_dir)?;
    let path = data_dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("taxwiz=info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init();
        tracing::info!("taxwiz tracing initialized");
    });

    Ok(path)
}
