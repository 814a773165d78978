//! Durable storage for rendered artifacts.

use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, error, info, instrument};

/// Persists named byte blobs, overwriting whatever was stored under the name.
pub trait Sink {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), Box<dyn Error>>;

    /// Previously stored content, or `None` when nothing exists under `name`.
    async fn read(&self, name: &str) -> Result<Option<String>, Box<dyn Error>>;
}

/// Files inside one output directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Sink for FileSink {
    /// Write to a temporary sibling, then rename over the destination.
    #[instrument(level = "info", skip(self, bytes), fields(bytes = bytes.len()))]
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
        let path = self.path(name);
        let tmp = self.path(&format!(".{name}.tmp"));

        if let Err(e) = fs::write(&tmp, bytes).await {
            error!(path = %tmp.display(), error = %e, "Failed to write temporary file");
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            error!(path = %path.display(), error = %e, "Failed to move file into place");
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        info!(path = %path.display(), "Wrote output");
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn read(&self, name: &str) -> Result<Option<String>, Box<dyn Error>> {
        let path = self.path(name);
        match fs::read_to_string(&path).await {
            Ok(text) => {
                debug!(path = %path.display(), bytes = text.len(), "Loaded previous output");
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
