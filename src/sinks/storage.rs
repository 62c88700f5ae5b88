//! JSON-lines persistence sink.
//!
//! Each record becomes one line of JSON appended to the configured file. The
//! file (and its parent directories) are created on first delivery. Writes are
//! serialized through a mutex so concurrent deliveries never interleave lines.

use super::Sink;
use crate::error::Result;
use crate::telemetry::TelemetryRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct FileStore {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(file)
    }

    /// Reads back every record stored at `path`. Blank lines are skipped.
    pub async fn load(path: impl AsRef<Path>) -> Result<Vec<TelemetryRecord>> {
        let contents = tokio::fs::read_to_string(path).await?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl Sink for FileStore {
    fn name(&self) -> &str {
        "storage"
    }

    async fn deliver(&self, record: &TelemetryRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        let mut file = match guard.take() {
            Some(file) => file,
            None => self.open().await?,
        };

        file.write_all(&line).await?;
        file.flush().await?;

        // Only a handle that just wrote successfully is kept; a failed one is
        // dropped so the next delivery reopens the path.
        *guard = Some(file);
        Ok(())
    }
}
