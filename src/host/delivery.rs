//! Archive delivery targets.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use super::{Delivery, HostError};

/// Highest numeric suffix tried before falling back to a timestamp.
const MAX_SUFFIX: usize = 1000;

/// Writes archives into a directory, never overwriting an existing file.
///
/// `Dupont.zip` already present → `Dupont_2.zip`, then `Dupont_3.zip`, ...
/// Each candidate is opened with `create_new`, so a file appearing between
/// two deliveries is skipped rather than replaced.
#[derive(Debug, Clone)]
pub struct DirectoryDelivery {
    output_dir: PathBuf,
}

impl DirectoryDelivery {
    /// Creates a delivery target for `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl Delivery for DirectoryDelivery {
    #[instrument(skip(self, bytes), fields(dir = %self.output_dir.display(), bytes = bytes.len()))]
    async fn deliver(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, HostError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| HostError::io(self.output_dir.clone(), e))?;

        let mut last_taken = None;
        for path in candidate_paths(&self.output_dir, file_name) {
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "archive path taken");
                    last_taken = Some(path);
                    continue;
                }
                Err(e) => return Err(HostError::io(path, e)),
            };

            file.write_all(&bytes)
                .await
                .map_err(|e| HostError::io(path.clone(), e))?;
            file.flush()
                .await
                .map_err(|e| HostError::io(path.clone(), e))?;

            info!(path = %path.display(), bytes = bytes.len(), "archive written");
            return Ok(path.display().to_string());
        }

        Err(HostError::io(
            last_taken.unwrap_or_else(|| self.output_dir.clone()),
            std::io::Error::new(ErrorKind::AlreadyExists, "no free archive name"),
        ))
    }
}

/// Keeps delivered archives in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryDelivery {
    delivered: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryDelivery {
    /// Creates an empty in-memory target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every `(file_name, bytes)` delivered so far, in order.
    #[must_use]
    pub fn delivered(&self) -> Vec<(String, Vec<u8>)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of archives delivered so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Delivery for MemoryDelivery {
    async fn deliver(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, HostError> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((file_name.to_string(), bytes));
        Ok(format!("memory:{file_name}"))
    }
}

/// Paths tried in order for `file_name` inside `dir`: the name itself, then
/// `_2` up to [`MAX_SUFFIX`], then a timestamped name.
fn candidate_paths<'a>(dir: &'a Path, file_name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    let file_name = if file_name.contains(['/', '\\']) || file_name.trim_matches('.').is_empty() {
        "attachments.zip"
    } else {
        file_name
    };
    let (stem, ext) = match file_name.rfind('.') {
        Some(pos) => (&file_name[..pos], &file_name[pos..]),
        None => (file_name, ""),
    };

    let suffixed = (2..MAX_SUFFIX).map(move |i| dir.join(format!("{stem}_{i}{ext}")));
    let timestamped = std::iter::once_with(move || {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        dir.join(format!("{stem}_{timestamp}{ext}"))
    });
    std::iter::once(dir.join(file_name))
        .chain(suffixed)
        .chain(timestamped)
}
