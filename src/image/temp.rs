//! Local spool for uploaded image bytes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::image::ImageError;

const FILE_NAME_BYTES: usize = 16;

/// Writes incoming image bytes under a spool directory and removes them
/// once the remote copy is authoritative.
#[derive(Clone, Debug)]
pub struct TempStorage {
    dir: PathBuf,
}

impl TempStorage {
    /// Create a new [`TempStorage`] rooted at `dir`. The directory is
    /// created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist `bytes` to a fresh file and return its path.
    pub async fn write(&self, bytes: &[u8]) -> Result<PathBuf, ImageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(ImageError::Storage)?;

        let mut name = [0u8; FILE_NAME_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut name);
        let path = self.dir.join(format!("{}.img", hex::encode(name)));

        tokio::fs::write(&path, bytes)
            .await
            .map_err(ImageError::Storage)?;

        Ok(path)
    }

    /// Remove a spooled file. Removing a path that no longer exists is
    /// not an error.
    pub async fn remove(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(), ImageError> {
        match tokio::fs::remove_file(path.as_ref()).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ImageError::Storage(err)),
        }
    }
}
