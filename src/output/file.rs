//! File storage for images returned by the backend

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::image::DataUri;

/// Writes decoded images into a single directory
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ensure the output directory exists
    pub async fn ensure_dir(&self) -> Result<()> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            fs::create_dir_all(&self.dir).await?;
            debug!(path = ?self.dir, "Created output directory");
        }
        Ok(())
    }

    /// Decode and save an image, returning the written path
    pub async fn save(&self, image: &DataUri) -> Result<PathBuf> {
        self.save_with_prefix("image", image).await
    }

    /// Like `save`, with a caller-chosen filename prefix
    pub async fn save_with_prefix(&self, prefix: &str, image: &DataUri) -> Result<PathBuf> {
        self.ensure_dir().await?;

        let data = image.decode()?;
        let filename = format!("{}-{}.{}", prefix, Uuid::new_v4(), image.extension());
        let path = self.dir.join(filename);

        fs::write(&path, &data).await?;
        debug!(path = ?path, size = data.len(), mime = %image.mime(), "Saved image file");

        Ok(path)
    }

    /// List file names currently in the output directory
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(files);
        }

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                files.push(name.to_string());
            }
        }
        files.sort();

        Ok(files)
    }
}
