// src/services/downloads.rs
use crate::errors::DashboardError;
use crate::services::api_client::{DownloadKind, VideoApi};
use bytes::Bytes;
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Saves downloaded blobs into a directory.
///
/// Each blob is staged in a temp file next to its destination and renamed
/// into place once fully written. The staging file is removed on every
/// failure path, so repeated downloads never leave partial files behind.
#[derive(Debug, Clone)]
pub struct Downloader {
    dir: PathBuf,
}

impl Downloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn download(
        &self,
        api: &dyn VideoApi,
        task_id: &str,
        kind: DownloadKind,
        filename: Option<&str>,
    ) -> Result<PathBuf, DashboardError> {
        let blob = api.download(task_id, kind).await?;
        let name = filename
            .map(str::to_string)
            .unwrap_or_else(|| kind.default_filename(task_id));
        let path = self.save(&name, blob).await?;
        info!("Saved {:?} for task {} to {}", kind, task_id, path.display());
        Ok(path)
    }

    pub async fn save(&self, filename: &str, blob: Bytes) -> Result<PathBuf, DashboardError> {
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| DashboardError::Validation(format!("Invalid file name: {}", filename)))?
            .to_owned();
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || -> Result<PathBuf, DashboardError> {
            std::fs::create_dir_all(&dir)?;
            let target = dir.join(name);

            let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
            staged.write_all(&blob)?;
            staged.as_file().sync_all()?;
            staged
                .persist(&target)
                .map_err(|e| DashboardError::Io(e.error.to_string()))?;
            Ok(target)
        })
        .await
        .map_err(|e| DashboardError::Io(format!("Download writer failed: {}", e)))?
    }
}
