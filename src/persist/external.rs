//! External target: a user-granted location outside the local cache.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::TargetError;

/// File written inside a granted directory.
pub const BACKUP_FILE_NAME: &str = "tasks-backup.json";

/// A writable location the user has granted access to.
///
/// Handles are never persisted; after a restart the user grants again.
#[async_trait]
pub trait ExternalTarget: Send + Sync + std::fmt::Debug {
    /// Name shown to the user and remembered across restarts.
    fn display_name(&self) -> String;

    async fn write(&self, contents: &str) -> Result<(), TargetError>;

    /// Current contents, or `None` if nothing has been written yet.
    async fn read(&self) -> Result<Option<String>, TargetError>;
}

/// A directory on the local file system.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

fn classify(err: std::io::Error, what: &Path) -> TargetError {
    match err.kind() {
        ErrorKind::PermissionDenied | ErrorKind::NotFound => TargetError::PermissionDenied(what.display().to_string()),
        _ => TargetError::Io(err),
    }
}

impl DirectoryTarget {
    /// Grant access to `dir`. Fails if it is missing, not a directory or read-only.
    pub async fn grant(dir: impl Into<PathBuf>) -> Result<Self, TargetError> {
        let dir = dir.into();
        let meta = tokio::fs::metadata(&dir).await.map_err(|e| classify(e, &dir))?;
        if !meta.is_dir() || meta.permissions().readonly() {
            return Err(TargetError::PermissionDenied(dir.display().to_string()));
        }
        Ok(DirectoryTarget { dir })
    }

    pub fn file_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE_NAME)
    }

    /// The grant lapses when the directory disappears.
    async fn check_access(&self) -> Result<(), TargetError> {
        tokio::fs::metadata(&self.dir)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, &self.dir))
    }
}

#[async_trait]
impl ExternalTarget for DirectoryTarget {
    fn display_name(&self) -> String {
        self.dir.display().to_string()
    }

    async fn write(&self, contents: &str) -> Result<(), TargetError> {
        self.check_access().await?;
        let path = self.file_path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await.map_err(|e| classify(e, &self.dir))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| classify(e, &self.dir))?;
        Ok(())
    }

    async fn read(&self) -> Result<Option<String>, TargetError> {
        self.check_access().await?;
        match tokio::fs::read_to_string(self.file_path()).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(classify(e, &self.dir)),
        }
    }
}
