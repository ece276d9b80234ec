//! Batch backup: upload local files to an object storage bucket, one session per file.
//!
//! Files are transferred sequentially. A failed file is recorded and the batch moves on;
//! cancellation stops the batch after the file in flight.
//!
//! # Navigation
//! - Main entrypoint: [`backup_files`]
//! - Report types: [`BackupReport`], [`BackedUpFile`], [`FailedBackup`]

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::contract::{Credential, ResumableUploadTransport, UploadTarget};
use crate::error::UploadError;
use crate::source::{content_type_for, FileSource};
use crate::transport::ObjectStorageTransport;
use crate::uploader::ChunkUploader;

#[derive(Debug, Default)]
pub struct BackupReport {
    pub uploaded: Vec<BackedUpFile>,
    pub failed: Vec<FailedBackup>,
    /// Set when cancellation stopped the batch before every file was attempted.
    pub cancelled: bool,
}

impl BackupReport {
    pub fn success_count(&self) -> usize {
        self.uploaded.len()
    }

    pub fn attempted(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

#[derive(Debug, Clone)]
pub struct BackedUpFile {
    pub path: PathBuf,
    pub object_url: String,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct FailedBackup {
    pub path: PathBuf,
    pub cause: String,
}

/// Object name for `path` under `prefix`: `{prefix}/{file name}`.
pub fn object_key(prefix: &str, path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        Some(name.to_string())
    } else {
        Some(format!("{prefix}/{name}"))
    }
}

pub async fn backup_files<T, C>(
    uploader: &ChunkUploader<'_, T>,
    bucket: &str,
    prefix: &str,
    files: &[PathBuf],
    credential: &mut C,
) -> BackupReport
where
    T: ResumableUploadTransport + ?Sized,
    C: Credential + ?Sized,
{
    info!(bucket, prefix, files = files.len(), "[BACKUP] Starting batch backup");
    let mut report = BackupReport::default();

    for (index, path) in files.iter().enumerate() {
        match backup_one(uploader, bucket, prefix, path, credential).await {
            Ok(file) => {
                info!(path = %path.display(), object = %file.object_url, bytes = file.bytes, "[BACKUP] File uploaded");
                report.uploaded.push(file);
            }
            Err(e) if e.is_cancelled() => {
                warn!(path = %path.display(), remaining = files.len() - index, "[BACKUP] Batch cancelled");
                report.failed.push(FailedBackup {
                    path: path.clone(),
                    cause: e.to_string(),
                });
                report.cancelled = true;
                break;
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "[BACKUP][ERROR] File upload failed");
                report.failed.push(FailedBackup {
                    path: path.clone(),
                    cause: e.to_string(),
                });
            }
        }
    }

    info!(
        uploaded = report.success_count(),
        total = files.len(),
        cancelled = report.cancelled,
        "[BACKUP] Batch backup finished"
    );
    report
}

async fn backup_one<T, C>(
    uploader: &ChunkUploader<'_, T>,
    bucket: &str,
    prefix: &str,
    path: &Path,
    credential: &mut C,
) -> Result<BackedUpFile, UploadError>
where
    T: ResumableUploadTransport + ?Sized,
    C: Credential + ?Sized,
{
    let key = object_key(prefix, path).ok_or_else(|| {
        UploadError::Source(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no usable file name", path.display()),
        ))
    })?;
    let mut source = FileSource::open(path).await?;
    let target = UploadTarget::Object {
        bucket: bucket.to_string(),
        key: key.clone(),
    };
    let outcome = uploader
        .upload(target, content_type_for(path), &mut source, credential)
        .await?;
    Ok(BackedUpFile {
        path: path.to_path_buf(),
        object_url: ObjectStorageTransport::object_url(bucket, &key),
        bytes: outcome.bytes_uploaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_joins_prefix_and_file_name() {
        let path = Path::new("/downloads/My Clip.mp4");
        assert_eq!(
            object_key("ytd-backups", path).as_deref(),
            Some("ytd-backups/My Clip.mp4")
        );
        assert_eq!(
            object_key("/nested/dir/", path).as_deref(),
            Some("nested/dir/My Clip.mp4")
        );
        assert_eq!(object_key("", path).as_deref(), Some("My Clip.mp4"));
        assert_eq!(object_key("x", Path::new("/")), None);
    }
}
