//! Byte sources: random-access readers over local files or in-memory buffers.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::contract::ByteSource;

/// Content type for a file, derived from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

fn check_range(offset: u64, length: u64, len: u64) -> io::Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= len => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("range {offset}+{length} exceeds source length {len}"),
        )),
    }
}

/// A local file. The handle is closed when the source is dropped.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
    len: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        let len = file.metadata().await?.len();
        Ok(Self { path, file, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_range(&mut self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        check_range(offset, length, self.len)?;
        let length = usize::try_from(length)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; length];
        self.file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

/// An in-memory buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&mut self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        check_range(offset, length, self.len())?;
        let start = offset as usize;
        Ok(self.data[start..start + length as usize].to_vec())
    }
}
