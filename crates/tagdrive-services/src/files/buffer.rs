//! Spill-to-disk upload buffer.
//!
//! Bytes stay in memory up to a threshold and continue into a temporary file after that.
//! Single producer, single consumer: write everything, call [`SpillBuffer::finish`], then
//! turn it into a [`SpillReader`]. The temporary file is removed when the reader first
//! reaches EOF, or when the reader is dropped.

use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use tagdrive_core::AppError;
use tempfile::{NamedTempFile, TempPath};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt, ReadBuf};

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("buffer is finished")]
    Finished,

    #[error("buffer is not finished")]
    NotFinished,

    #[error("temp file error: {0}")]
    Io(#[from] io::Error),
}

impl From<BufferError> for AppError {
    fn from(err: BufferError) -> Self {
        AppError::Internal(err.to_string())
    }
}

struct Spill {
    file: File,
    path: TempPath,
}

pub struct SpillBuffer {
    max_in_memory: usize,
    memory: Vec<u8>,
    spill: Option<Spill>,
    len: u64,
    finished: bool,
}

impl SpillBuffer {
    pub fn new(max_in_memory: usize) -> Self {
        Self {
            max_in_memory,
            memory: Vec::new(),
            spill: None,
            len: 0,
            finished: false,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_spilled(&self) -> bool {
        self.spill.is_some()
    }

    pub async fn write(&mut self, mut data: &[u8]) -> Result<(), BufferError> {
        if self.finished {
            return Err(BufferError::Finished);
        }
        self.len += data.len() as u64;

        if self.spill.is_none() {
            let room = self.max_in_memory.saturating_sub(self.memory.len());
            if data.len() <= room {
                self.memory.extend_from_slice(data);
                return Ok(());
            }

            self.memory.extend_from_slice(&data[..room]);
            data = &data[room..];

            let (file, path) = NamedTempFile::new()?.into_parts();
            tracing::debug!(path = %path.display(), "Upload spilled to temp file");
            self.spill = Some(Spill {
                file: File::from_std(file),
                path,
            });
        }

        if let Some(spill) = self.spill.as_mut() {
            spill.file.write_all(data).await?;
        }
        Ok(())
    }

    /// Ends writing. Further writes fail with [`BufferError::Finished`].
    pub async fn finish(&mut self) -> Result<(), BufferError> {
        if let Some(spill) = self.spill.as_mut() {
            spill.file.flush().await?;
            spill.file.seek(SeekFrom::Start(0)).await?;
        }
        self.finished = true;
        Ok(())
    }

    /// Fails with [`BufferError::NotFinished`] before [`SpillBuffer::finish`].
    pub fn into_reader(self) -> Result<SpillReader, BufferError> {
        if !self.finished {
            return Err(BufferError::NotFinished);
        }
        Ok(SpillReader {
            memory: self.memory,
            pos: 0,
            spill: self.spill,
        })
    }
}

/// Yields the in-memory part first, then the spilled file.
pub struct SpillReader {
    memory: Vec<u8>,
    pos: usize,
    spill: Option<Spill>,
}

impl SpillReader {
    pub fn temp_path(&self) -> Option<&std::path::Path> {
        self.spill.as_ref().map(|s| s.path.as_ref())
    }
}

impl AsyncRead for SpillReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        if this.pos < this.memory.len() {
            let n = buf.remaining().min(this.memory.len() - this.pos);
            buf.put_slice(&this.memory[this.pos..this.pos + n]);
            this.pos += n;
            return Poll::Ready(Ok(()));
        }

        let Some(spill) = this.spill.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let before = buf.filled().len();
        match Pin::new(&mut spill.file).poll_read(cx, buf) {
            Poll::Ready(Ok(())) if buf.filled().len() == before && buf.remaining() > 0 => {
                if let Some(spill) = this.spill.take() {
                    drop(spill.file);
                    if let Err(e) = spill.path.close() {
                        tracing::warn!(error = %e, "Failed to remove upload temp file");
                    }
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}
