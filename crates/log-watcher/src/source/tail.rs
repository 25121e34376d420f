//! Watermark tracking for tailed files
//!
//! The watermark is the byte offset up to which a file has been consumed.
//! It only moves by the number of bytes actually read, so it never exceeds the
//! size observed at the start of the read.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::split_lines;

/// Upper bound on bytes consumed from one file per tick
const MAX_READ_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug)]
pub(crate) struct TailState {
    path: PathBuf,
    watermark: u64,
}

impl TailState {
    /// Starts at the current end of `path`, or at zero if it does not exist yet.
    pub(crate) async fn at_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let watermark = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        Self { path, watermark }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Reads everything appended since the last call.
    ///
    /// A file smaller than the watermark is treated as rotated and read from
    /// offset zero. A missing file surfaces as `NotFound`.
    pub(crate) async fn read_new_lines(&mut self) -> std::io::Result<Vec<String>> {
        let size = tokio::fs::metadata(&self.path).await?.len();

        if size < self.watermark {
            tracing::info!(
                path = %self.path.display(),
                previous = self.watermark,
                size,
                "file shrank, assuming rotation"
            );
            self.watermark = 0;
        }

        if size == self.watermark {
            return Ok(Vec::new());
        }

        let pending = size - self.watermark;
        let budget = pending.min(MAX_READ_BYTES);

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.watermark)).await?;

        let mut buf = Vec::with_capacity(usize::try_from(budget).unwrap_or(0));
        file.take(budget).read_to_end(&mut buf).await?;

        // a capped read stops at the last complete line when there is one
        if budget < pending
            && let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n')
        {
            buf.truncate(last_newline + 1);
        }

        self.watermark += buf.len() as u64;
        Ok(split_lines(&buf))
    }
}
