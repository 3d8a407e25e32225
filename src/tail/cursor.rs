// src/tail/cursor.rs

//! Synchronous core of the tail reader: a file handle, a read offset and the
//! bytes of the trailing line that has not been terminated yet.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{classify_io_error, FileAccessError, WatcherError};
use crate::fs::{FileHandle, FileSystem};

/// Size of a single `read` call.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound on bytes consumed per notification. Anything beyond it is left
/// for the next notification.
pub const PER_EVENT_BYTE_CAP: usize = 1024 * 1024;

/// An unterminated line longer than this is emitted as-is.
pub const MAX_PARTIAL_LINE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    pub chunk_size: usize,
    pub per_event_cap: usize,
    pub max_partial_line: usize,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            chunk_size: READ_CHUNK_SIZE,
            per_event_cap: PER_EVENT_BYTE_CAP,
            max_partial_line: MAX_PARTIAL_LINE,
        }
    }
}

/// Result of one notification's worth of reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Complete, non-empty lines in file order.
    pub lines: Vec<String>,
    /// True when the per-event cap stopped the read before end of file.
    pub more_pending: bool,
}

pub struct TailCursor {
    path: PathBuf,
    handle: Box<dyn FileHandle>,
    offset: u64,
    remainder: Vec<u8>,
    limits: ReadLimits,
}

impl std::fmt::Debug for TailCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailCursor")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("remainder_len", &self.remainder.len())
            .finish_non_exhaustive()
    }
}

impl TailCursor {
    /// Open `path` and position the cursor at its current end, so only bytes
    /// appended from now on are reported.
    pub fn open_at_end(
        fs: &dyn FileSystem,
        path: &Path,
        limits: ReadLimits,
    ) -> Result<Self, FileAccessError> {
        let mut handle = fs
            .open(path)
            .map_err(|e| FileAccessError::from_open_error(&e, path))?;
        let offset = handle
            .seek(SeekFrom::End(0))
            .map_err(|_| FileAccessError::Unreadable(path.to_path_buf()))?;

        debug!(?path, offset, "tail cursor opened at end of file");

        Ok(Self {
            path: path.to_path_buf(),
            handle,
            offset,
            remainder: Vec::new(),
            limits,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes of the current unterminated line.
    pub fn pending_fragment(&self) -> &[u8] {
        &self.remainder
    }

    /// Read whatever was appended since the last call, up to the per-event
    /// cap, and return the lines it completes.
    pub fn read_new_lines(&mut self) -> Result<ReadOutcome, WatcherError> {
        let len = self
            .handle
            .seek(SeekFrom::End(0))
            .map_err(|e| classify_io_error(&e, &self.path))?;

        if len < self.offset {
            warn!(
                path = ?self.path,
                old_offset = self.offset,
                new_len = len,
                "file shrank below read cursor; assuming truncation and restarting from the top"
            );
            self.offset = 0;
            self.remainder.clear();
        }

        if len == self.offset {
            return Ok(ReadOutcome::default());
        }

        self.handle
            .seek(SeekFrom::Start(self.offset))
            .map_err(|e| classify_io_error(&e, &self.path))?;

        let bytes = self.read_capped()?;
        self.offset += bytes.len() as u64;
        let more_pending = self.offset < len && bytes.len() >= self.limits.per_event_cap;

        let lines = self.split_lines(bytes);

        Ok(ReadOutcome {
            lines,
            more_pending,
        })
    }

    fn read_capped(&mut self) -> Result<Vec<u8>, WatcherError> {
        let cap = self.limits.per_event_cap;
        let mut out = Vec::new();
        let mut buf = vec![0u8; self.limits.chunk_size.min(cap).max(1)];

        while out.len() < cap {
            let want = (cap - out.len()).min(buf.len());
            let n = self
                .handle
                .read(&mut buf[..want])
                .map_err(|e| classify_io_error(&e, &self.path))?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }

        Ok(out)
    }

    /// Prefix the remainder and split into complete lines, decoding each line
    /// on its own. The trailing unterminated bytes become the new remainder,
    /// so a multi-byte sequence cut by the read is finished next time.
    fn split_lines(&mut self, bytes: Vec<u8>) -> Vec<String> {
        let mut data = std::mem::take(&mut self.remainder);
        data.extend_from_slice(&bytes);

        let (complete, fragment) = match data.iter().rposition(|&b| b == b'\n') {
            Some(idx) => data.split_at(idx + 1),
            None => (&[][..], &data[..]),
        };

        let mut lines = Vec::new();
        for raw in complete.split(|&b| b == b'\n') {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw.is_empty() {
                continue;
            }
            match std::str::from_utf8(raw) {
                Ok(line) => lines.push(line.to_string()),
                Err(e) => warn!(
                    path = ?self.path,
                    bytes = raw.len(),
                    error = %e,
                    "discarding line that is not valid UTF-8"
                ),
            }
        }

        let mut remainder = fragment.to_vec();

        if remainder.len() > self.limits.max_partial_line {
            debug!(
                path = ?self.path,
                len = remainder.len(),
                "unterminated line exceeds limit; emitting it as a line"
            );
            let forced = String::from_utf8_lossy(&remainder).into_owned();
            if !forced.is_empty() {
                lines.push(forced);
            }
            remainder.clear();
        }

        self.remainder = remainder;
        lines
    }
}
