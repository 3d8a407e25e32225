// src/fs/mock.rs

use super::{FileHandle, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Paths whose open/read fail with `PermissionDenied`.
    denied: HashSet<PathBuf>,
    /// Paths whose open handles fail every read/seek (simulated EBADF).
    broken: HashSet<PathBuf>,
    /// Paths whose handle reads block until released.
    stalled: HashSet<PathBuf>,
    /// Reads currently blocked on a stalled path.
    waiting: usize,
}

/// In-memory filesystem for tests.
///
/// Open handles read the *live* content, so appends made after `open` are
/// visible to the handle, and removing a file makes its handles fail with
/// `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.lock()
            .entries
            .insert(path.as_ref().to_path_buf(), MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.lock()
            .entries
            .insert(path.as_ref().to_path_buf(), MockEntry::Dir);
    }

    /// Append bytes to an existing file (creating it if needed).
    pub fn append(&self, path: impl AsRef<Path>, bytes: impl AsRef<[u8]>) {
        let mut state = self.lock();
        let entry = state
            .entries
            .entry(path.as_ref().to_path_buf())
            .or_insert_with(|| MockEntry::File(Vec::new()));
        if let MockEntry::File(content) = entry {
            content.extend_from_slice(bytes.as_ref());
        }
    }

    /// Shrink a file to `len` bytes (copy-truncate rotation).
    pub fn truncate(&self, path: impl AsRef<Path>, len: usize) {
        if let Some(MockEntry::File(content)) = self.lock().entries.get_mut(path.as_ref()) {
            content.truncate(len);
        }
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.lock().entries.remove(path.as_ref());
    }

    pub fn deny(&self, path: impl AsRef<Path>) {
        self.lock().denied.insert(path.as_ref().to_path_buf());
    }

    pub fn break_handles(&self, path: impl AsRef<Path>) {
        self.lock().broken.insert(path.as_ref().to_path_buf());
    }

    /// Make reads through open handles of `path` block until
    /// [`release_reads`](Self::release_reads).
    pub fn stall_reads(&self, path: impl AsRef<Path>) {
        self.lock().stalled.insert(path.as_ref().to_path_buf());
    }

    pub fn release_reads(&self, path: impl AsRef<Path>) {
        self.lock().stalled.remove(path.as_ref());
    }

    /// Number of reads currently blocked by `stall_reads`.
    pub fn stalled_reads(&self) -> usize {
        self.lock().waiting
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }
}

/// Access check shared by `open` and handle reads.
fn check_file(state: &MockState, path: &Path) -> io::Result<usize> {
    if state.broken.contains(path) {
        return Err(io::Error::other("bad file descriptor"));
    }
    if state.denied.contains(path) {
        return Err(io::Error::from(io::ErrorKind::PermissionDenied));
    }
    match state.entries.get(path) {
        Some(MockEntry::File(content)) => Ok(content.len()),
        Some(MockEntry::Dir) => Err(io::Error::from(io::ErrorKind::IsADirectory)),
        None => Err(io::Error::from(io::ErrorKind::NotFound)),
    }
}

#[derive(Debug)]
struct MockHandle {
    state: Arc<Mutex<MockState>>,
    path: PathBuf,
    pos: u64,
}

impl Read for MockHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut counted = false;
        loop {
            {
                let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
                if !state.stalled.contains(&self.path) {
                    if counted {
                        state.waiting -= 1;
                    }
                    break;
                }
                if !counted {
                    state.waiting += 1;
                    counted = true;
                }
            }
            thread::sleep(Duration::from_millis(1));
        }

        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        check_file(&state, &self.path)?;
        let Some(MockEntry::File(content)) = state.entries.get(&self.path) else {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        };
        let start = (self.pos as usize).min(content.len());
        let n = (content.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&content[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MockHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let len = check_file(&state, &self.path)? as i64;
        let target = match pos {
            SeekFrom::Start(off) => off as i64,
            SeekFrom::End(off) => len + off,
            SeekFrom::Current(off) => self.pos as i64 + off,
        };
        if target < 0 {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl FileSystem for MockFileSystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        check_file(&self.lock(), path)?;
        Ok(Box::new(MockHandle {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
            pos: 0,
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir))
    }

    fn is_readable(&self, path: &Path) -> bool {
        check_file(&self.lock(), path).is_ok()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }
}
