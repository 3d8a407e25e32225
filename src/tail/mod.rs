// src/tail/mod.rs

//! Tailing of append-only files.
//!
//! A [`TailReader`] owns one file handle, a read cursor and the buffered
//! fragment of an unterminated line. It subscribes to OS change notifications
//! for its file and, on each notification, reads only the bytes appended since
//! the previous read (bounded per notification), emitting complete lines in
//! file order through a [`LineSink`].
//!
//! The reader never retries on failure: it reports a [`WatcherError`] through
//! the sink and stops itself. Recovery belongs to the coordinator.
//!
//! [`WatcherError`]: crate::errors::WatcherError

pub mod changes;
pub mod cursor;
pub mod reader;

pub use changes::{
    ChangeSender, ChangeSource, FileChange, ManualChangeSource, NotifyChangeSource, Subscription,
};
pub use cursor::{ReadLimits, ReadOutcome, TailCursor, PER_EVENT_BYTE_CAP, READ_CHUNK_SIZE};
pub use reader::{LineSink, TailReader};
