//! Core of a log-structured user-space filesystem (WFS).
//!
//! The disk is a single fixed-size byte buffer. All mutations are append-only log entries;
//! reads reconstruct live state by scanning the log for the most recent non-deleted record of
//! a given inode number. This crate owns the on-disk format, the log engine, path resolution,
//! the eight filesystem operations, the `mkfs` initializer and the `fsck` compactor. It performs
//! no I/O of its own: callers own the backing buffer (typically a memory-mapped or `read`-loaded
//! file) and hand this crate a mutable byte slice or an owned `Vec<u8>`.

pub mod codec;
pub mod error;
pub mod fsck;
pub mod log;
pub mod ops;
pub mod resolver;

pub use error::{Error, Result};
pub use ops::{mkfs, Filesystem, Stat};
