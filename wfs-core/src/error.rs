//! The core's error type and its conversions to the two boundaries that consume it:
//! a POSIX errno for the FUSE adapter, and [`std::io::Error`] for the `mkfs`/`fsck` binaries.

use std::io;

/// Errors produced by the log engine, path resolver and filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A path component did not resolve to any directory entry.
    #[error("no such file or directory")]
    NotFound,
    /// Attempted to create a name that already exists in its parent directory.
    #[error("file exists")]
    Exists,
    /// A path component (or a `readdir` target) is not a directory.
    #[error("not a directory")]
    NotDir,
    /// A `read`/`write` target is a directory.
    #[error("is a directory")]
    IsDir,
    /// A `rmdir` target still has live children.
    #[error("directory not empty")]
    NotEmpty,
    /// A name does not fit in [`crate::codec::MAX_FILE_NAME_LEN`] bytes including its terminator.
    #[error("file name too long")]
    NameTooLong,
    /// The append would advance `head` past `DISK_SIZE`.
    #[error("no space left on device")]
    NoSpace,
    /// The superblock's magic number did not match [`crate::codec::WFS_MAGIC`].
    #[error("bad magic number")]
    BadMagic,
    /// An inode number given to a handle-based operation is out of range.
    #[error("bad file descriptor")]
    BadFd,
    /// A bounds or framing check on the log failed: a record's header or payload would read
    /// past `head`/`DISK_SIZE`. Surfaces corruption instead of panicking or overreading.
    #[error("corrupt log entry at offset {0}")]
    Corrupt(u32),
    /// Propagated failure from the underlying backing file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// The POSIX errno this error corresponds to at the FUSE boundary.
    pub fn to_errno(&self) -> i32 {
        match self {
            Error::NotFound => libc::ENOENT,
            Error::Exists => libc::EEXIST,
            Error::NotDir => libc::ENOTDIR,
            Error::IsDir => libc::EISDIR,
            Error::NotEmpty => libc::ENOTEMPTY,
            Error::NameTooLong => libc::ENAMETOOLONG,
            Error::NoSpace => libc::ENOSPC,
            Error::BadMagic => libc::EINVAL,
            Error::BadFd => libc::EBADF,
            Error::Corrupt(_) => libc::EIO,
            Error::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            e => io::Error::from_raw_os_error(e.to_errno()),
        }
    }
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
