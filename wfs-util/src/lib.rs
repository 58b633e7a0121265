//! This module implements features common to the `mkfs`, `mount` and `fsck` binaries.

pub mod disk;
pub mod prompt;
pub mod util;

use std::fmt;
use std::process::exit;

/// Writes an error to stderr, then exits with status 1.
pub fn error<M: fmt::Display>(bin: &str, msg: M) -> ! {
    eprintln!("{bin}: error: {msg}");
    exit(1);
}
