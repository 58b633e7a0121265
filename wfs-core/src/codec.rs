//! On-disk record layout and byte-level (de)serialization.
//!
//! Every record is a fixed-size, little-endian, natural-alignment struct copied in and out of
//! the disk buffer field by field. There is no `#[repr(C, packed)]` transmute here: every access
//! goes through bounds-checked slice indexing, so a truncated or corrupt disk image yields a
//! `Corrupt` error instead of an out-of-bounds read.

use crate::error::{Error, Result};

/// Superblock magic number.
pub const WFS_MAGIC: u32 = 0xDEAD_BEEF;
/// Maximum length of a directory entry name, including the null terminator.
pub const MAX_FILE_NAME_LEN: usize = 32;

/// Size in bytes of an on-disk [`Superblock`].
pub const SUPERBLOCK_SIZE: usize = 8;
/// Size in bytes of an on-disk [`Inode`] record.
pub const INODE_SIZE: usize = 11 * 4;
/// Size in bytes of an on-disk [`DirEntry`].
pub const DIRENT_SIZE: usize = MAX_FILE_NAME_LEN + 8;

/// The fixed two-field prefix of the disk: the magic number and the append cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub magic: u32,
    pub head: u32,
}

impl Superblock {
    pub fn read(disk: &[u8]) -> Result<Self> {
        let bytes = disk.get(0..SUPERBLOCK_SIZE).ok_or(Error::Corrupt(0))?;
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let head = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if magic != WFS_MAGIC {
            return Err(Error::BadMagic);
        }
        Ok(Self { magic, head })
    }

    pub fn write(&self, disk: &mut [u8]) {
        disk[0..4].copy_from_slice(&self.magic.to_le_bytes());
        disk[4..8].copy_from_slice(&self.head.to_le_bytes());
    }
}

/// The fixed-size header of a log entry: 11 little-endian `u32` fields in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub inode_number: u32,
    pub deleted: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub flags: u32,
    /// Byte length of the trailing payload of this log entry.
    pub size: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
    pub links: u32,
}

/// `S_IFDIR`, used to distinguish directories from regular files in [`Inode::mode`].
pub const S_IFDIR: u32 = libc::S_IFDIR;
/// `S_IFREG`, used to distinguish directories from regular files in [`Inode::mode`].
pub const S_IFREG: u32 = libc::S_IFREG as u32;
/// Mask isolating the file-type bits of `mode`.
pub const S_IFMT: u32 = libc::S_IFMT as u32;

impl Inode {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Reads the fixed-size inode header at byte offset `off`. Performs no payload bounds
    /// check; callers that need the payload must call [`Inode::total_len`] and verify it
    /// against the disk/`head` bound themselves (see [`crate::log::scan`]).
    pub fn read_at(disk: &[u8], off: u32) -> Result<Self> {
        let off = off as usize;
        let bytes = disk
            .get(off..off.checked_add(INODE_SIZE).ok_or(Error::Corrupt(off as u32))?)
            .ok_or(Error::Corrupt(off as u32))?;
        let mut words = [0u32; 11];
        for (i, word) in words.iter_mut().enumerate() {
            *word = u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }
        Ok(Self {
            inode_number: words[0],
            deleted: words[1],
            mode: words[2],
            uid: words[3],
            gid: words[4],
            flags: words[5],
            size: words[6],
            atime: words[7],
            mtime: words[8],
            ctime: words[9],
            links: words[10],
        })
    }

    pub fn write_at(&self, disk: &mut [u8], off: usize) {
        let words = [
            self.inode_number,
            self.deleted,
            self.mode,
            self.uid,
            self.gid,
            self.flags,
            self.size,
            self.atime,
            self.mtime,
            self.ctime,
            self.links,
        ];
        for (i, word) in words.iter().enumerate() {
            disk[off + i * 4..off + i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
    }

    /// Total size of this log entry (header + payload), checked against overflow.
    pub fn total_len(&self) -> Result<u32> {
        (INODE_SIZE as u32)
            .checked_add(self.size)
            .ok_or(Error::Corrupt(self.inode_number))
    }
}

/// A single fixed-size entry of a directory's payload: a null-terminated name and the inode
/// number it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode_number: u64,
}

impl DirEntry {
    /// Encodes `self` into a fresh [`DIRENT_SIZE`]-byte buffer. Fails [`Error::NameTooLong`] if
    /// the name (plus its null terminator) does not fit.
    pub fn encode(&self) -> Result<[u8; DIRENT_SIZE]> {
        let mut buf = [0u8; DIRENT_SIZE];
        let name_bytes = self.name.as_bytes();
        if name_bytes.len() + 1 > MAX_FILE_NAME_LEN {
            return Err(Error::NameTooLong);
        }
        buf[..name_bytes.len()].copy_from_slice(name_bytes);
        buf[MAX_FILE_NAME_LEN..].copy_from_slice(&self.inode_number.to_le_bytes());
        Ok(buf)
    }

    /// Decodes a single directory entry from an exactly [`DIRENT_SIZE`]-byte slice.
    pub fn decode(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), DIRENT_SIZE);
        let nul = bytes[..MAX_FILE_NAME_LEN]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_FILE_NAME_LEN);
        let name = String::from_utf8_lossy(&bytes[..nul]).into_owned();
        let inode_number = u64::from_le_bytes(bytes[MAX_FILE_NAME_LEN..].try_into().unwrap());
        Self { name, inode_number }
    }
}

/// Encodes a full directory payload (a packed array of [`DirEntry`]) into bytes.
pub fn encode_dir_payload(entries: &[DirEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(entries.len() * DIRENT_SIZE);
    for entry in entries {
        out.extend_from_slice(&entry.encode()?);
    }
    Ok(out)
}

/// Decodes a directory payload into its entries. `payload.len()` must be a multiple of
/// [`DIRENT_SIZE`]; any remainder is ignored rather than panicking, since a corrupt directory
/// should be reported by the caller, not crash the process.
pub fn decode_dir_payload(payload: &[u8]) -> Vec<DirEntry> {
    payload
        .chunks_exact(DIRENT_SIZE)
        .map(DirEntry::decode)
        .collect()
}
