//! The log engine: append, scan, and MVCC-style latest-record resolution.
//!
//! These three primitives (`scan`, `latest_live_inode`, `max_inode_number`) are the only reads
//! of disk state anywhere in this crate. None of them cache; every call rescans from
//! `SUPERBLOCK_SIZE` to `head`, which is the cost this design accepts in exchange for never
//! needing to keep an index in sync with the log.

use crate::codec::{Inode, Superblock, INODE_SIZE, SUPERBLOCK_SIZE};
use crate::error::{Error, Result};

/// A single log entry as returned by [`scan`]: its byte offset, decoded header, and a borrowed
/// slice over its payload.
pub struct Entry<'a> {
    pub offset: u32,
    pub inode: Inode,
    pub payload: &'a [u8],
}

/// Scans the log from the first entry (immediately after the superblock) up to `head`,
/// returning each entry in order. Bounds-checks every step: a record whose declared `size`
/// would read past `head` yields [`Error::Corrupt`] instead of panicking or reading garbage.
pub fn scan(disk: &[u8], head: u32) -> impl Iterator<Item = Result<Entry<'_>>> {
    let mut pos = SUPERBLOCK_SIZE as u32;
    std::iter::from_fn(move || {
        if pos >= head {
            return None;
        }
        let inode = match Inode::read_at(disk, pos) {
            Ok(inode) => inode,
            Err(e) => return Some(Err(e)),
        };
        let total_len = match inode.total_len() {
            Ok(len) => len,
            Err(e) => return Some(Err(e)),
        };
        let end = match pos.checked_add(total_len) {
            Some(end) if end <= head => end,
            _ => return Some(Err(Error::Corrupt(pos))),
        };
        let payload_start = (pos as usize) + INODE_SIZE;
        let payload = &disk[payload_start..end as usize];
        let entry = Entry {
            offset: pos,
            inode,
            payload,
        };
        pos = end;
        Some(Ok(entry))
    })
}

/// Returns the most recently appended non-deleted record for `inode_number`, or `None` if the
/// inode has never existed or only deleted records remain. Ties (which cannot occur, since
/// offsets strictly increase while scanning) are broken in favor of the higher offset.
pub fn latest_live_inode(disk: &[u8], head: u32, inode_number: u32) -> Result<Option<Inode>> {
    let mut latest: Option<Inode> = None;
    for entry in scan(disk, head) {
        let entry = entry?;
        if entry.inode.inode_number == inode_number {
            latest = if entry.inode.deleted == 0 {
                Some(entry.inode)
            } else {
                None
            };
        }
    }
    Ok(latest)
}

/// Returns the latest record (live or deleted) for `inode_number`, with its payload, or `None`.
/// Used by operations that need the current payload to build the next log entry (e.g.
/// directory-entry rewrites), which must see the inode even across interleaved log entries for
/// other inodes.
pub fn latest_entry_payload(disk: &[u8], head: u32, inode_number: u32) -> Result<Option<Vec<u8>>> {
    let mut latest: Option<(Inode, Vec<u8>)> = None;
    for entry in scan(disk, head) {
        let entry = entry?;
        if entry.inode.inode_number == inode_number {
            latest = Some((entry.inode, entry.payload.to_vec()));
        }
    }
    Ok(latest.filter(|(inode, _)| inode.deleted == 0).map(|(_, p)| p))
}

/// Returns the highest inode number seen in the log (including deleted records), or 0 if only
/// the root exists.
pub fn max_inode_number(disk: &[u8], head: u32) -> Result<u32> {
    let mut max = 0;
    for entry in scan(disk, head) {
        let entry = entry?;
        max = max.max(entry.inode.inode_number);
    }
    Ok(max)
}

/// Appends `bytes` (a fully-encoded log entry: header + payload) to the log, advancing `sb.head`.
/// Fails [`Error::NoSpace`] if the append would cross `disk.len()`.
pub fn append(disk: &mut [u8], sb: &mut Superblock, bytes: &[u8]) -> Result<()> {
    let end = sb
        .head
        .checked_add(bytes.len() as u32)
        .ok_or(Error::NoSpace)?;
    if end as usize > disk.len() {
        return Err(Error::NoSpace);
    }
    disk[sb.head as usize..end as usize].copy_from_slice(bytes);
    sb.head = end;
    sb.write(disk);
    Ok(())
}

/// Encodes a full log entry (inode header followed by `payload`) into one contiguous buffer.
pub fn encode_entry(inode: &Inode, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; INODE_SIZE + payload.len()];
    inode.write_at(&mut buf, 0);
    buf[INODE_SIZE..].copy_from_slice(payload);
    buf
}
