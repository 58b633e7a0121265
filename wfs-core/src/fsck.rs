//! The compaction algorithm: rewrites the disk to contain only the latest live record per
//! inode number, zero-filling the remainder. Must not run against a mounted disk; nothing
//! in this crate enforces that, so callers are responsible for serializing access.

use crate::codec::{Superblock, SUPERBLOCK_SIZE, WFS_MAGIC};
use crate::error::Result;
use crate::log::{latest_live_inode, max_inode_number};

/// Compacts `disk` in place. Idempotent: running this twice in a row is a no-op the second
/// time, since the first pass already leaves only one live record per inode number.
pub fn fsck(disk: &mut [u8]) -> Result<()> {
    let sb = Superblock::read(disk)?;
    let max_inode = max_inode_number(disk, sb.head)?;

    let mut aux = vec![0u8; disk.len()];
    let mut new_sb = Superblock {
        magic: WFS_MAGIC,
        head: SUPERBLOCK_SIZE as u32,
    };

    for inode_number in 0..=max_inode {
        let Some(inode) = latest_live_inode(disk, sb.head, inode_number)? else {
            continue;
        };
        // Re-scan for the live record's payload: `latest_live_inode` only returns the header,
        // and the log may have other inodes' records interleaved with this one's payload.
        let payload = crate::log::latest_entry_payload(disk, sb.head, inode_number)?
            .unwrap_or_default();
        debug_assert_eq!(payload.len(), inode.size as usize);
        let entry = crate::log::encode_entry(&inode, &payload);
        let start = new_sb.head as usize;
        let end = start + entry.len();
        aux[start..end].copy_from_slice(&entry);
        new_sb.head = end as u32;
    }
    new_sb.write(&mut aux);

    disk.copy_from_slice(&aux);
    Ok(())
}
