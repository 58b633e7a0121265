//! Filesystem operations: `getattr`, `mknod`, `mkdir`, `read`, `write`, `readdir`, `unlink`,
//! `rmdir`. Each read is a log scan; each mutation is one or two log appends — never an
//! in-place edit of a prior record.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::{
    decode_dir_payload, encode_dir_payload, DirEntry, Inode, Superblock, DIRENT_SIZE, S_IFDIR,
    S_IFMT, S_IFREG, SUPERBLOCK_SIZE,
};
use crate::error::{Error, Result};
use crate::log::{append, encode_entry, latest_entry_payload, latest_live_inode, max_inode_number};
use crate::resolver::{parsepath, resolve, ROOT_INODE};

/// A stat result as returned by [`Filesystem::getattr`].
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub inode_number: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
    pub links: u32,
    pub size: u32,
}

impl From<Inode> for Stat {
    fn from(inode: Inode) -> Self {
        Self {
            inode_number: inode.inode_number,
            mode: inode.mode,
            uid: inode.uid,
            gid: inode.gid,
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
            links: inode.links,
            size: inode.size,
        }
    }
}

fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Owns the disk buffer and the superblock's append cursor, and exposes every filesystem
/// operation over it. No caches, no handle table: callers always address state by path or by
/// inode number, resolved fresh against the log on every call.
pub struct Filesystem {
    disk: Vec<u8>,
    sb: Superblock,
}

impl Filesystem {
    /// Opens an existing disk image held in memory. Fails [`Error::BadMagic`] if the leading
    /// bytes are not a valid superblock.
    pub fn open(disk: Vec<u8>) -> Result<Self> {
        let sb = Superblock::read(&disk)?;
        Ok(Self { disk, sb })
    }

    /// Returns the backing buffer, e.g. to flush it back to a file.
    pub fn into_disk(self) -> Vec<u8> {
        self.disk
    }

    pub fn disk(&self) -> &[u8] {
        &self.disk
    }

    pub fn head(&self) -> u32 {
        self.sb.head
    }

    fn resolve(&self, path: &str) -> Result<u32> {
        resolve(&self.disk, self.sb.head, path)
    }

    fn live_inode(&self, inode_number: u32) -> Result<Inode> {
        latest_live_inode(&self.disk, self.sb.head, inode_number)?.ok_or(Error::NotFound)
    }

    fn dir_entries(&self, inode_number: u32) -> Result<Vec<DirEntry>> {
        let payload =
            latest_entry_payload(&self.disk, self.sb.head, inode_number)?.ok_or(Error::NotFound)?;
        Ok(decode_dir_payload(&payload))
    }

    fn append_entry(&mut self, inode: &Inode, payload: &[u8]) -> Result<()> {
        append(&mut self.disk, &mut self.sb, &encode_entry(inode, payload))
    }

    /// `getattr(path) -> stat`.
    pub fn getattr(&self, path: &str) -> Result<Stat> {
        let inode_number = self.resolve(path)?;
        Ok(self.live_inode(inode_number)?.into())
    }

    /// Shared implementation of `mknod` and `mkdir`: both create a new inode with empty
    /// payload and append one new directory entry to the parent.
    fn create_node(&mut self, path: &str, mode: u32, uid: u32, gid: u32) -> Result<u32> {
        if self.resolve(path).is_ok() {
            return Err(Error::Exists);
        }
        let (name, parent_path) = parsepath(path);
        let parent_number = self.resolve(parent_path)?;
        let parent = self.live_inode(parent_number)?;
        if !parent.is_dir() {
            return Err(Error::NotDir);
        }

        let new_number = max_inode_number(&self.disk, self.sb.head)? + 1;
        let ts = now();
        let new_inode = Inode {
            inode_number: new_number,
            deleted: 0,
            mode,
            uid,
            gid,
            flags: 0,
            size: 0,
            atime: ts,
            mtime: ts,
            ctime: ts,
            links: 1,
        };
        self.append_entry(&new_inode, &[])?;

        let mut entries = self.dir_entries(parent_number)?;
        entries.push(DirEntry {
            name: name.to_string(),
            inode_number: new_number as u64,
        });
        let payload = encode_dir_payload(&entries)?;
        let new_parent = Inode {
            size: payload.len() as u32,
            atime: ts,
            mtime: ts,
            ctime: ts,
            ..parent
        };
        self.append_entry(&new_parent, &payload)?;

        Ok(new_number)
    }

    /// `mknod(path, mode)`: creates a regular file (or special node) at `path`.
    pub fn mknod(&mut self, path: &str, mode: u32, uid: u32, gid: u32) -> Result<u32> {
        let mode = if mode & S_IFMT == 0 {
            mode | S_IFREG
        } else {
            mode
        };
        self.create_node(path, mode, uid, gid)
    }

    /// `mkdir(path, mode)`: creates a directory at `path`.
    pub fn mkdir(&mut self, path: &str, mode: u32, uid: u32, gid: u32) -> Result<u32> {
        let mode = mode | S_IFDIR;
        self.create_node(path, mode, uid, gid)
    }

    /// `read(path, buf, offset)`: copies up to `buf.len()` bytes starting at `offset` into
    /// `buf`, returning the number of bytes actually copied.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let inode_number = self.resolve(path)?;
        let inode = self.live_inode(inode_number)?;
        if inode.is_dir() {
            return Err(Error::IsDir);
        }
        if offset >= inode.size as u64 {
            return Ok(0);
        }
        let payload = latest_entry_payload(&self.disk, self.sb.head, inode_number)?
            .ok_or(Error::NotFound)?;
        let offset = offset as usize;
        let n = buf.len().min(payload.len() - offset);
        buf[..n].copy_from_slice(&payload[offset..offset + n]);
        Ok(n)
    }

    /// `write(path, buf, offset)`: grows the file to `max(old_size, offset + buf.len())`,
    /// zero-filling any gap, and returns `buf.len()` on success (standard POSIX `write(2)`
    /// semantics).
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        let inode_number = self.resolve(path)?;
        let inode = self.live_inode(inode_number)?;
        if inode.is_dir() {
            return Err(Error::IsDir);
        }
        let old_payload = latest_entry_payload(&self.disk, self.sb.head, inode_number)?
            .unwrap_or_default();

        let offset = offset as usize;
        let new_size = (inode.size as usize).max(offset + buf.len());
        let mut new_payload = vec![0u8; new_size];
        new_payload[..old_payload.len()].copy_from_slice(&old_payload);
        new_payload[offset..offset + buf.len()].copy_from_slice(buf);

        let ts = now();
        let new_inode = Inode {
            size: new_size as u32,
            atime: ts,
            mtime: ts,
            ctime: ts,
            ..inode
        };
        self.append_entry(&new_inode, &new_payload)?;
        Ok(buf.len())
    }

    /// `readdir(path) -> names`: the stored order of the directory's payload, with no
    /// synthesized `.`/`..` entries (the FUSE adapter synthesizes those at its boundary).
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let inode_number = self.resolve(path)?;
        let inode = self.live_inode(inode_number)?;
        if !inode.is_dir() {
            return Err(Error::NotDir);
        }
        Ok(self
            .dir_entries(inode_number)?
            .into_iter()
            .map(|e| e.name)
            .collect())
    }

    /// Shared implementation of `unlink` and `rmdir`: removes the target's directory entry from
    /// its parent and writes a deleted tombstone for the target so a stale handle observes
    /// removal rather than stale live data.
    fn remove(&mut self, path: &str, expect_dir: bool) -> Result<()> {
        let inode_number = self.resolve(path)?;
        let inode = self.live_inode(inode_number)?;
        if expect_dir && !inode.is_dir() {
            return Err(Error::NotDir);
        }
        if !expect_dir && inode.is_dir() {
            return Err(Error::IsDir);
        }
        if expect_dir && !self.dir_entries(inode_number)?.is_empty() {
            return Err(Error::NotEmpty);
        }

        let (name, parent_path) = parsepath(path);
        let parent_number = self.resolve(parent_path)?;
        let parent = self.live_inode(parent_number)?;
        let mut entries = self.dir_entries(parent_number)?;
        let before = entries.len();
        entries.retain(|e| e.name != name);
        if entries.len() == before {
            return Err(Error::NotFound);
        }
        let ts = now();
        let payload = encode_dir_payload(&entries)?;
        let new_parent = Inode {
            size: payload.len() as u32,
            atime: ts,
            mtime: ts,
            ctime: ts,
            ..parent
        };
        self.append_entry(&new_parent, &payload)?;

        let links = inode.links.saturating_sub(1);
        let tombstone = Inode {
            deleted: if links == 0 { 1 } else { inode.deleted },
            links,
            atime: ts,
            mtime: ts,
            ctime: ts,
            ..inode
        };
        self.append_entry(&tombstone, &[])?;
        Ok(())
    }

    /// `unlink(path)`: removes a regular file (or non-directory node).
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        self.remove(path, false)
    }

    /// `rmdir(path)`: removes an empty directory. Fails [`Error::NotEmpty`] if it has live
    /// children. The root has no entry in any parent directory, so `rmdir("/")` naturally fails
    /// with [`Error::NotFound`] rather than needing a special case.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        self.remove(path, true)
    }
}

/// Initializes a fresh disk image of `disk.len()` bytes in place: a superblock plus one root
/// directory inode entry.
pub fn mkfs(disk: &mut [u8], uid: u32, gid: u32) -> Result<()> {
    if disk.len() < SUPERBLOCK_SIZE + crate::codec::INODE_SIZE {
        return Err(Error::NoSpace);
    }
    let ts = now();
    let sb = Superblock {
        magic: crate::codec::WFS_MAGIC,
        head: (SUPERBLOCK_SIZE + crate::codec::INODE_SIZE) as u32,
    };
    sb.write(disk);
    let root = Inode {
        inode_number: ROOT_INODE,
        deleted: 0,
        mode: S_IFDIR,
        uid,
        gid,
        flags: 0,
        size: 0,
        atime: ts,
        mtime: ts,
        ctime: ts,
        links: 1,
    };
    root.write_at(disk, SUPERBLOCK_SIZE);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_fs(size: usize) -> Filesystem {
        let mut disk = vec![0u8; size];
        mkfs(&mut disk, 1000, 1000).unwrap();
        Filesystem::open(disk).unwrap()
    }

    #[test]
    fn s1_empty_filesystem() {
        let fs = fresh_fs(1 << 20);
        assert!(fs.readdir("/").unwrap().is_empty());
        let stat = fs.getattr("/").unwrap();
        assert_eq!(stat.mode & S_IFMT, S_IFDIR);
        assert_eq!(stat.size, 0);
    }

    #[test]
    fn s2_create_file() {
        let mut fs = fresh_fs(1 << 20);
        fs.mknod("/a", 0o644, 1000, 1000).unwrap();
        assert_eq!(fs.readdir("/").unwrap(), vec!["a".to_string()]);
        let stat = fs.getattr("/a").unwrap();
        assert_eq!(stat.mode, S_IFREG | 0o644);
        assert_eq!(stat.size, 0);
        assert_eq!(stat.uid, 1000);
    }

    #[test]
    fn s3_write_then_read() {
        let mut fs = fresh_fs(1 << 20);
        fs.mknod("/a", 0o644, 1000, 1000).unwrap();
        let n = fs.write("/a", b"hello", 0).unwrap();
        assert_eq!(n, 5);
        let mut buf = [0u8; 5];
        let n = fs.read("/a", &mut buf, 0).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(fs.getattr("/a").unwrap().size, 5);
    }

    #[test]
    fn s4_sparse_write() {
        let mut fs = fresh_fs(1 << 20);
        fs.mknod("/a", 0o644, 1000, 1000).unwrap();
        let n = fs.write("/a", b"X", 10).unwrap();
        assert_eq!(n, 1);
        assert_eq!(fs.getattr("/a").unwrap().size, 11);
        let mut buf = [0u8; 11];
        let n = fs.read("/a", &mut buf, 0).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf[..10], &[0u8; 10]);
        assert_eq!(buf[10], b'X');
    }

    #[test]
    fn s5_nested_mkdir_and_unlink() {
        let mut fs = fresh_fs(1 << 20);
        fs.mkdir("/d", 0o755, 1000, 1000).unwrap();
        fs.mknod("/d/f", 0o644, 1000, 1000).unwrap();
        assert_eq!(fs.readdir("/d").unwrap(), vec!["f".to_string()]);
        fs.unlink("/d/f").unwrap();
        assert!(fs.readdir("/d").unwrap().is_empty());
        assert!(matches!(fs.getattr("/d/f"), Err(Error::NotFound)));
    }

    #[test]
    fn s7_rmdir_rejects_non_empty_then_succeeds() {
        let mut fs = fresh_fs(1 << 20);
        fs.mkdir("/d", 0o755, 1000, 1000).unwrap();
        fs.mknod("/d/f", 0o644, 1000, 1000).unwrap();
        assert!(matches!(fs.rmdir("/d"), Err(Error::NotEmpty)));
        fs.unlink("/d/f").unwrap();
        fs.rmdir("/d").unwrap();
        assert!(!fs.readdir("/").unwrap().contains(&"d".to_string()));
    }

    #[test]
    fn s8_name_too_long_is_rejected() {
        let mut fs = fresh_fs(1 << 20);
        let name = format!("/{}", "x".repeat(40));
        assert!(matches!(
            fs.mknod(&name, 0o644, 1000, 1000),
            Err(Error::NameTooLong)
        ));
        assert!(fs.readdir("/").unwrap().is_empty());
    }

    #[test]
    fn create_existing_path_fails() {
        let mut fs = fresh_fs(1 << 20);
        fs.mknod("/a", 0o644, 1000, 1000).unwrap();
        assert!(matches!(
            fs.mknod("/a", 0o644, 1000, 1000),
            Err(Error::Exists)
        ));
    }

    #[test]
    fn write_sequence_yields_gap_then_second_write() {
        let mut fs = fresh_fs(1 << 20);
        fs.mknod("/a", 0o644, 1000, 1000).unwrap();
        fs.write("/a", b"AAAAA", 0).unwrap();
        fs.write("/a", b"BB", 10).unwrap();
        let stat = fs.getattr("/a").unwrap();
        assert_eq!(stat.size, 12);
        let mut buf = [0u8; 12];
        fs.read("/a", &mut buf, 0).unwrap();
        assert_eq!(&buf[..5], b"AAAAA");
        assert_eq!(&buf[5..10], &[0u8; 5]);
        assert_eq!(&buf[10..], b"BB");
    }

    #[test]
    fn head_tracks_sum_of_appended_entries() {
        let mut fs = fresh_fs(1 << 20);
        let start = fs.head();
        fs.mknod("/a", 0o644, 1000, 1000).unwrap();
        // one inode entry for "a" + one rewritten parent entry
        let expected = start
            + crate::codec::INODE_SIZE as u32
            + (crate::codec::INODE_SIZE as u32 + DIRENT_SIZE as u32);
        assert_eq!(fs.head(), expected);
    }
}
