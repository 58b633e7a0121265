//! Path resolution by repeated directory-scan + inode lookup. No caching, no handle table: a
//! path is resolved fresh on every call by walking the log from the root.

use crate::codec::decode_dir_payload;
use crate::error::{Error, Result};
use crate::log::{latest_entry_payload, latest_live_inode};

/// The root directory's inode number.
pub const ROOT_INODE: u32 = 0;

/// Splits an absolute path into non-empty, `/`-delimited components.
fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Resolves an absolute path to its inode number by walking the log one component at a time.
/// The empty path (root, `"/"`) resolves to [`ROOT_INODE`] without touching the log.
pub fn resolve(disk: &[u8], head: u32, path: &str) -> Result<u32> {
    let mut cur = ROOT_INODE;
    for component in components(path) {
        let inode = latest_live_inode(disk, head, cur)?.ok_or(Error::NotFound)?;
        if !inode.is_dir() {
            return Err(Error::NotFound);
        }
        let payload = latest_entry_payload(disk, head, cur)?.ok_or(Error::NotFound)?;
        let entries = decode_dir_payload(&payload);
        let entry = entries
            .into_iter()
            .find(|e| e.name == component)
            .ok_or(Error::NotFound)?;
        cur = entry.inode_number as u32;
    }
    Ok(cur)
}

/// Splits a path into `(basename, parent_path)`. The parent path is the prefix through the
/// final `/`, exclusive of the basename; an empty parent path means the root directory.
///
/// Panics if `path` has no basename (i.e. is empty or `"/"`) — callers resolving mutation
/// targets always have a non-root path, since the root cannot be created, renamed or removed.
pub fn parsepath(path: &str) -> (&str, &str) {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(idx) => (&path[idx + 1..], &path[..idx]),
        None => (path, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_dir_payload, DirEntry, Superblock, S_IFDIR, S_IFREG};
    use crate::log::{append, encode_entry};

    fn mk_inode(n: u32, mode: u32, size: u32) -> crate::codec::Inode {
        crate::codec::Inode {
            inode_number: n,
            deleted: 0,
            mode,
            uid: 0,
            gid: 0,
            flags: 0,
            size,
            atime: 0,
            mtime: 0,
            ctime: 0,
            links: 1,
        }
    }

    #[test]
    fn parsepath_splits_basename_and_parent() {
        assert_eq!(parsepath("/a"), ("a", ""));
        assert_eq!(parsepath("/d/f"), ("f", "/d"));
        assert_eq!(parsepath("/a/b/c"), ("c", "/a/b"));
    }

    #[test]
    fn root_resolves_without_scanning() {
        let disk = vec![0u8; 16];
        assert_eq!(resolve(&disk, 0, "").unwrap(), ROOT_INODE);
    }

    #[test]
    fn resolve_nested_path() {
        let mut disk = vec![0u8; 4096];
        let mut sb = Superblock {
            magic: crate::codec::WFS_MAGIC,
            head: crate::codec::SUPERBLOCK_SIZE as u32,
        };
        sb.write(&mut disk);

        // root -> d (inode 1) -> f (inode 2)
        let root_payload = encode_dir_payload(&[DirEntry {
            name: "d".into(),
            inode_number: 1,
        }])
        .unwrap();
        let root = mk_inode(0, S_IFDIR, root_payload.len() as u32);
        append(&mut disk, &mut sb, &encode_entry(&root, &root_payload)).unwrap();

        let d_payload = encode_dir_payload(&[DirEntry {
            name: "f".into(),
            inode_number: 2,
        }])
        .unwrap();
        let d = mk_inode(1, S_IFDIR, d_payload.len() as u32);
        append(&mut disk, &mut sb, &encode_entry(&d, &d_payload)).unwrap();

        let f = mk_inode(2, S_IFREG, 0);
        append(&mut disk, &mut sb, &encode_entry(&f, &[])).unwrap();

        assert_eq!(resolve(&disk, sb.head, "/d").unwrap(), 1);
        assert_eq!(resolve(&disk, sb.head, "/d/f").unwrap(), 2);
        assert!(matches!(
            resolve(&disk, sb.head, "/d/g"),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            resolve(&disk, sb.head, "/d/f/x"),
            Err(Error::NotFound)
        ));
    }
}
