//! End-to-end scenarios (S1-S8) driven directly against the `Filesystem` facade, without a
//! FUSE mount or a real backing file — an in-memory `Vec<u8>` stands in for the disk.

use wfs_core::codec::{S_IFDIR, S_IFMT, S_IFREG};
use wfs_core::{mkfs, Error, Filesystem};

const DISK_SIZE: usize = 1 << 20;

fn new_fs() -> Filesystem {
    let mut disk = vec![0u8; DISK_SIZE];
    mkfs(&mut disk, 1000, 1000).unwrap();
    Filesystem::open(disk).unwrap()
}

#[test]
fn s1_empty_filesystem() {
    let fs = new_fs();
    assert!(fs.readdir("/").unwrap().is_empty());
    let stat = fs.getattr("/").unwrap();
    assert_eq!(stat.mode & S_IFMT, S_IFDIR);
    assert_eq!(stat.size, 0);
}

#[test]
fn s2_create_file() {
    let mut fs = new_fs();
    fs.mknod("/a", 0o644, 1000, 1000).unwrap();
    assert_eq!(fs.readdir("/").unwrap(), vec!["a"]);
    let stat = fs.getattr("/a").unwrap();
    assert_eq!(stat.mode, S_IFREG | 0o644);
    assert_eq!(stat.size, 0);
    assert_eq!(stat.uid, 1000);
}

#[test]
fn s3_write_then_read() {
    let mut fs = new_fs();
    fs.mknod("/a", 0o644, 1000, 1000).unwrap();
    assert_eq!(fs.write("/a", b"hello", 0).unwrap(), 5);
    let mut buf = [0u8; 5];
    assert_eq!(fs.read("/a", &mut buf, 0).unwrap(), 5);
    assert_eq!(&buf, b"hello");
    assert_eq!(fs.getattr("/a").unwrap().size, 5);
}

#[test]
fn s4_sparse_write() {
    let mut fs = new_fs();
    fs.mknod("/a", 0o644, 1000, 1000).unwrap();
    assert_eq!(fs.write("/a", b"X", 10).unwrap(), 1);
    assert_eq!(fs.getattr("/a").unwrap().size, 11);
    let mut buf = [0u8; 11];
    assert_eq!(fs.read("/a", &mut buf, 0).unwrap(), 11);
    assert_eq!(&buf[..10], &[0u8; 10]);
    assert_eq!(buf[10], b'X');
}

#[test]
fn s5_nested_mkdir_and_unlink() {
    let mut fs = new_fs();
    fs.mkdir("/d", 0o755, 1000, 1000).unwrap();
    fs.mknod("/d/f", 0o644, 1000, 1000).unwrap();
    assert_eq!(fs.readdir("/d").unwrap(), vec!["f"]);
    fs.unlink("/d/f").unwrap();
    assert!(fs.readdir("/d").unwrap().is_empty());
    assert!(matches!(fs.getattr("/d/f"), Err(Error::NotFound)));
}

#[test]
fn s6_fsck_compaction() {
    let mut fs = new_fs();
    fs.mknod("/a", 0o644, 1000, 1000).unwrap();
    for i in 0..100u8 {
        fs.write("/a", &[i], i as u64).unwrap();
    }
    let mut disk = fs.into_disk();
    wfs_core::fsck::fsck(&mut disk).unwrap();

    let fs = Filesystem::open(disk).unwrap();
    assert_eq!(
        fs.head() as usize,
        wfs_core::codec::SUPERBLOCK_SIZE + wfs_core::codec::INODE_SIZE * 2 + 100
    );
    let mut buf = [0u8; 100];
    fs.read("/a", &mut buf, 0).unwrap();
    assert_eq!(buf, core::array::from_fn::<u8, 100, _>(|i| i as u8));
}

#[test]
fn s7_rmdir_non_empty_then_empty() {
    let mut fs = new_fs();
    fs.mkdir("/d", 0o755, 1000, 1000).unwrap();
    fs.mknod("/d/f", 0o644, 1000, 1000).unwrap();
    assert!(matches!(fs.rmdir("/d"), Err(Error::NotEmpty)));
    fs.unlink("/d/f").unwrap();
    fs.rmdir("/d").unwrap();
    assert!(!fs.readdir("/").unwrap().contains(&"d".to_string()));
}

#[test]
fn s8_name_too_long() {
    let mut fs = new_fs();
    let name = format!("/{}", "x".repeat(40));
    assert!(matches!(
        fs.mknod(&name, 0o644, 1000, 1000),
        Err(Error::NameTooLong)
    ));
}

#[test]
fn invariant_head_equals_sum_of_appended_sizes() {
    let mut fs = new_fs();
    let start = fs.head();
    fs.mkdir("/d", 0o755, 1000, 1000).unwrap();
    fs.mknod("/d/f", 0o644, 1000, 1000).unwrap();
    fs.write("/d/f", b"hello world", 0).unwrap();

    // mkdir: +inode(dir) +parent-rewrite; mknod: +inode(file) +parent-rewrite; write: +inode
    let inode = wfs_core::codec::INODE_SIZE as u32;
    let dirent = wfs_core::codec::DIRENT_SIZE as u32;
    let expected = start
        + (inode + (inode + dirent)) // mkdir under root
        + (inode + (inode + dirent)) // mknod under /d
        + (inode + 11); // write "hello world"
    assert_eq!(fs.head(), expected);
}

#[test]
fn invariant_directory_entries_resolve_to_live_inodes() {
    let mut fs = new_fs();
    fs.mkdir("/d", 0o755, 1000, 1000).unwrap();
    fs.mknod("/d/a", 0o644, 1000, 1000).unwrap();
    fs.mknod("/d/b", 0o644, 1000, 1000).unwrap();
    for name in fs.readdir("/d").unwrap() {
        let stat = fs.getattr(&format!("/d/{name}")).unwrap();
        assert_eq!(stat.size, 0);
    }
}

#[test]
fn rmdir_on_root_is_rejected() {
    let mut fs = new_fs();
    assert!(matches!(fs.rmdir("/"), Err(Error::NotFound)));
}
