//! Translates `fuser`'s low-level, inode-addressed FUSE callbacks into the core's path-addressed
//! operations. The core resolves everything by path, so this adapter remembers the path each
//! FUSE inode number was last looked up under and translates every callback into a path before
//! calling into [`wfs_core::Filesystem`].
//!
//! Every callback re-opens a [`wfs_core::Filesystem`] over a fresh copy of the mapped disk,
//! performs one operation, and — if it mutated anything — writes the result back into the
//! mapping. No state is cached across calls beyond the ino-to-path table; every read rescans
//! the log.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyWrite, Request,
};
use log::{debug, warn};
use memmap2::MmapMut;

use wfs_core::codec::S_IFDIR;
use wfs_core::{Error, Filesystem as Wfs, Stat};

/// FUSE reserves inode 1 for the mount point's root; the core's root is inode number 0.
const FUSE_ROOT_INO: u64 = 1;
/// Attribute cache TTL handed back to the kernel. The core has no cache of its own to
/// invalidate, so a short TTL keeps the kernel from serving stale attributes across mutations
/// made through a different path alias.
const ATTR_TTL: Duration = Duration::from_secs(1);

fn to_fuse_ino(core_ino: u32) -> u64 {
    core_ino as u64 + 1
}

fn to_core_ino(fuse_ino: u64) -> u32 {
    (fuse_ino - 1) as u32
}

fn to_system_time(secs: u32) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs as u64)
}

fn stat_to_attr(stat: Stat) -> FileAttr {
    let kind = if stat.mode & wfs_core::codec::S_IFMT == S_IFDIR {
        FileType::Directory
    } else {
        FileType::RegularFile
    };
    FileAttr {
        ino: to_fuse_ino(stat.inode_number),
        size: stat.size as u64,
        blocks: (stat.size as u64).div_ceil(512),
        atime: to_system_time(stat.atime),
        mtime: to_system_time(stat.mtime),
        ctime: to_system_time(stat.ctime),
        crtime: to_system_time(stat.ctime),
        kind,
        perm: (stat.mode & 0o7777) as u16,
        nlink: stat.links,
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

/// The FUSE-facing filesystem. Owns the memory-mapped backing file; everything else is derived
/// fresh from it on every call.
pub struct WfsAdapter {
    mmap: MmapMut,
    /// Maps a FUSE inode number to the absolute path it was most recently resolved under.
    paths: HashMap<u64, PathBuf>,
}

impl WfsAdapter {
    pub fn new(mmap: MmapMut) -> Self {
        let mut paths = HashMap::new();
        paths.insert(FUSE_ROOT_INO, PathBuf::from("/"));
        Self { mmap, paths }
    }

    fn open(&self) -> Result<Wfs, Error> {
        Wfs::open(self.mmap.to_vec())
    }

    fn path_str(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).and_then(|p| p.to_str())
    }

    fn child_path(parent: &Path, name: &OsStr) -> Option<PathBuf> {
        let name = name.to_str()?;
        if parent == Path::new("/") {
            Some(PathBuf::from(format!("/{name}")))
        } else {
            Some(PathBuf::from(format!("{}/{name}", parent.display())))
        }
    }

    fn remember(&mut self, ino: u64, path: PathBuf) {
        self.paths.insert(ino, path);
    }

    /// Persists a mutated [`Wfs`] back into the mapping.
    fn persist(&mut self, fs: Wfs) {
        self.mmap[..].copy_from_slice(&fs.into_disk());
        if let Err(e) = self.mmap.flush() {
            warn!("failed to flush disk image: {e}");
        }
    }
}

impl Filesystem for WfsAdapter {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &std::ffi::OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.paths.get(&parent).cloned() else {
            reply.error(Error::BadFd.to_errno());
            return;
        };
        let Some(child_path) = Self::child_path(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        let fs = match self.open() {
            Ok(fs) => fs,
            Err(e) => return reply.error(e.to_errno()),
        };
        match fs.getattr(child_path.to_str().unwrap()) {
            Ok(stat) => {
                let attr = stat_to_attr(stat);
                self.remember(attr.ino, child_path);
                reply.entry(&ATTR_TTL, &attr, 0);
            }
            Err(e) => {
                debug!("lookup {}: {e}", child_path.display());
                reply.error(e.to_errno());
            }
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path_str(ino).map(str::to_owned) else {
            reply.error(Error::BadFd.to_errno());
            return;
        };
        let fs = match self.open() {
            Ok(fs) => fs,
            Err(e) => return reply.error(e.to_errno()),
        };
        match fs.getattr(&path) {
            Ok(stat) => reply.attr(&ATTR_TTL, &stat_to_attr(stat)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mknod(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &std::ffi::OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_path) = self.paths.get(&parent).cloned() else {
            reply.error(Error::BadFd.to_errno());
            return;
        };
        let Some(child_path) = Self::child_path(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        let mut fs = match self.open() {
            Ok(fs) => fs,
            Err(e) => return reply.error(e.to_errno()),
        };
        match fs.mknod(child_path.to_str().unwrap(), mode, req.uid(), req.gid()) {
            Ok(core_ino) => {
                let stat = fs.getattr(child_path.to_str().unwrap()).unwrap();
                self.persist(fs);
                let attr = stat_to_attr(stat);
                debug_assert_eq!(to_core_ino(attr.ino), core_ino);
                self.remember(attr.ino, child_path);
                reply.entry(&ATTR_TTL, &attr, 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &std::ffi::OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_path) = self.paths.get(&parent).cloned() else {
            reply.error(Error::BadFd.to_errno());
            return;
        };
        let Some(child_path) = Self::child_path(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        let mut fs = match self.open() {
            Ok(fs) => fs,
            Err(e) => return reply.error(e.to_errno()),
        };
        match fs.mkdir(child_path.to_str().unwrap(), mode, req.uid(), req.gid()) {
            Ok(_) => {
                let stat = fs.getattr(child_path.to_str().unwrap()).unwrap();
                self.persist(fs);
                let attr = stat_to_attr(stat);
                self.remember(attr.ino, child_path);
                reply.entry(&ATTR_TTL, &attr, 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_str(ino).map(str::to_owned) else {
            reply.error(Error::BadFd.to_errno());
            return;
        };
        let fs = match self.open() {
            Ok(fs) => fs,
            Err(e) => return reply.error(e.to_errno()),
        };
        let mut buf = vec![0u8; size as usize];
        match fs.read(&path, &mut buf, offset as u64) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_str(ino).map(str::to_owned) else {
            reply.error(Error::BadFd.to_errno());
            return;
        };
        let mut fs = match self.open() {
            Ok(fs) => fs,
            Err(e) => return reply.error(e.to_errno()),
        };
        match fs.write(&path, data, offset as u64) {
            Ok(n) => {
                self.persist(fs);
                reply.written(n as u32);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_str(ino).map(str::to_owned) else {
            reply.error(Error::BadFd.to_errno());
            return;
        };
        let fs = match self.open() {
            Ok(fs) => fs,
            Err(e) => return reply.error(e.to_errno()),
        };
        let names = match fs.readdir(&path) {
            Ok(names) => names,
            Err(e) => return reply.error(e.to_errno()),
        };

        // Synthesize `.` and `..`, which the core's readdir does not emit.
        let mut entries: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_string()),
            (ino, FileType::Directory, "..".to_string()),
        ];
        for name in names {
            let child_path = Self::child_path(Path::new(&path), OsStr::new(&name)).unwrap();
            let Ok(stat) = fs.getattr(child_path.to_str().unwrap()) else {
                continue;
            };
            let kind = if stat.mode & wfs_core::codec::S_IFMT == S_IFDIR {
                FileType::Directory
            } else {
                FileType::RegularFile
            };
            entries.push((to_fuse_ino(stat.inode_number), kind, name));
        }

        for (i, (child_ino, kind, name)) in entries.iter().enumerate().skip(offset as usize) {
            if reply.add(*child_ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &std::ffi::OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.paths.get(&parent).cloned() else {
            reply.error(Error::BadFd.to_errno());
            return;
        };
        let Some(child_path) = Self::child_path(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        let mut fs = match self.open() {
            Ok(fs) => fs,
            Err(e) => return reply.error(e.to_errno()),
        };
        match fs.unlink(child_path.to_str().unwrap()) {
            Ok(()) => {
                self.persist(fs);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &std::ffi::OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.paths.get(&parent).cloned() else {
            reply.error(Error::BadFd.to_errno());
            return;
        };
        let Some(child_path) = Self::child_path(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        let mut fs = match self.open() {
            Ok(fs) => fs,
            Err(e) => return reply.error(e.to_errno()),
        };
        match fs.rmdir(child_path.to_str().unwrap()) {
            Ok(()) => {
                self.persist(fs);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }
}
