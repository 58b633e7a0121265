//! The `fsck.wfs` tool compacts a WFS disk image, keeping only the latest live record per
//! inode number. Must not be run against a mounted disk.

use std::fs::OpenOptions;
use std::path::PathBuf;

use clap::Parser;
use log::info;
use memmap2::MmapOptions;
use wfs_util::error;
use wfs_util::util::ByteSize;

/// Compacts the log of a WFS disk image in place.
#[derive(Parser)]
#[command(name = "fsck.wfs")]
struct Args {
    /// Path to the disk image.
    disk_path: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let bin = "fsck.wfs";

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&args.disk_path)
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    let mut mmap = unsafe { MmapOptions::new().map_mut(&file) }
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    let head_before = wfs_core::codec::Superblock::read(&mmap)
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())))
        .head;

    wfs_core::fsck::fsck(&mut mmap)
        .unwrap_or_else(|e| error(bin, format_args!("failed to fsck: {e}")));
    mmap.flush()
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    let head_after = wfs_core::codec::Superblock::read(&mmap)
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())))
        .head;

    info!(
        "{}: compacted {} -> {}",
        args.disk_path.display(),
        ByteSize(head_before as u64),
        ByteSize(head_after as u64)
    );
}
