//! The `mkfs.wfs` tool initializes a disk image with a fresh superblock and root directory.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::info;
use memmap2::MmapOptions;
use wfs_util::error;
use wfs_util::prompt::prompt;
use wfs_util::util::ByteSize;

/// Default size of a freshly created disk image.
const DEFAULT_DISK_SIZE: u64 = 1 << 20;

/// Initializes a disk image for the log-structured WFS filesystem.
#[derive(Parser)]
#[command(name = "mkfs.wfs")]
struct Args {
    /// Path to the disk image. Created if it does not already exist.
    disk_path: PathBuf,
    /// Size in bytes of a newly created disk image. Ignored if the file already exists and is
    /// at least this large.
    #[arg(short, long, default_value_t = DEFAULT_DISK_SIZE)]
    size: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let bin = "mkfs.wfs";

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&args.disk_path)
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    let cur_len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let target_len = cur_len.max(args.size);
    file.set_len(target_len)
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    let mut mmap = unsafe { MmapOptions::new().map_mut(&file) }
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    if wfs_core::codec::Superblock::read(&mmap).is_ok() {
        println!(
            "{} already contains a WFS filesystem ({})",
            args.disk_path.display(),
            ByteSize(mmap.len() as u64)
        );
        let confirm = prompt(Some("Proceed anyway? (y/N) "), false)
            .map(|s| s.eq_ignore_ascii_case("y"))
            .unwrap_or(false);
        if !confirm {
            eprintln!("Abort.");
            exit(1);
        }
    }

    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };
    wfs_core::mkfs(&mut mmap, uid, gid)
        .unwrap_or_else(|e| error(bin, format_args!("failed to create filesystem: {e}")));
    mmap.flush()
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    info!(
        "initialized {} ({})",
        args.disk_path.display(),
        ByteSize(target_len)
    );
}
