//! The `mount.wfs` tool attaches a WFS disk image to a mount point through the kernel's FUSE
//! forwarding interface, translating filesystem callbacks into log reads and log appends.

mod fuse_adapter;

use std::fs::OpenOptions;
use std::path::PathBuf;

use clap::Parser;
use fuser::MountOption;
use log::info;
use memmap2::MmapOptions;
use wfs_util::error;

use fuse_adapter::WfsAdapter;

/// Mounts a WFS disk image at a mount point via FUSE.
#[derive(Parser)]
#[command(name = "mount.wfs")]
struct Args {
    /// Path to the disk image, previously initialized with `mkfs.wfs`.
    disk_path: PathBuf,
    /// Directory to mount the filesystem on.
    mount_point: PathBuf,
    /// Run in the foreground instead of forking into the background.
    #[arg(short, long)]
    foreground: bool,
    /// Comma-separated FUSE mount options, forwarded to the kernel as-is (e.g. `ro,allow_other`).
    #[arg(short = 'o', long, value_delimiter = ',')]
    options: Vec<String>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let bin = "mount.wfs";

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&args.disk_path)
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    let mmap = unsafe { MmapOptions::new().map_mut(&file) }
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    wfs_core::codec::Superblock::read(&mmap)
        .unwrap_or_else(|e| error(bin, format_args!("{}: {e}", args.disk_path.display())));

    let mut mount_options = vec![MountOption::FSName("wfs".to_string())];
    for opt in &args.options {
        mount_options.push(match opt.as_str() {
            "ro" => MountOption::RO,
            "rw" => MountOption::RW,
            "allow_other" => MountOption::AllowOther,
            "allow_root" => MountOption::AllowRoot,
            "auto_unmount" => MountOption::AutoUnmount,
            "default_permissions" => MountOption::DefaultPermissions,
            other => MountOption::CUSTOM(other.to_string()),
        });
    }

    info!(
        "mounting {} at {}",
        args.disk_path.display(),
        args.mount_point.display()
    );

    if !args.foreground {
        // The reference FUSE binding forks into the background unless told not to; `fuser`
        // leaves that choice to the caller, so this mirrors libfuse's default by daemonizing
        // before serving.
        daemonize(bin);
    }

    let adapter = WfsAdapter::new(mmap);
    fuser::mount2(adapter, &args.mount_point, &mount_options)
        .unwrap_or_else(|e| error(bin, format_args!("failed to mount: {e}")));
}

/// Detaches the process from its controlling terminal and continues running in the background,
/// mirroring libfuse's default (non-`-f`) mounting behavior.
fn daemonize(bin: &str) {
    let ret = unsafe { libc::daemon(1, 0) };
    if ret < 0 {
        error(bin, format_args!("{}", std::io::Error::last_os_error()));
    }
}
