//! Mount point detection and bind mounting.
//!
//! [`Mounter`] is the seam between the driver and the kernel so that the
//! publish / unpublish logic can be exercised without privileges.

use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use nix::mount::{MntFlags, MsFlags};

const MOUNTINFO: &str = "/proc/self/mountinfo";

/// Local mount operations used by the node service.
pub trait Mounter: Send + Sync {
    /// Whether `path` is currently a mount point.
    ///
    /// Fails with [`io::ErrorKind::NotFound`] when `path` does not exist.
    fn is_mount_point(&self, path: &Path) -> io::Result<bool>;

    /// Bind-mount `source` onto `target`.
    fn bind_mount(&self, source: &Path, target: &Path) -> io::Result<()>;

    /// Unmount whatever is mounted at `target`.
    fn unmount(&self, target: &Path) -> io::Result<()>;
}

/// [`Mounter`] backed by `mount(2)` and `/proc/self/mountinfo`.
#[derive(Debug, Clone, Default)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        let meta = fs::metadata(path)?;
        if let Some(parent) = path.parent() {
            // A device change across the boundary is conclusive.
            if fs::metadata(parent).is_ok_and(|p| p.dev() != meta.dev()) {
                return Ok(true);
            }
        }

        // Bind mounts from the same filesystem keep the device number.
        let canonical = fs::canonicalize(path)?;
        let contents = fs::read_to_string(MOUNTINFO)?;
        Ok(mount_points(&contents).any(|p| p == canonical))
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> io::Result<()> {
        nix::mount::mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(io::Error::from)
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        nix::mount::umount2(target, MntFlags::empty()).map_err(io::Error::from)
    }
}

/// Mount points listed in a mountinfo table, octal escapes decoded.
///
/// Format: `<id> <parent> <major:minor> <root> <mount point> <options> ...`
pub fn mount_points(mountinfo: &str) -> impl Iterator<Item = PathBuf> + '_ {
    mountinfo
        .lines()
        .filter_map(|line| line.split_whitespace().nth(4))
        .map(|field| PathBuf::from(unescape(field)))
}

/// Decode the `\ooo` escapes the kernel uses for space, tab, newline and
/// backslash in mount paths.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() && is_octal(&bytes[i + 1..i + 4]) {
            let value = (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal(digits: &[u8]) -> bool {
    digits.len() == 3 && digits[0] <= b'3' && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
