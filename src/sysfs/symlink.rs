//! Symlink helpers for the fake tree.
//!
//! Links are created with the target-first rule: the target directory is made
//! (with all missing ancestors) before the link itself, so a link in the tree
//! never dangles.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Create `link` pointing at the directory `target`, creating `target` and
/// the link's parent directory first.
///
/// The link's own parent may itself be reached through an earlier symlink
/// (e.g. `sys/class/net/<iface>/device`); that is resolved by the OS.
pub(crate) fn link_dir(target: &Path, link: &Path) -> io::Result<()> {
    fs::create_dir_all(target)?;
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(target, link)
}

/// Returns `true` when `path` itself is a symbolic link.
///
/// This checks the *link* metadata (does not follow the link).
pub fn is_symlink(path: &Path) -> io::Result<bool> {
    Ok(path.symlink_metadata()?.file_type().is_symlink())
}

/// Read the target a symlink points at, without resolving further.
pub fn read_symlink(path: &Path) -> io::Result<PathBuf> {
    path.read_link()
}
