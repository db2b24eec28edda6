//! A throwaway on-disk tree laid out like `/sys` for PCI network devices.
//!
//! [`FakeSysfs::install`] builds the tree from a [`SysfsLayout`] and hands out
//! [`SysRoots`] pointing inside it; code under test reads through those roots
//! instead of the real `/sys`. [`FakeSysfs::uninstall`] restores the working
//! directory captured at install time and deletes the tree.

pub mod layout;
pub mod symlink;

pub use layout::SysfsLayout;

use crate::errors::{HarnessError, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

/// Where PCI devices are indexed by bus address on a real host.
pub const SYS_BUS_PCI: &str = "/sys/bus/pci/devices";
/// Where network interfaces are listed on a real host.
pub const NET_DIRECTORY: &str = "/sys/class/net";
/// Name prefix of every fake tree.
pub const TREE_PREFIX: &str = "sriovplugin-testfiles-";

/// The two sysfs roots device-configuration code reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SysRoots {
    pub sys_bus_pci: PathBuf,
    pub net_directory: PathBuf,
}

impl Default for SysRoots {
    fn default() -> Self {
        SysRoots {
            sys_bus_pci: PathBuf::from(SYS_BUS_PCI),
            net_directory: PathBuf::from(NET_DIRECTORY),
        }
    }
}

impl SysRoots {
    /// The same roots, re-anchored below `root`.
    pub fn rebased(&self, root: &Path) -> SysRoots {
        SysRoots {
            sys_bus_pci: under(root, &self.sys_bus_pci),
            net_directory: under(root, &self.net_directory),
        }
    }
}

/// Join `rel` below `root` even when `rel` is absolute.
fn under(root: &Path, rel: impl AsRef<Path>) -> PathBuf {
    let rel = rel.as_ref();
    root.join(rel.strip_prefix("/").unwrap_or(rel))
}

/// Reject layout paths that would resolve outside the tree root.
fn check_contained(layout: &SysfsLayout) -> Result<()> {
    let paths = layout
        .dirs
        .iter()
        .chain(layout.files.keys())
        .chain(layout.symlinks().flat_map(|(link, target)| [link, target]));
    for rel in paths {
        let escapes = Path::new(rel).components().any(|c| {
            !matches!(
                c,
                Component::Normal(_) | Component::RootDir | Component::CurDir
            )
        });
        if escapes {
            return Err(HarnessError::Config(format!(
                "layout path `{rel}` leaves the fake sysfs tree"
            )));
        }
    }
    Ok(())
}

/// A fake sysfs tree living in a temporary directory.
///
/// Dropping the value without calling [`uninstall`](Self::uninstall) still
/// removes the tree, but errors are swallowed and the working directory is
/// left as is.
#[derive(Debug)]
pub struct FakeSysfs {
    tree: TempDir,
    saved_cwd: File,
    previous: SysRoots,
    roots: SysRoots,
}

impl FakeSysfs {
    /// Build `layout` under the system temporary directory.
    pub fn install(layout: &SysfsLayout, previous: SysRoots) -> Result<Self> {
        Self::install_in(layout, previous, &std::env::temp_dir())
    }

    /// Build `layout` in a fresh uniquely-named directory below `parent`.
    ///
    /// On error the partially built tree is removed together with the
    /// temporary directory guard.
    pub fn install_in(layout: &SysfsLayout, previous: SysRoots, parent: &Path) -> Result<Self> {
        check_contained(layout)?;
        let cwd = std::env::current_dir().map_err(HarnessError::setup("."))?;
        let saved_cwd = File::open(&cwd).map_err(HarnessError::setup(&cwd))?;

        let tree = tempfile::Builder::new()
            .prefix(TREE_PREFIX)
            .tempdir_in(parent)
            .map_err(HarnessError::setup(parent))?;
        let root = tree.path();
        debug!(root = %root.display(), "building fake sysfs");

        for dir in &layout.dirs {
            let path = under(root, dir);
            fs::create_dir_all(&path).map_err(HarnessError::setup(&path))?;
        }

        for (file, body) in &layout.files {
            let path = under(root, file);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(HarnessError::setup(dir))?;
            }
            fs::write(&path, body).map_err(HarnessError::setup(&path))?;
        }

        for (link, target) in layout.symlinks() {
            let link = under(root, link);
            symlink::link_dir(&under(root, target), &link).map_err(HarnessError::setup(&link))?;
        }

        let roots = previous.rebased(root);
        debug!(
            sys_bus_pci = %roots.sys_bus_pci.display(),
            net_directory = %roots.net_directory.display(),
            "sysfs roots redirected"
        );

        Ok(FakeSysfs {
            tree,
            saved_cwd,
            previous,
            roots,
        })
    }

    /// Root directory of the fake tree.
    pub fn root(&self) -> &Path {
        self.tree.path()
    }

    /// Roots redirected into the fake tree.
    pub fn roots(&self) -> &SysRoots {
        &self.roots
    }

    /// Roots that were in effect before installation.
    pub fn previous_roots(&self) -> &SysRoots {
        &self.previous
    }

    /// Every entry of the tree relative to its root, in sorted order.
    /// Symlinks are listed but not followed.
    pub fn manifest(&self) -> Result<Vec<PathBuf>> {
        let root = self.root();
        let mut entries = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| HarnessError::Setup {
                path: root.to_path_buf(),
                source: e.into(),
            })?;
            if let Ok(rel) = entry.path().strip_prefix(root) {
                entries.push(rel.to_path_buf());
            }
        }
        Ok(entries)
    }

    /// Keep the tree on disk and return its root. Nothing is restored.
    pub fn keep(self) -> PathBuf {
        self.tree.keep()
    }

    /// Restore the captured working directory, close its handle and delete
    /// the tree. Returns the roots that were in effect before installation.
    pub fn uninstall(self) -> Result<SysRoots> {
        let FakeSysfs {
            tree,
            saved_cwd,
            previous,
            ..
        } = self;
        let root = tree.path().to_path_buf();
        debug!(root = %root.display(), "removing fake sysfs");

        nix::unistd::fchdir(saved_cwd.as_raw_fd())
            .map_err(|errno| HarnessError::teardown(&root)(io::Error::from(errno)))?;
        nix::unistd::close(saved_cwd.into_raw_fd())
            .map_err(|errno| HarnessError::teardown(&root)(io::Error::from(errno)))?;
        tree.close().map_err(HarnessError::teardown(&root))?;

        Ok(previous)
    }
}

/// Remove a tree previously kept with [`FakeSysfs::keep`].
///
/// Refuses paths whose final component does not carry [`TREE_PREFIX`].
pub fn remove_kept(root: &Path) -> Result<()> {
    let named_like_tree = root
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(TREE_PREFIX))
        .unwrap_or(false);
    if !named_like_tree {
        return Err(HarnessError::Teardown {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a fake sysfs tree"),
        });
    }
    fs::remove_dir_all(root).map_err(HarnessError::teardown(root))
}
