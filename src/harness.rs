//! One installed fake sysfs plus one link double, as a single context value.
//!
//! Code under test receives [`Harness::roots`] and [`Harness::link_ops`]
//! instead of reading process-wide state. Installation builds the tree first
//! and the double second; [`Harness::uninstall`] tears them down in reverse.

use crate::config::HarnessConfig;
use crate::errors::Result;
use crate::netlink::{LinkDouble, LinkOps};
use crate::sysfs::{FakeSysfs, SysRoots};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Harness {
    links: LinkDouble,
    sysfs: FakeSysfs,
}

impl Harness {
    /// Install over the host's default roots.
    pub fn install(config: &HarnessConfig) -> Result<Self> {
        Self::install_over(config, SysRoots::default())
    }

    /// Install, redirecting `previous` into the fake tree.
    pub fn install_over(config: &HarnessConfig, previous: SysRoots) -> Result<Self> {
        let sysfs = FakeSysfs::install(&config.sysfs, previous)?;
        let links = match LinkDouble::from_config(&config.links) {
            Ok(links) => links,
            Err(e) => {
                if let Err(teardown) = sysfs.uninstall() {
                    warn!(error = %teardown, "fake sysfs teardown after failed install");
                }
                return Err(e);
            }
        };
        debug!(root = %sysfs.root().display(), backing = ?links.backing(), "harness installed");
        Ok(Harness { links, sysfs })
    }

    pub fn roots(&self) -> &SysRoots {
        self.sysfs.roots()
    }

    pub fn sysfs(&self) -> &FakeSysfs {
        &self.sysfs
    }

    pub fn sysfs_root(&self) -> &Path {
        self.sysfs.root()
    }

    pub fn links(&self) -> &LinkDouble {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut LinkDouble {
        &mut self.links
    }

    /// The double behind the link-control seam.
    pub fn link_ops(&mut self) -> &mut dyn LinkOps {
        &mut self.links
    }

    /// Drop the double (and its namespace), then remove the tree.
    /// Returns the roots that were in effect before installation.
    pub fn uninstall(self) -> Result<SysRoots> {
        let Harness { links, sysfs } = self;
        drop(links);
        let previous = sysfs.uninstall()?;
        debug!("harness uninstalled");
        Ok(previous)
    }
}

/// Install a harness, run `f` against it, and uninstall it again.
///
/// Teardown runs whatever `f` returns; a panic inside `f` still removes the
/// tree and namespace through their drop guards.
pub fn with_harness<R>(config: &HarnessConfig, f: impl FnOnce(&mut Harness) -> R) -> Result<R> {
    let mut harness = Harness::install(config)?;
    let out = f(&mut harness);
    harness.uninstall()?;
    Ok(out)
}
