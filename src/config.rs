//! Harness configuration, loadable from TOML.
//!
//! ```toml
//! [links]
//! pf_name = "enp175s0f1"
//! vf_names = ["enp175s6", "enp175s7"]
//! record_dir = "/tmp/calls"
//! backing = "in-memory"   # or "namespace"
//!
//! [sysfs]                  # optional; each field given replaces the fixture's
//! dirs = ["sys/class/net"]
//! ```

use crate::errors::{HarnessError, Result};
use crate::netlink::Backing;
use crate::sysfs::SysfsLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which links the double tracks and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    pub pf_name: String,
    pub vf_names: Vec<String>,
    /// When set, calls are recorded into `<record_dir>/<pf_name>.calls`.
    pub record_dir: Option<PathBuf>,
    pub backing: Backing,
}

impl Default for LinksConfig {
    fn default() -> Self {
        LinksConfig {
            pf_name: "enp175s0f1".to_string(),
            vf_names: vec!["enp175s6".to_string(), "enp175s7".to_string()],
            record_dir: None,
            backing: Backing::InMemory,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub links: LinksConfig,
    pub sysfs: SysfsLayout,
}

impl HarnessConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| HarnessError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn with_record_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.links.record_dir = Some(dir.into());
        self
    }
}
