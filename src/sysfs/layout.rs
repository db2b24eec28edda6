//! Declarative description of the fake sysfs tree.
//!
//! Every path in a [`SysfsLayout`] is relative to the tree root (no leading
//! `/`). Maps are ordered so trees are always built in the same sequence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PF_DEV: &str = "sys/devices/pci0000:ae/0000:ae:00.0/0000:af:00.1";
const VF0_DEV: &str = "sys/devices/pci0000:ae/0000:ae:00.0/0000:af:06.0";
const VF1_DEV: &str = "sys/devices/pci0000:ae/0000:ae:00.0/0000:af:06.1";
const ENS1_DEV: &str = "sys/devices/pci0000:00/0000:00:02.0/0000:05:00.0";

/// Directories, attribute files and the three symlink classes of a fake tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysfsLayout {
    pub dirs: Vec<String>,
    /// Attribute file path -> literal content.
    pub files: BTreeMap<String, String>,
    /// `sys/class/net/<iface>` -> the interface directory under its device.
    pub net_links: BTreeMap<String, String>,
    /// `device` links and `sys/bus/pci/devices/<addr>` -> PCI device directory.
    pub dev_links: BTreeMap<String, String>,
    /// `virtfnN` and `physfn` links between PF and VF device directories.
    pub vf_links: BTreeMap<String, String>,
}

impl Default for SysfsLayout {
    fn default() -> Self {
        Self::sriov_fixture()
    }
}

impl SysfsLayout {
    /// An empty layout, useful as a starting point for custom trees.
    pub fn empty() -> Self {
        SysfsLayout {
            dirs: Vec::new(),
            files: BTreeMap::new(),
            net_links: BTreeMap::new(),
            dev_links: BTreeMap::new(),
            vf_links: BTreeMap::new(),
        }
    }

    /// The stock fixture: an SR-IOV PF `enp175s0f1` (0000:af:00.1) with two
    /// bound VFs, plus a dual-port card `ens1`/`ens1d1` with SR-IOV disabled.
    pub fn sriov_fixture() -> Self {
        let mut layout = Self::empty();
        layout.dirs.push("sys/class/net".to_string());
        layout.dirs.push("sys/bus/pci/devices".to_string());

        layout.add_interface(PF_DEV, "0000:af:00.1", "enp175s0f1");
        layout.add_interface(VF0_DEV, "0000:af:06.0", "enp175s6");
        layout.add_interface(VF1_DEV, "0000:af:06.1", "enp175s7");
        layout.add_interface(ENS1_DEV, "0000:05:00.0", "ens1");
        layout.add_interface(ENS1_DEV, "0000:05:00.0", "ens1d1");

        layout.add_vf(PF_DEV, 0, VF0_DEV);
        layout.add_vf(PF_DEV, 1, VF1_DEV);
        layout.set_numvfs(PF_DEV, 2);
        layout.set_numvfs(ENS1_DEV, 0);
        layout
    }

    /// Register a network interface bound to the PCI device at `device_dir`.
    pub fn add_interface(&mut self, device_dir: &str, pci_addr: &str, iface: &str) {
        let iface_dir = format!("{device_dir}/net/{iface}");
        let class_link = format!("sys/class/net/{iface}");
        self.dirs.push(iface_dir.clone());
        self.dev_links
            .insert(format!("{class_link}/device"), device_dir.to_string());
        self.dev_links.insert(
            format!("sys/bus/pci/devices/{pci_addr}"),
            device_dir.to_string(),
        );
        self.net_links.insert(class_link, iface_dir);
    }

    /// Bind the VF device at `vf_dir` to the PF at `pf_dir` as `virtfn<index>`.
    pub fn add_vf(&mut self, pf_dir: &str, index: u32, vf_dir: &str) {
        self.vf_links
            .insert(format!("{pf_dir}/virtfn{index}"), vf_dir.to_string());
        self.vf_links
            .insert(format!("{vf_dir}/physfn"), pf_dir.to_string());
    }

    pub fn set_numvfs(&mut self, pf_dir: &str, count: u32) {
        self.files
            .insert(format!("{pf_dir}/sriov_numvfs"), count.to_string());
    }

    /// Iterate over the three symlink classes in creation order.
    pub fn symlinks(&self) -> impl Iterator<Item = (&String, &String)> {
        self.net_links
            .iter()
            .chain(self.dev_links.iter())
            .chain(self.vf_links.iter())
    }
}
