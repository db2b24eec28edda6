//! Configurable test double for [`LinkOps`].
//!
//! One physical function and its virtual functions are tracked in memory.
//! Two independent switches are chosen at construction: call recording (a
//! record directory is set or not) and the [`Backing`]. With
//! [`Backing::Namespace`] the PF and every VF exist as dummy links in a fresh
//! network namespace and whole-link operations are forwarded to them before
//! the records change. Per-VF attributes are kept in the records only, since
//! dummy links carry no VF table.
//!
//! Only successful calls are recorded. A call rejected by the double or by
//! the kernel leaves no line in the log.

use super::host::HostLinks;
use super::netns::Namespace;
use super::recorder::CallRecorder;
use super::types::{AdminState, Link, MacAddr, VfInfo, VfLinkState, VlanProto};
use super::LinkOps;
use crate::config::LinksConfig;
use crate::errors::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::os::fd::RawFd;
use std::path::Path;
use tracing::debug;

/// Interface index given to the in-memory PF; VF `n` gets `PF_INDEX + 1 + n`.
const PF_INDEX: u32 = 1000;

/// Where the tracked links live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backing {
    /// Records only; the OS is never modified.
    #[default]
    InMemory,
    /// Dummy links in an isolated network namespace.
    Namespace,
}

/// MAC a VF starts with; VF 0 gets `ab:cd:ef:ab:cd:ef`, VF 1 `ab:cd:ef:ab:cd:ee`.
/// The low 16 bits count down from `0xcdef`, so addresses are distinct for
/// every id below 65536 (the PCI limit on VFs per PF).
fn initial_vf_mac(id: u32) -> MacAddr {
    let [hi, lo] = 0xcdef_u16.wrapping_sub(id as u16).to_be_bytes();
    MacAddr::new([0xab, 0xcd, 0xef, 0xab, hi, lo])
}

#[derive(Debug)]
pub struct LinkDouble {
    pf: Link,
    vfs: BTreeMap<u32, Link>,
    recorder: Option<CallRecorder>,
    host: HostLinks,
    netns: Option<Namespace>,
}

impl LinkDouble {
    /// A pure in-memory double without recording.
    pub fn in_memory(pf_name: &str, vf_names: &[&str]) -> Self {
        let (pf, vfs) = Self::fresh_links(pf_name, vf_names.iter().copied());
        LinkDouble {
            pf,
            vfs,
            recorder: None,
            host: HostLinks::new(),
            netns: None,
        }
    }

    pub fn from_config(cfg: &LinksConfig) -> Result<Self> {
        let (mut pf, mut vfs) =
            Self::fresh_links(&cfg.pf_name, cfg.vf_names.iter().map(String::as_str));

        let (host, netns) = match cfg.backing {
            Backing::InMemory => (HostLinks::new(), None),
            Backing::Namespace => {
                let ns = Namespace::with_unique_name("sriov").map_err(HarnessError::Forwarding)?;
                let mut host = HostLinks::in_namespace(ns.name());
                for link in std::iter::once(&mut pf).chain(vfs.values_mut()) {
                    ns.add_dummy_link(&link.name)
                        .map_err(HarnessError::Forwarding)?;
                    let real = host.link_by_name(&link.name)?;
                    link.index = real.index;
                    link.hardware_addr = real.hardware_addr;
                    link.alt_names = real.alt_names;
                }
                debug!(
                    netns = ns.name(),
                    pf = %pf.name,
                    vfs = vfs.len(),
                    "namespace-backed links ready"
                );
                (host, Some(ns))
            }
        };

        let recorder = cfg
            .record_dir
            .as_deref()
            .map(|dir| CallRecorder::start(dir, &cfg.pf_name));

        Ok(LinkDouble {
            pf,
            vfs,
            recorder,
            host,
            netns,
        })
    }

    /// Start recording calls into `<dir>/<pf>.calls`.
    pub fn with_recording(mut self, dir: &Path) -> Self {
        self.recorder = Some(CallRecorder::start(dir, &self.pf.name));
        self
    }

    fn fresh_links<'a>(
        pf_name: &str,
        vf_names: impl Iterator<Item = &'a str>,
    ) -> (Link, BTreeMap<u32, Link>) {
        let mut pf = Link::new(pf_name, PF_INDEX);
        let mut vfs = BTreeMap::new();
        for (id, name) in (0u32..).zip(vf_names) {
            pf.vfs.insert(
                id,
                VfInfo {
                    mac: Some(initial_vf_mac(id)),
                    ..VfInfo::new(id)
                },
            );
            vfs.insert(id, Link::new(name, PF_INDEX + 1 + id));
        }
        (pf, vfs)
    }

    /// The tracked physical function.
    pub fn pf(&self) -> &Link {
        &self.pf
    }

    /// The tracked link of VF `index`.
    pub fn vf_link(&self, index: u32) -> Option<&Link> {
        self.vfs.get(&index)
    }

    pub fn vf_links(&self) -> impl Iterator<Item = (&u32, &Link)> {
        self.vfs.iter()
    }

    pub fn recorder(&self) -> Option<&CallRecorder> {
        self.recorder.as_ref()
    }

    pub fn backing(&self) -> Backing {
        if self.netns.is_some() {
            Backing::Namespace
        } else {
            Backing::InMemory
        }
    }

    /// Name of the backing namespace, if any.
    pub fn netns_name(&self) -> Option<&str> {
        self.netns.as_ref().map(Namespace::name)
    }

    fn record(&self, method: &str, args: fmt::Arguments<'_>) {
        if let Some(rec) = &self.recorder {
            rec.record(method, args);
        }
    }

    fn tracked_mut(&mut self, name: &str) -> Result<&mut Link> {
        if self.pf.name == name {
            return Ok(&mut self.pf);
        }
        self.vfs
            .values_mut()
            .find(|link| link.name == name)
            .ok_or_else(|| HarnessError::NotFound(name.to_string()))
    }

    /// Validate `link` is tracked, forward when namespace-backed, then apply.
    fn update_link(
        &mut self,
        link: &Link,
        forward: impl FnOnce(&mut HostLinks) -> Result<()>,
        apply: impl FnOnce(&mut Link),
    ) -> Result<()> {
        self.tracked_mut(&link.name)?;
        if self.netns.is_some() {
            forward(&mut self.host)?;
        }
        apply(self.tracked_mut(&link.name)?);
        Ok(())
    }

    /// The single bounds check every per-VF operation goes through.
    fn vf_mut(&mut self, pf: &Link, vf: u32) -> Result<&mut VfInfo> {
        if pf.name != self.pf.name {
            return Err(HarnessError::NotFound(pf.name.clone()));
        }
        self.pf
            .vfs
            .get_mut(&vf)
            .ok_or_else(|| HarnessError::IndexOutOfRange {
                link: pf.name.clone(),
                index: vf,
            })
    }
}

impl LinkOps for LinkDouble {
    fn link_by_name(&mut self, name: &str) -> Result<Link> {
        let link = if name == self.pf.name {
            self.pf.clone()
        } else {
            self.host.link_by_name(name)?
        };
        self.record("link_by_name", format_args!("{name}"));
        Ok(link)
    }

    fn link_set_up(&mut self, link: &Link) -> Result<()> {
        self.update_link(link, |h| h.link_set_up(link), |l| l.state = AdminState::Up)?;
        self.record("link_set_up", format_args!("{}", link.name));
        Ok(())
    }

    fn link_set_down(&mut self, link: &Link) -> Result<()> {
        self.update_link(link, |h| h.link_set_down(link), |l| l.state = AdminState::Down)?;
        self.record("link_set_down", format_args!("{}", link.name));
        Ok(())
    }

    fn link_set_hardware_addr(&mut self, link: &Link, addr: MacAddr) -> Result<()> {
        self.update_link(
            link,
            |h| h.link_set_hardware_addr(link, addr),
            |l| l.hardware_addr = Some(addr),
        )?;
        self.record("link_set_hardware_addr", format_args!("{} {}", link.name, addr));
        Ok(())
    }

    fn link_set_vf_hardware_addr(&mut self, pf: &Link, vf: u32, addr: MacAddr) -> Result<()> {
        self.vf_mut(pf, vf)?.mac = Some(addr);
        self.record("link_set_vf_hardware_addr", format_args!("{} {} {}", pf.name, vf, addr));
        Ok(())
    }

    fn link_set_vf_vlan_qos_proto(
        &mut self,
        pf: &Link,
        vf: u32,
        vlan: u16,
        qos: u8,
        proto: VlanProto,
    ) -> Result<()> {
        let info = self.vf_mut(pf, vf)?;
        info.vlan = vlan;
        info.qos = qos;
        info.vlan_proto = proto;
        self.record(
            "link_set_vf_vlan_qos_proto",
            format_args!("{} {} {} {} {}", pf.name, vf, vlan, qos, proto),
        );
        Ok(())
    }

    fn link_set_vf_rate(&mut self, pf: &Link, vf: u32, min_rate: u32, max_rate: u32) -> Result<()> {
        // No min <= max check; the kernel API does not enforce one either.
        let info = self.vf_mut(pf, vf)?;
        info.min_tx_rate = min_rate;
        info.max_tx_rate = max_rate;
        self.record(
            "link_set_vf_rate",
            format_args!("{} {} {} {}", pf.name, vf, min_rate, max_rate),
        );
        Ok(())
    }

    fn link_set_vf_spoofchk(&mut self, pf: &Link, vf: u32, on: bool) -> Result<()> {
        self.vf_mut(pf, vf)?.spoofchk = on;
        self.record("link_set_vf_spoofchk", format_args!("{} {} {}", pf.name, vf, on));
        Ok(())
    }

    fn link_set_vf_trust(&mut self, pf: &Link, vf: u32, trusted: bool) -> Result<()> {
        self.vf_mut(pf, vf)?.trust = u32::from(trusted);
        self.record("link_set_vf_trust", format_args!("{} {} {}", pf.name, vf, trusted));
        Ok(())
    }

    fn link_set_vf_state(&mut self, pf: &Link, vf: u32, state: VfLinkState) -> Result<()> {
        self.vf_mut(pf, vf)?.link_state = state;
        self.record("link_set_vf_state", format_args!("{} {} {}", pf.name, vf, state));
        Ok(())
    }

    fn link_set_name(&mut self, link: &Link, name: &str) -> Result<()> {
        self.update_link(
            link,
            |h| h.link_set_name(link, name),
            |l| l.name = name.to_string(),
        )?;
        self.record("link_set_name", format_args!("{} {}", link.name, name));
        Ok(())
    }

    fn link_set_ns_fd(&mut self, link: &Link, ns_fd: RawFd) -> Result<()> {
        self.update_link(
            link,
            |h| h.link_set_ns_fd(link, ns_fd),
            |l| l.netns_fd = Some(ns_fd),
        )?;
        self.record("link_set_ns_fd", format_args!("{} {}", link.name, ns_fd));
        Ok(())
    }

    fn link_add_alt_name(&mut self, link: &Link, name: &str) -> Result<()> {
        self.update_link(
            link,
            |h| h.link_add_alt_name(link, name),
            |l| {
                l.alt_names.insert(name.to_string());
            },
        )?;
        self.record("link_add_alt_name", format_args!("{} {}", link.name, name));
        Ok(())
    }

    fn link_del_alt_name(&mut self, link: &Link, name: &str) -> Result<()> {
        // Absent names succeed, in the records and in the namespace alike.
        self.update_link(
            link,
            |h| h.del_alt_name_if_present(link, name),
            |l| {
                l.alt_names.remove(name);
            },
        )?;
        self.record("link_del_alt_name", format_args!("{} {}", link.name, name));
        Ok(())
    }
}
