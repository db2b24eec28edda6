//! [`LinkOps`] against the running kernel, driven through the `ip` tool.
//!
//! Every failure of a real call surfaces as [`HarnessError::Forwarding`]
//! carrying the tool's own message, except a lookup of a missing device,
//! which is [`HarnessError::NotFound`].

use super::types::{AdminState, Link, MacAddr, VfInfo, VfLinkState, VlanProto};
use super::LinkOps;
use crate::errors::{HarnessError, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io;
use std::os::fd::RawFd;
use std::process::{Command, Output};
use tracing::debug;

/// Real link control, optionally scoped to a named network namespace.
#[derive(Debug, Clone, Default)]
pub struct HostLinks {
    netns: Option<String>,
}

impl HostLinks {
    /// Operate on the namespace this process lives in.
    pub fn new() -> Self {
        HostLinks { netns: None }
    }

    /// Operate on links inside the named namespace (`ip -n <netns>`).
    pub fn in_namespace(netns: impl Into<String>) -> Self {
        HostLinks {
            netns: Some(netns.into()),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new("ip");
        if let Some(ns) = &self.netns {
            cmd.args(["-n", ns]);
        }
        debug!(netns = ?self.netns, args = ?args, "ip");
        cmd.args(args).output().map_err(HarnessError::Forwarding)
    }

    fn set(&self, args: &[&str]) -> Result<()> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(HarnessError::Forwarding(io::Error::other(format!(
                "ip {}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ))));
        }
        Ok(())
    }

    /// Remove an alternate name, treating one the kernel does not know as
    /// already removed.
    pub(crate) fn del_alt_name_if_present(&self, link: &Link, name: &str) -> Result<()> {
        let output = self.run(&["link", "property", "del", "dev", &link.name, "altname", name])?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_absent_alt_name(&stderr) {
            debug!(link = %link.name, altname = name, "altname already absent");
            return Ok(());
        }
        Err(HarnessError::Forwarding(io::Error::other(format!(
            "ip link property del dev {} altname {}: {}",
            link.name,
            name,
            stderr.trim()
        ))))
    }

    fn set_link(&self, link: &Link, rest: &[&str]) -> Result<()> {
        let mut args = vec!["link", "set", "dev", link.name.as_str()];
        args.extend_from_slice(rest);
        self.set(&args)
    }

    fn set_vf(&self, pf: &Link, vf: u32, rest: &[&str]) -> Result<()> {
        let vf = vf.to_string();
        let mut args = vec!["vf", vf.as_str()];
        args.extend_from_slice(rest);
        self.set_link(pf, &args)
    }
}

/// The kernel answers ENOENT when deleting an altname the link lacks.
fn is_absent_alt_name(stderr: &str) -> bool {
    stderr.contains("No such file or directory")
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

#[derive(Debug, Deserialize)]
struct IpLink {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    altnames: Vec<String>,
    #[serde(default)]
    vfinfo_list: Vec<IpVfInfo>,
}

#[derive(Debug, Deserialize)]
struct IpVfInfo {
    vf: u32,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    spoofchk: bool,
    #[serde(default)]
    trust: bool,
    #[serde(default)]
    link_state: Option<String>,
    #[serde(default)]
    rate: Option<IpVfRate>,
}

#[derive(Debug, Default, Deserialize)]
struct IpVfRate {
    #[serde(default)]
    max_tx: u32,
    #[serde(default)]
    min_tx: u32,
}

impl From<IpLink> for Link {
    fn from(raw: IpLink) -> Link {
        let mut link = Link::new(raw.ifname, raw.ifindex);
        if raw.flags.iter().any(|f| f == "UP") {
            link.state = AdminState::Up;
        }
        link.hardware_addr = raw.address.and_then(|a| a.parse().ok());
        link.alt_names = raw.altnames.into_iter().collect::<BTreeSet<_>>();
        for vf in raw.vfinfo_list {
            let rate = vf.rate.unwrap_or_default();
            let info = VfInfo {
                id: vf.vf,
                mac: vf.address.and_then(|a| a.parse::<MacAddr>().ok()),
                min_tx_rate: rate.min_tx,
                max_tx_rate: rate.max_tx,
                spoofchk: vf.spoofchk,
                trust: u32::from(vf.trust),
                link_state: vf
                    .link_state
                    .and_then(|s| s.parse::<VfLinkState>().ok())
                    .unwrap_or_default(),
                ..VfInfo::new(vf.vf)
            };
            link.vfs.insert(vf.vf, info);
        }
        link
    }
}

/// Parse the JSON printed by `ip -j link show dev <name>`.
fn parse_link_json(json: &[u8]) -> Result<Option<Link>> {
    let mut links: Vec<IpLink> = serde_json::from_slice(json)
        .map_err(|e| HarnessError::Forwarding(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    Ok(if links.is_empty() {
        None
    } else {
        Some(links.swap_remove(0).into())
    })
}

impl LinkOps for HostLinks {
    fn link_by_name(&mut self, name: &str) -> Result<Link> {
        let output = self.run(&["-j", "link", "show", "dev", name])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("does not exist") {
                return Err(HarnessError::NotFound(name.to_string()));
            }
            return Err(HarnessError::Forwarding(io::Error::other(format!(
                "ip link show dev {}: {}",
                name,
                stderr.trim()
            ))));
        }
        parse_link_json(&output.stdout)?.ok_or_else(|| HarnessError::NotFound(name.to_string()))
    }

    fn link_set_up(&mut self, link: &Link) -> Result<()> {
        self.set_link(link, &["up"])
    }

    fn link_set_down(&mut self, link: &Link) -> Result<()> {
        self.set_link(link, &["down"])
    }

    fn link_set_hardware_addr(&mut self, link: &Link, addr: MacAddr) -> Result<()> {
        self.set_link(link, &["address", &addr.to_string()])
    }

    fn link_set_vf_hardware_addr(&mut self, pf: &Link, vf: u32, addr: MacAddr) -> Result<()> {
        self.set_vf(pf, vf, &["mac", &addr.to_string()])
    }

    fn link_set_vf_vlan_qos_proto(
        &mut self,
        pf: &Link,
        vf: u32,
        vlan: u16,
        qos: u8,
        proto: VlanProto,
    ) -> Result<()> {
        self.set_vf(
            pf,
            vf,
            &["vlan", &vlan.to_string(), "qos", &qos.to_string(), "proto", proto.as_str()],
        )
    }

    fn link_set_vf_rate(&mut self, pf: &Link, vf: u32, min_rate: u32, max_rate: u32) -> Result<()> {
        self.set_vf(
            pf,
            vf,
            &["min_tx_rate", &min_rate.to_string(), "max_tx_rate", &max_rate.to_string()],
        )
    }

    fn link_set_vf_spoofchk(&mut self, pf: &Link, vf: u32, on: bool) -> Result<()> {
        self.set_vf(pf, vf, &["spoofchk", on_off(on)])
    }

    fn link_set_vf_trust(&mut self, pf: &Link, vf: u32, trusted: bool) -> Result<()> {
        self.set_vf(pf, vf, &["trust", on_off(trusted)])
    }

    fn link_set_vf_state(&mut self, pf: &Link, vf: u32, state: VfLinkState) -> Result<()> {
        self.set_vf(pf, vf, &["state", state.as_str()])
    }

    fn link_set_name(&mut self, link: &Link, name: &str) -> Result<()> {
        self.set_link(link, &["name", name])
    }

    fn link_set_ns_fd(&mut self, link: &Link, ns_fd: RawFd) -> Result<()> {
        // `ip` runs in a child process; reach our descriptor through /proc.
        let ns_path = format!("/proc/{}/fd/{}", std::process::id(), ns_fd);
        self.set_link(link, &["netns", &ns_path])
    }

    fn link_add_alt_name(&mut self, link: &Link, name: &str) -> Result<()> {
        self.set(&["link", "property", "add", "dev", &link.name, "altname", name])
    }

    fn link_del_alt_name(&mut self, link: &Link, name: &str) -> Result<()> {
        self.set(&["link", "property", "del", "dev", &link.name, "altname", name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW_PF: &str = r#"[{"ifindex":7,"ifname":"enp175s0f1",
        "flags":["BROADCAST","MULTICAST","UP","LOWER_UP"],"mtu":1500,"operstate":"UP",
        "address":"3c:fd:fe:aa:bb:cc","altnames":["enp175s0f1np1"],
        "vfinfo_list":[{"vf":0,"address":"ab:cd:ef:ab:cd:ef","spoofchk":true,"trust":false,
        "link_state":"auto","rate":{"max_tx":100,"min_tx":10}},
        {"vf":1,"address":"00:00:00:00:00:00","spoofchk":false,"trust":true,
        "link_state":"disable"}]}]"#;

    #[test]
    fn missing_altname_is_recognised() {
        assert!(is_absent_alt_name("RTNETLINK answers: No such file or directory\n"));
        assert!(!is_absent_alt_name("RTNETLINK answers: Operation not permitted\n"));
    }

    #[test]
    fn parses_link_with_vf_table() {
        let link = parse_link_json(SHOW_PF.as_bytes()).unwrap().unwrap();
        assert_eq!(link.name, "enp175s0f1");
        assert_eq!(link.index, 7);
        assert!(link.is_up());
        assert_eq!(link.hardware_addr.unwrap().to_string(), "3c:fd:fe:aa:bb:cc");
        assert!(link.alt_names.contains("enp175s0f1np1"));

        let vf0 = link.vf(0).unwrap();
        assert_eq!(vf0.mac.unwrap().to_string(), "ab:cd:ef:ab:cd:ef");
        assert!(vf0.spoofchk);
        assert_eq!((vf0.min_tx_rate, vf0.max_tx_rate), (10, 100));

        let vf1 = link.vf(1).unwrap();
        assert_eq!(vf1.trust, 1);
        assert_eq!(vf1.link_state, VfLinkState::Disable);
    }

    #[test]
    fn parses_minimal_link() {
        let json = br#"[{"ifindex":1,"ifname":"lo","flags":["LOOPBACK"]}]"#;
        let link = parse_link_json(json).unwrap().unwrap();
        assert!(!link.is_up());
        assert!(link.hardware_addr.is_none());
        assert!(link.vfs.is_empty());
    }

    #[test]
    fn empty_listing_is_none() {
        assert!(parse_link_json(b"[]").unwrap().is_none());
    }

    #[test]
    fn garbage_is_forwarding_error() {
        assert!(matches!(
            parse_link_json(b"not json"),
            Err(HarnessError::Forwarding(_))
        ));
    }
}
