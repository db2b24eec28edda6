//! Replay scripts: one call per line in the call-record format.

use anyhow::{anyhow, bail, Context, Result};
use sriov_harness::netlink::recorder::SESSION_SENTINEL;
use sriov_harness::netlink::{Link, LinkDouble, LinkOps, MacAddr, VfLinkState, VlanProto};
use std::os::fd::RawFd;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LinkByName(String),
    SetUp(String),
    SetDown(String),
    SetHardwareAddr(String, MacAddr),
    SetVfHardwareAddr(String, u32, MacAddr),
    SetVfVlanQosProto(String, u32, u16, u8, VlanProto),
    SetVfRate(String, u32, u32, u32),
    SetVfSpoofchk(String, u32, bool),
    SetVfTrust(String, u32, bool),
    SetVfState(String, u32, VfLinkState),
    SetName(String, String),
    SetNsFd(String, RawFd),
    AddAltName(String, String),
    DelAltName(String, String),
}

fn arg<T>(args: &[&str], i: usize, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = args
        .get(i)
        .with_context(|| format!("missing argument {} ({})", i + 1, what))?;
    raw.parse::<T>()
        .map_err(|e| anyhow!("bad {} `{}`: {}", what, raw, e))
}

fn bool_arg(args: &[&str], i: usize, what: &str) -> Result<bool> {
    match args.get(i).copied() {
        Some("true") | Some("on") | Some("1") => Ok(true),
        Some("false") | Some("off") | Some("0") => Ok(false),
        Some(other) => bail!("bad {} `{}`", what, other),
        None => bail!("missing argument {} ({})", i + 1, what),
    }
}

/// Parse one script line. Blank lines, `#` comments and the session
/// sentinel yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Call>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line == SESSION_SENTINEL {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let method = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    let name = || arg::<String>(&args, 0, "link name");

    let call = match method {
        "link_by_name" => Call::LinkByName(name()?),
        "link_set_up" => Call::SetUp(name()?),
        "link_set_down" => Call::SetDown(name()?),
        "link_set_hardware_addr" => Call::SetHardwareAddr(name()?, arg(&args, 1, "address")?),
        "link_set_vf_hardware_addr" => Call::SetVfHardwareAddr(
            name()?,
            arg(&args, 1, "vf index")?,
            arg(&args, 2, "address")?,
        ),
        "link_set_vf_vlan_qos_proto" => Call::SetVfVlanQosProto(
            name()?,
            arg(&args, 1, "vf index")?,
            arg(&args, 2, "vlan")?,
            arg(&args, 3, "qos")?,
            arg(&args, 4, "vlan protocol")?,
        ),
        "link_set_vf_rate" => Call::SetVfRate(
            name()?,
            arg(&args, 1, "vf index")?,
            arg(&args, 2, "min rate")?,
            arg(&args, 3, "max rate")?,
        ),
        "link_set_vf_spoofchk" => Call::SetVfSpoofchk(
            name()?,
            arg(&args, 1, "vf index")?,
            bool_arg(&args, 2, "spoofchk")?,
        ),
        "link_set_vf_trust" => Call::SetVfTrust(
            name()?,
            arg(&args, 1, "vf index")?,
            bool_arg(&args, 2, "trust")?,
        ),
        "link_set_vf_state" => Call::SetVfState(
            name()?,
            arg(&args, 1, "vf index")?,
            arg(&args, 2, "link state")?,
        ),
        "link_set_name" => Call::SetName(name()?, arg(&args, 1, "new name")?),
        "link_set_ns_fd" => Call::SetNsFd(name()?, arg(&args, 1, "namespace fd")?),
        "link_add_alt_name" => Call::AddAltName(name()?, arg(&args, 1, "alt name")?),
        "link_del_alt_name" => Call::DelAltName(name()?, arg(&args, 1, "alt name")?),
        other => bail!("unknown method `{}`", other),
    };
    Ok(Some(call))
}

/// The double's own record for `name`, so replay does not log extra lookups.
/// Unknown names become a bare link the double will reject.
fn resolve(double: &LinkDouble, name: &str) -> Link {
    if double.pf().name == name {
        return double.pf().clone();
    }
    double
        .vf_links()
        .find(|(_, link)| link.name == name)
        .map(|(_, link)| link.clone())
        .unwrap_or_else(|| Link::new(name, 0))
}

pub fn apply(double: &mut LinkDouble, call: &Call) -> sriov_harness::Result<()> {
    match call {
        Call::LinkByName(n) => double.link_by_name(n).map(|_| ()),
        Call::SetUp(n) => {
            let link = resolve(double, n);
            double.link_set_up(&link)
        }
        Call::SetDown(n) => {
            let link = resolve(double, n);
            double.link_set_down(&link)
        }
        Call::SetHardwareAddr(n, addr) => {
            let link = resolve(double, n);
            double.link_set_hardware_addr(&link, *addr)
        }
        Call::SetVfHardwareAddr(n, vf, addr) => {
            let pf = resolve(double, n);
            double.link_set_vf_hardware_addr(&pf, *vf, *addr)
        }
        Call::SetVfVlanQosProto(n, vf, vlan, qos, proto) => {
            let pf = resolve(double, n);
            double.link_set_vf_vlan_qos_proto(&pf, *vf, *vlan, *qos, *proto)
        }
        Call::SetVfRate(n, vf, min, max) => {
            let pf = resolve(double, n);
            double.link_set_vf_rate(&pf, *vf, *min, *max)
        }
        Call::SetVfSpoofchk(n, vf, on) => {
            let pf = resolve(double, n);
            double.link_set_vf_spoofchk(&pf, *vf, *on)
        }
        Call::SetVfTrust(n, vf, trusted) => {
            let pf = resolve(double, n);
            double.link_set_vf_trust(&pf, *vf, *trusted)
        }
        Call::SetVfState(n, vf, state) => {
            let pf = resolve(double, n);
            double.link_set_vf_state(&pf, *vf, *state)
        }
        Call::SetName(n, new_name) => {
            let link = resolve(double, n);
            double.link_set_name(&link, new_name)
        }
        Call::SetNsFd(n, fd) => {
            let link = resolve(double, n);
            double.link_set_ns_fd(&link, *fd)
        }
        Call::AddAltName(n, alt) => {
            let link = resolve(double, n);
            double.link_add_alt_name(&link, alt)
        }
        Call::DelAltName(n, alt) => {
            let link = resolve(double, n);
            double.link_del_alt_name(&link, alt)
        }
    }
}
