use crate::errors::HarnessError;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::os::fd::RawFd;
use std::str::FromStr;

/// A 48-bit Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || HarnessError::Config(format!("invalid hardware address `{s}`"));
        let mut bytes = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(bad)?;
            if part.len() != 2 {
                return Err(bad());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| bad())?;
        }
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(MacAddr(bytes))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Administrative state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    Up,
    #[default]
    Down,
}

/// Per-VF link state as understood by the kernel (`IFLA_VF_LINK_STATE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VfLinkState {
    #[default]
    Auto,
    Enable,
    Disable,
}

impl VfLinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            VfLinkState::Auto => "auto",
            VfLinkState::Enable => "enable",
            VfLinkState::Disable => "disable",
        }
    }
}

impl From<VfLinkState> for u32 {
    fn from(state: VfLinkState) -> u32 {
        match state {
            VfLinkState::Auto => 0,
            VfLinkState::Enable => 1,
            VfLinkState::Disable => 2,
        }
    }
}

impl TryFrom<u32> for VfLinkState {
    type Error = HarnessError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(VfLinkState::Auto),
            1 => Ok(VfLinkState::Enable),
            2 => Ok(VfLinkState::Disable),
            other => Err(HarnessError::Config(format!("unknown VF link state {other}"))),
        }
    }
}

impl fmt::Display for VfLinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VfLinkState {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(VfLinkState::Auto),
            "enable" => Ok(VfLinkState::Enable),
            "disable" => Ok(VfLinkState::Disable),
            other => other
                .parse::<u32>()
                .map_err(|_| HarnessError::Config(format!("unknown VF link state `{other}`")))
                .and_then(VfLinkState::try_from),
        }
    }
}

/// VLAN tag protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum VlanProto {
    #[default]
    #[serde(rename = "802.1Q")]
    Dot1Q,
    #[serde(rename = "802.1ad")]
    Dot1Ad,
}

impl VlanProto {
    pub fn as_str(self) -> &'static str {
        match self {
            VlanProto::Dot1Q => "802.1Q",
            VlanProto::Dot1Ad => "802.1ad",
        }
    }
}

impl fmt::Display for VlanProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VlanProto {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "802.1q" | "0x8100" | "33024" => Ok(VlanProto::Dot1Q),
            "802.1ad" | "0x88a8" | "34984" => Ok(VlanProto::Dot1Ad),
            _ => Err(HarnessError::Config(format!("unknown VLAN protocol `{s}`"))),
        }
    }
}

/// Attributes of one virtual function as seen from its PF.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VfInfo {
    pub id: u32,
    pub mac: Option<MacAddr>,
    pub min_tx_rate: u32,
    pub max_tx_rate: u32,
    pub spoofchk: bool,
    /// 1 when trusted, 0 otherwise.
    pub trust: u32,
    pub link_state: VfLinkState,
    pub vlan: u16,
    pub qos: u8,
    pub vlan_proto: VlanProto,
}

impl VfInfo {
    pub fn new(id: u32) -> Self {
        VfInfo {
            id,
            ..Default::default()
        }
    }
}

/// A network link: either a tracked double or a snapshot of a real one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Link {
    pub name: String,
    pub index: u32,
    pub state: AdminState,
    pub hardware_addr: Option<MacAddr>,
    pub alt_names: BTreeSet<String>,
    /// Namespace file descriptor the link was last moved into.
    pub netns_fd: Option<RawFd>,
    pub vfs: BTreeMap<u32, VfInfo>,
}

impl Link {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Link {
            name: name.into(),
            index,
            ..Default::default()
        }
    }

    pub fn is_up(&self) -> bool {
        self.state == AdminState::Up
    }

    pub fn vf(&self, index: u32) -> Option<&VfInfo> {
        self.vfs.get(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_parses_and_prints_lowercase() {
        let mac: MacAddr = "AB:cd:EF:01:02:03".parse().unwrap();
        assert_eq!(mac, MacAddr::new([0xab, 0xcd, 0xef, 0x01, 0x02, 0x03]));
        assert_eq!(mac.to_string(), "ab:cd:ef:01:02:03");
    }

    #[test]
    fn mac_rejects_malformed_input() {
        for bad in [
            "",
            "ab:cd:ef:01:02",
            "ab:cd:ef:01:02:03:04",
            "abc:d:ef:01:02:03",
            "zz:cd:ef:01:02:03",
        ] {
            assert!(bad.parse::<MacAddr>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn vf_link_state_accepts_names_and_numbers() {
        assert_eq!("enable".parse::<VfLinkState>().unwrap(), VfLinkState::Enable);
        assert_eq!("2".parse::<VfLinkState>().unwrap(), VfLinkState::Disable);
        assert!("7".parse::<VfLinkState>().is_err());
        assert_eq!(u32::from(VfLinkState::Auto), 0);
    }

    #[test]
    fn vlan_proto_accepts_ethertypes() {
        assert_eq!("0x88a8".parse::<VlanProto>().unwrap(), VlanProto::Dot1Ad);
        assert_eq!("802.1Q".parse::<VlanProto>().unwrap(), VlanProto::Dot1Q);
    }

    #[test]
    fn new_link_starts_down() {
        let link = Link::new("eth0", 3);
        assert!(!link.is_up());
        assert!(link.vfs.is_empty());
    }
}
