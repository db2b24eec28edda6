//! Link-control operations and their implementations.
//!
//! [`LinkOps`] is the seam device-configuration code is written against.
//! [`HostLinks`] drives the running kernel; [`LinkDouble`] is the test double.

pub mod double;
pub mod host;
pub mod netns;
pub mod recorder;
pub mod types;

pub use double::{Backing, LinkDouble};
pub use host::HostLinks;
pub use recorder::{read_session, CallRecorder};
pub use types::{AdminState, Link, MacAddr, VfInfo, VfLinkState, VlanProto};

use crate::errors::{HarnessError, Result};
use std::os::fd::RawFd;

/// The link-configuration API consumed by SR-IOV device code.
///
/// Every method except [`link_by_name`](Self::link_by_name) has a default
/// body returning [`HarnessError::Unsupported`], so a partial implementation
/// fails loudly on the calls it does not handle.
pub trait LinkOps {
    fn link_by_name(&mut self, name: &str) -> Result<Link>;

    fn link_set_up(&mut self, _link: &Link) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_up"))
    }

    fn link_set_down(&mut self, _link: &Link) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_down"))
    }

    fn link_set_hardware_addr(&mut self, _link: &Link, _addr: MacAddr) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_hardware_addr"))
    }

    fn link_set_vf_hardware_addr(&mut self, _pf: &Link, _vf: u32, _addr: MacAddr) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_vf_hardware_addr"))
    }

    fn link_set_vf_vlan_qos_proto(
        &mut self,
        _pf: &Link,
        _vf: u32,
        _vlan: u16,
        _qos: u8,
        _proto: VlanProto,
    ) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_vf_vlan_qos_proto"))
    }

    fn link_set_vf_rate(
        &mut self,
        _pf: &Link,
        _vf: u32,
        _min_rate: u32,
        _max_rate: u32,
    ) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_vf_rate"))
    }

    fn link_set_vf_spoofchk(&mut self, _pf: &Link, _vf: u32, _on: bool) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_vf_spoofchk"))
    }

    fn link_set_vf_trust(&mut self, _pf: &Link, _vf: u32, _trusted: bool) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_vf_trust"))
    }

    fn link_set_vf_state(&mut self, _pf: &Link, _vf: u32, _state: VfLinkState) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_vf_state"))
    }

    fn link_set_name(&mut self, _link: &Link, _name: &str) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_name"))
    }

    /// Move the link into the network namespace open as `ns_fd`.
    fn link_set_ns_fd(&mut self, _link: &Link, _ns_fd: RawFd) -> Result<()> {
        Err(HarnessError::Unsupported("link_set_ns_fd"))
    }

    fn link_add_alt_name(&mut self, _link: &Link, _name: &str) -> Result<()> {
        Err(HarnessError::Unsupported("link_add_alt_name"))
    }

    fn link_del_alt_name(&mut self, _link: &Link, _name: &str) -> Result<()> {
        Err(HarnessError::Unsupported("link_del_alt_name"))
    }
}
