//! Test doubles for SR-IOV device-configuration code: a fake `/sys` tree for
//! PCI physical and virtual functions, and a configurable stand-in for the
//! kernel link-control API.

pub mod config;
pub mod errors;
pub mod harness;
pub mod logging;
pub mod netlink;
pub mod sysfs;

pub use crate::config::{HarnessConfig, LinksConfig};
pub use crate::errors::{HarnessError, Result};
pub use crate::harness::{with_harness, Harness};
pub use crate::netlink::{Backing, HostLinks, Link, LinkDouble, LinkOps, MacAddr};
pub use crate::sysfs::{FakeSysfs, SysRoots, SysfsLayout};
