use std::io;
use std::process::{Command, Output};

/// A Linux network namespace managed via `ip netns`.
///
/// Creates the namespace on construction, brings loopback up, and deletes
/// the namespace (and every link still inside it) on drop.
#[derive(Debug)]
pub struct Namespace {
    name: String,
}

impl Namespace {
    pub fn new(name: &str) -> io::Result<Self> {
        // cleanup any leftover namespace with the same name
        let _ = Command::new("ip").args(["netns", "del", name]).output();

        let output = Command::new("ip").args(["netns", "add", name]).output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "Failed to create netns {}: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let ns = Namespace {
            name: name.to_string(),
        };
        let _ = ns.exec("ip", &["link", "set", "lo", "up"]);
        Ok(ns)
    }

    /// Create a namespace named `<prefix>-<random hex>`.
    pub fn with_unique_name(prefix: &str) -> io::Result<Self> {
        let name = format!("{}-{:08x}", prefix, rand::random::<u32>());
        Self::new(&name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exec(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        Command::new("ip")
            .args(["netns", "exec", &self.name, cmd])
            .args(args)
            .output()
    }

    /// Add a `dummy` link called `link` inside the namespace.
    pub fn add_dummy_link(&self, link: &str) -> io::Result<()> {
        let output = self.exec("ip", &["link", "add", link, "type", "dummy"])?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "Failed to add dummy link {} in {}: {}",
                link,
                self.name,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl Drop for Namespace {
    fn drop(&mut self) {
        let _ = Command::new("ip")
            .args(["netns", "del", &self.name])
            .status();
    }
}

/// Whether this process can back links with a namespace: running as root,
/// with a working `ip` tool and a kernel that creates `dummy` links.
/// Namespace-backed tests skip themselves otherwise.
pub fn check_privileges() -> bool {
    if !nix::unistd::geteuid().is_root() {
        return false;
    }
    match Command::new("ip").arg("netns").output() {
        Ok(o) if o.status.success() => {}
        _ => return false,
    }
    supports_dummy_links()
}

/// Add and drop a dummy link inside a scratch namespace.
fn supports_dummy_links() -> bool {
    let Ok(scratch) = Namespace::with_unique_name("sriovchk") else {
        return false;
    };
    match scratch.add_dummy_link("chk0") {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "dummy links unavailable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn namespace_holds_dummy_link() {
        if !check_privileges() {
            eprintln!("Skipping test, insufficient privileges or missing tools");
            return;
        }

        let ns = Namespace::with_unique_name("sriovt").expect("Failed to create ns");
        ns.add_dummy_link("dummy0").expect("Failed to add dummy");
        let out = ns.exec("ip", &["link"]).expect("Failed to exec ip link");
        let listing = String::from_utf8_lossy(&out.stdout);
        assert!(listing.contains("lo"));
        assert!(listing.contains("dummy0"));
    }

    #[test]
    #[serial]
    fn privilege_check_implies_dummy_support() {
        if !check_privileges() {
            eprintln!("Skipping test, insufficient privileges or missing tools");
            return;
        }
        // The check leaves no scratch namespace behind.
        let out = Command::new("ip").args(["netns", "list"]).output().unwrap();
        assert!(!String::from_utf8_lossy(&out.stdout).contains("sriovchk-"));
    }

    #[test]
    #[serial]
    fn namespace_is_removed_on_drop() {
        if !check_privileges() {
            eprintln!("Skipping test, insufficient privileges or missing tools");
            return;
        }

        let name = {
            let ns = Namespace::with_unique_name("sriovt").expect("Failed to create ns");
            ns.name().to_string()
        };
        let out = Command::new("ip").args(["netns", "list"]).output().unwrap();
        assert!(!String::from_utf8_lossy(&out.stdout).contains(&name));
    }
}
