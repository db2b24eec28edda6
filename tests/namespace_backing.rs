use serial_test::serial;

use sriov_harness::netlink::netns::check_privileges;
use sriov_harness::netlink::read_session;
use sriov_harness::{Backing, HostLinks, LinkDouble, LinkOps, LinksConfig, MacAddr};

fn namespace_config() -> LinksConfig {
    LinksConfig {
        pf_name: "sriovpf0".to_string(),
        vf_names: vec!["sriovvf0".to_string(), "sriovvf1".to_string()],
        record_dir: None,
        backing: Backing::Namespace,
    }
}

// Whole-link calls reach the dummy links in the namespace; VF calls stay in
// the double's records.
#[test]
#[serial]
fn whole_link_calls_are_forwarded() {
    if !check_privileges() {
        eprintln!("Skipping test, insufficient privileges or missing tools");
        return;
    }

    let calls = assert_fs::TempDir::new().unwrap();
    let mut cfg = namespace_config();
    cfg.record_dir = Some(calls.path().to_path_buf());
    let mut links = LinkDouble::from_config(&cfg).expect("namespace double");
    assert_eq!(links.backing(), Backing::Namespace);
    let ns = links.netns_name().expect("namespace name").to_string();
    let mut real = HostLinks::in_namespace(&ns);

    let pf = links.link_by_name("sriovpf0").unwrap();
    assert_eq!(pf.index, real.link_by_name("sriovpf0").unwrap().index);

    links.link_set_up(&pf).unwrap();
    assert!(real.link_by_name("sriovpf0").unwrap().is_up());

    let mac = MacAddr::new([0x02, 0x42, 0, 0, 0, 0x07]);
    let vf0 = links.vf_link(0).cloned().unwrap();
    links.link_set_hardware_addr(&vf0, mac).unwrap();
    assert_eq!(real.link_by_name("sriovvf0").unwrap().hardware_addr, Some(mac));

    links.link_set_vf_trust(&pf, 1, true).unwrap();
    assert_eq!(links.pf().vf(1).map(|vf| vf.trust), Some(1));

    let session = read_session(&calls.path().join("sriovpf0.calls")).unwrap();
    assert_eq!(session.len(), 4, "{session:?}");

    drop(links);
    let listing = std::process::Command::new("ip")
        .args(["netns", "list"])
        .output()
        .unwrap();
    assert!(!String::from_utf8_lossy(&listing.stdout).contains(&ns));
}

#[test]
#[serial]
fn kernel_rejection_is_passed_through_and_not_recorded() {
    if !check_privileges() {
        eprintln!("Skipping test, insufficient privileges or missing tools");
        return;
    }

    let mut links = LinkDouble::from_config(&namespace_config()).expect("namespace double");
    let vf1 = links.vf_link(1).cloned().unwrap();
    // A multicast address is refused by the kernel.
    let err = links
        .link_set_hardware_addr(&vf1, MacAddr::new([0x01, 0, 0x5e, 0, 0, 1]))
        .unwrap_err();
    assert!(matches!(err, sriov_harness::HarnessError::Forwarding(_)), "{err}");
    assert_eq!(links.vf_link(1).and_then(|l| l.hardware_addr), vf1.hardware_addr);
}

// An altname the double never added is still removed from the kernel link,
// and deleting it a second time is not an error.
#[test]
#[serial]
fn alt_name_delete_reaches_the_kernel() {
    if !check_privileges() {
        eprintln!("Skipping test, insufficient privileges or missing tools");
        return;
    }

    let mut links = LinkDouble::from_config(&namespace_config()).expect("namespace double");
    let ns = links.netns_name().expect("namespace name").to_string();
    let mut real = HostLinks::in_namespace(&ns);
    let pf = links.pf().clone();

    if let Err(e) = real.link_add_alt_name(&pf, "sriovpf0alt") {
        eprintln!("Skipping test, kernel lacks altnames: {e}");
        return;
    }
    assert!(!links.pf().alt_names.contains("sriovpf0alt"));

    links.link_del_alt_name(&pf, "sriovpf0alt").unwrap();
    let after = real.link_by_name("sriovpf0").unwrap();
    assert!(!after.alt_names.contains("sriovpf0alt"), "{:?}", after.alt_names);

    links.link_del_alt_name(&pf, "sriovpf0alt").unwrap();
}

#[test]
#[serial]
fn existing_alt_names_are_tracked() {
    if !check_privileges() {
        eprintln!("Skipping test, insufficient privileges or missing tools");
        return;
    }

    let mut links = LinkDouble::from_config(&namespace_config()).expect("namespace double");
    let ns = links.netns_name().expect("namespace name").to_string();
    let real = HostLinks::in_namespace(&ns).link_by_name("sriovvf0").unwrap();
    assert_eq!(links.vf_link(0).map(|l| &l.alt_names), Some(&real.alt_names));

    let vf0 = links.vf_link(0).cloned().unwrap();
    if links.link_add_alt_name(&vf0, "sriovvf0alt").is_err() {
        eprintln!("Skipping test, kernel lacks altnames");
        return;
    }
    let real = HostLinks::in_namespace(&ns).link_by_name("sriovvf0").unwrap();
    assert_eq!(links.vf_link(0).map(|l| &l.alt_names), Some(&real.alt_names));
}
