use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn mocked_sriov() -> Command {
    let mut cmd = Command::cargo_bin("mocked-sriov").unwrap();
    cmd.env_remove("DEFAULT_CNI_DIR").env("RUST_LOG", "warn");
    cmd
}

fn field(stdout: &str, key: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix(&format!("{key}=")).map(PathBuf::from))
}

#[test]
fn build_keeps_a_tree_and_teardown_removes_it() {
    let out = mocked_sriov().args(["build", "--manifest"]).assert().success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();

    let root = field(&stdout, "root").expect("root line");
    let net = field(&stdout, "net_directory").expect("net_directory line");
    assert!(net.join("enp175s0f1/device/sriov_numvfs").is_file());
    assert!(stdout.lines().any(|l| l == "sys/class/net/enp175s0f1"));

    mocked_sriov()
        .arg("teardown")
        .arg(&root)
        .assert()
        .success();
    assert!(!root.exists());
}

#[test]
fn teardown_refuses_other_directories() {
    let dir = TempDir::new().unwrap();
    mocked_sriov()
        .arg("teardown")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a fake sysfs tree"));
    assert!(dir.path().exists());
}

#[test]
fn exec_exports_roots_and_passes_exit_code() {
    let calls = TempDir::new().unwrap();
    let out = mocked_sriov()
        .arg("--record-dir")
        .arg(calls.path())
        .args([
            "exec",
            "sh",
            "-c",
            "echo \"numvfs=$(cat \"$SRIOV_NET_DIRECTORY/enp175s0f1/device/sriov_numvfs\")\"; \
             echo \"log=$SRIOV_CALL_LOG\"; echo \"bus=$SRIOV_SYS_BUS_PCI\"; exit 3",
        ])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("numvfs=2\n"));

    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    let log = field(&stdout, "log").expect("log line");
    assert_eq!(log, calls.path().join("enp175s0f1.calls"));
    calls.child("enp175s0f1.calls").assert("---\n");

    // The tree is gone once the command returns.
    let bus = field(&stdout, "bus").expect("bus line");
    assert!(!bus.exists());
}

#[test]
fn replay_applies_script_and_records_it() {
    let calls = TempDir::new().unwrap();
    let script = calls.child("setup.calls");
    script
        .write_str(
            "---\n\
             # trust both VFs\n\
             link_set_vf_trust enp175s0f1 0 true\n\
             link_set_vf_trust enp175s0f1 1 true\n\
             link_set_vf_vlan_qos_proto enp175s0f1 1 100 3 802.1Q\n\
             link_set_up enp175s6\n",
        )
        .unwrap();

    mocked_sriov()
        .arg("--record-dir")
        .arg(calls.path())
        .arg("replay")
        .arg(script.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"enp175s0f1\""))
        .stdout(predicate::str::contains("\"trust\": 1"))
        .stdout(predicate::str::contains("\"vlan\": 100"));

    // Replaying a session reproduces it line for line.
    let recorded = fs::read_to_string(calls.path().join("enp175s0f1.calls")).unwrap();
    assert_eq!(
        recorded,
        "---\n\
         link_set_vf_trust enp175s0f1 0 true\n\
         link_set_vf_trust enp175s0f1 1 true\n\
         link_set_vf_vlan_qos_proto enp175s0f1 1 100 3 802.1Q\n\
         link_set_up enp175s6\n"
    );
}

#[test]
fn replay_reports_the_failing_line() {
    mocked_sriov()
        .args(["replay", "-"])
        .write_stdin(
            "link_set_vf_spoofchk enp175s0f1 0 true\n\
             link_set_vf_trust enp175s0f1 5 true\n",
        )
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("VF index 5 out of range"));
}

#[test]
fn config_file_renames_the_pf() {
    let dir = TempDir::new().unwrap();
    let config = dir.child("harness.toml");
    config
        .write_str("[links]\npf_name = \"ens9f0\"\nvf_names = [\"ens9f0v0\"]\n")
        .unwrap();

    mocked_sriov()
        .arg("--config")
        .arg(config.path())
        .args(["replay", "-"])
        .write_stdin("link_set_vf_state ens9f0 0 disable\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"link_state\": \"disable\""));
}

#[test]
fn log_file_receives_tracing_output() {
    let dir = TempDir::new().unwrap();
    let log = dir.child("harness.log");
    mocked_sriov()
        .env("RUST_LOG", "debug")
        .arg("--log-file")
        .arg(log.path())
        .args(["exec", "true"])
        .assert()
        .success();
    log.assert(predicate::str::contains("harness installed"));
}
