// mocked_sriov.rs: run SR-IOV configuration code against a fake sysfs tree and
// a link-control double, or keep a fake tree around for shell-driven tests.
// Usage: cargo run --bin mocked-sriov -- <command>

mod script;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sriov_harness::sysfs::{self, FakeSysfs};
use sriov_harness::{logging, with_harness, Harness, HarnessConfig, SysRoots};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{exit, Command as Process};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "mocked-sriov",
    version,
    about = "Fake sysfs and link-control double for SR-IOV tests"
)]
struct Cli {
    /// Harness configuration (TOML). Defaults to the stock SR-IOV fixture.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the call log. Falls back to $DEFAULT_CNI_DIR.
    #[arg(long, global = true)]
    record_dir: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a fake tree, print its roots and leave it on disk.
    Build {
        /// Also print every entry of the tree.
        #[arg(long)]
        manifest: bool,
    },
    /// Remove a tree left behind by `build`.
    Teardown { root: PathBuf },
    /// Run a command with the fake roots exported, then tear everything down.
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },
    /// Apply a script of recorded calls to the double and print the PF as JSON.
    Replay {
        /// Script path, or `-` for stdin.
        script: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut cfg = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    let record_dir = cli
        .record_dir
        .clone()
        .or_else(|| std::env::var_os("DEFAULT_CNI_DIR").map(PathBuf::from));
    if let Some(dir) = record_dir {
        cfg = cfg.with_record_dir(dir);
    }
    Ok(cfg)
}

fn build(cfg: &HarnessConfig, manifest: bool) -> Result<i32> {
    let tree = FakeSysfs::install(&cfg.sysfs, SysRoots::default())?;
    println!("root={}", tree.root().display());
    println!("sys_bus_pci={}", tree.roots().sys_bus_pci.display());
    println!("net_directory={}", tree.roots().net_directory.display());
    if manifest {
        for entry in tree.manifest()? {
            println!("{}", entry.display());
        }
    }
    let root = tree.keep();
    info!(root = %root.display(), "fake sysfs kept");
    Ok(0)
}

fn exec(cfg: &HarnessConfig, cmd: &[String]) -> Result<i32> {
    let harness = Harness::install(cfg)?;
    let mut child = Process::new(&cmd[0]);
    child
        .args(&cmd[1..])
        .env("SRIOV_SYS_BUS_PCI", &harness.roots().sys_bus_pci)
        .env("SRIOV_NET_DIRECTORY", &harness.roots().net_directory);
    if let Some(rec) = harness.links().recorder() {
        child.env("SRIOV_CALL_LOG", rec.path());
    }

    let status = child.status();
    harness.uninstall()?;

    let status = status.with_context(|| format!("failed to run `{}`", cmd[0]))?;
    info!(%status, "command finished");
    Ok(status.code().unwrap_or(1))
}

fn read_script(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).context("reading script from stdin")?;
        Ok(text)
    } else {
        fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))
    }
}

fn replay(cfg: &HarnessConfig, path: &Path) -> Result<i32> {
    let text = read_script(path)?;
    let outcome = with_harness(cfg, |harness| -> Result<String> {
        let double = harness.links_mut();
        for (n, line) in text.lines().enumerate() {
            let parsed = script::parse_line(line).with_context(|| format!("line {}", n + 1))?;
            let Some(call) = parsed else {
                continue;
            };
            script::apply(double, &call)
                .with_context(|| format!("line {}: {}", n + 1, line.trim()))?;
        }
        Ok(serde_json::to_string_pretty(double.pf())?)
    })?;
    println!("{}", outcome?);
    Ok(0)
}

fn run(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Command::Teardown { root } => {
            sysfs::remove_kept(root)?;
            Ok(0)
        }
        Command::Build { manifest } => build(&load_config(cli)?, *manifest),
        Command::Exec { cmd } => exec(&load_config(cli)?, cmd),
        Command::Replay { script } => replay(&load_config(cli)?, script),
    }
}

fn main() {
    let cli = Cli::parse();
    let guard = match logging::init(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("mocked-sriov: {e:#}");
            exit(2);
        }
    };

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("mocked-sriov: {e:#}");
            1
        }
    };

    drop(guard);
    exit(code);
}
