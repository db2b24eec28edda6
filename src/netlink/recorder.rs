//! Append-only log of double invocations, used as a test oracle.
//!
//! The log lives at `<dir>/<pf>.calls`, starts a session with a `---` line and
//! gets one `<method> <args...>` line per call. The file is opened and closed
//! for every line. Write failures are logged and otherwise ignored.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Line that opens a recording session.
pub const SESSION_SENTINEL: &str = "---";

#[derive(Debug, Clone)]
pub struct CallRecorder {
    path: PathBuf,
}

impl CallRecorder {
    /// Start a session for the PF named `pf_name` in `dir`.
    pub fn start(dir: &Path, pf_name: &str) -> Self {
        let recorder = CallRecorder {
            path: dir.join(format!("{pf_name}.calls")),
        };
        recorder.append(format_args!("{SESSION_SENTINEL}"));
        recorder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `<method> <args>` as one line.
    pub fn record(&self, method: &str, args: fmt::Arguments<'_>) {
        self.append(format_args!("{method} {args}"));
    }

    fn append(&self, line: fmt::Arguments<'_>) {
        let res = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = res {
            warn!(path = %self.path.display(), error = %e, "failed to record call");
        }
    }
}

/// Lines of the most recent session in the log at `path`, sentinel excluded.
pub fn read_session(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines
        .iter()
        .rposition(|l| *l == SESSION_SENTINEL)
        .map(|i| i + 1)
        .unwrap_or(0);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn start_seeds_sentinel() {
        let tmp = tempdir().unwrap();
        let rec = CallRecorder::start(tmp.path(), "pf0");
        assert_eq!(rec.path(), tmp.path().join("pf0.calls"));
        assert_eq!(fs::read_to_string(rec.path()).unwrap(), "---\n");
    }

    #[test]
    fn records_append_in_order() {
        let tmp = tempdir().unwrap();
        let rec = CallRecorder::start(tmp.path(), "pf0");
        rec.record("link_set_up", format_args!("{}", "pf0"));
        rec.record("link_set_vf_rate", format_args!("{} {} {} {}", "pf0", 1, 100, 50));
        assert_eq!(
            read_session(rec.path()).unwrap(),
            vec!["link_set_up pf0", "link_set_vf_rate pf0 1 100 50"]
        );
    }

    #[test]
    fn read_session_returns_latest_session_only() {
        let tmp = tempdir().unwrap();
        let first = CallRecorder::start(tmp.path(), "pf0");
        first.record("link_set_up", format_args!("pf0"));
        let second = CallRecorder::start(tmp.path(), "pf0");
        second.record("link_set_down", format_args!("pf0"));
        assert_eq!(read_session(second.path()).unwrap(), vec!["link_set_down pf0"]);
    }

    #[test]
    fn unwritable_dir_does_not_panic() {
        let tmp = tempdir().unwrap();
        let rec = CallRecorder::start(&tmp.path().join("missing"), "pf0");
        rec.record("link_set_up", format_args!("pf0"));
        assert!(!rec.path().exists());
    }
}
