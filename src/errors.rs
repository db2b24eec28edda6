use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the fake sysfs tree and the link-control double.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// A directory, attribute file or symlink of the fake tree could not be created.
    #[error("failed to set up fake sysfs at `{path}`: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Restoring the working directory or deleting the fake tree failed.
    #[error("failed to tear down fake sysfs at `{path}`: {source}")]
    Teardown {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No tracked or real link carries this name.
    #[error("link not found: {0}")]
    NotFound(String),

    /// The virtual-function index is not present in the PF's VF table.
    #[error("VF index {index} out of range for link `{link}`")]
    IndexOutOfRange { link: String, index: u32 },

    /// A real OS call failed; its error is passed through untouched.
    #[error(transparent)]
    Forwarding(io::Error),

    /// The operation is not wired into this `LinkOps` implementation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// Layout or harness configuration could not be read or parsed.
    #[error("invalid harness configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    pub(crate) fn setup(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| HarnessError::Setup { path, source }
    }

    pub(crate) fn teardown(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| HarnessError::Teardown { path, source }
    }
}
