use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Identifier of an attached accelerator device.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Remote inference disabled")]
    Disabled,
    #[error("No remote device attached")]
    NoDevice,
    #[error("Remote command `{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
    #[error("Remote command `{command}` failed (status {status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("Failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Local staging failed: {0}")]
    Staging(String),
    #[error("Remote result unreadable: {0}")]
    BadResult(String),
}

/// Moves files to and from an attached device and runs commands on it.
///
/// Steps are bounded by the transport's own timeout; a step that exceeds it
/// returns [`TransportError::Timeout`].
pub trait RemoteTransport: Send {
    fn discover(&mut self) -> Result<Option<DeviceId>, TransportError>;

    fn push(&mut self, device: &DeviceId, local: &Path, remote_dir: &str)
        -> Result<(), TransportError>;

    fn execute(&mut self, device: &DeviceId, args: &[&str]) -> Result<(), TransportError>;

    fn pull(&mut self, device: &DeviceId, remote: &str, local_dir: &Path)
        -> Result<(), TransportError>;

    fn remove(&mut self, device: &DeviceId, remote: &str) -> Result<(), TransportError>;
}
