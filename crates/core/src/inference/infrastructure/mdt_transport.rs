use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::inference::domain::remote_transport::{DeviceId, RemoteTransport, TransportError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Talks to a Coral dev board through the Mendel Development Tool CLI.
///
/// Every command gets its own deadline. The discovered device name is passed
/// to follow-up commands through `MDT_DEVICE`.
pub struct MdtTransport {
    program: String,
    step_timeout: Duration,
}

impl MdtTransport {
    pub fn new(program: impl Into<String>, step_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            step_timeout,
        }
    }

    fn run(&self, device: Option<&DeviceId>, args: &[&str]) -> Result<String, TransportError> {
        let mut command = Command::new(&self.program);
        command.args(args);
        if let Some(device) = device {
            command.env("MDT_DEVICE", device.as_str());
        }
        let label = format!("{} {}", self.program, args.join(" "));
        log::debug!("Running `{label}`");
        run_command(command, &label, self.step_timeout)
    }
}

impl RemoteTransport for MdtTransport {
    fn discover(&mut self) -> Result<Option<DeviceId>, TransportError> {
        let stdout = self.run(None, &["devices"])?;
        Ok(parse_devices(&stdout))
    }

    fn push(
        &mut self,
        device: &DeviceId,
        local: &Path,
        remote_dir: &str,
    ) -> Result<(), TransportError> {
        let local = local.to_string_lossy();
        self.run(Some(device), &["push", &*local, remote_dir])
            .map(drop)
    }

    fn execute(&mut self, device: &DeviceId, args: &[&str]) -> Result<(), TransportError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("exec");
        full.extend_from_slice(args);
        self.run(Some(device), &full).map(drop)
    }

    fn pull(
        &mut self,
        device: &DeviceId,
        remote: &str,
        local_dir: &Path,
    ) -> Result<(), TransportError> {
        let local_dir = local_dir.to_string_lossy();
        self.run(Some(device), &["pull", remote, &*local_dir])
            .map(drop)
    }

    fn remove(&mut self, device: &DeviceId, remote: &str) -> Result<(), TransportError> {
        self.run(Some(device), &["exec", "rm", "-f", remote])
            .map(drop)
    }
}

/// First whitespace-separated token of the first non-empty line.
pub fn parse_devices(stdout: &str) -> Option<DeviceId> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split_whitespace().next())
        .map(DeviceId::new)
}

/// Run a child process to completion or kill it at `timeout`.
///
/// Returns stdout on a zero exit status.
pub fn run_command(
    mut command: Command,
    label: &str,
    timeout: Duration,
) -> Result<String, TransportError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TransportError::Spawn {
            program: command.get_program().to_string_lossy().into_owned(),
            source,
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TransportError::Timeout {
                    command: label.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TransportError::Spawn {
                    program: label.to_string(),
                    source,
                });
            }
        }
    };

    let stdout = stdout.map(collect).unwrap_or_default();
    let stderr = stderr.map(collect).unwrap_or_default();
    if !status.success() {
        return Err(TransportError::CommandFailed {
            command: label.to_string(),
            status: describe(status),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(stdout)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
