//! Remote execution transport
//!
//! Handles one remote command run per call:
//! - Session open + password authentication + command execution
//! - Combined stdout/stderr capture
//! - Timeout covering the whole session
//! - Failure classification (transport vs. command)
//!
//! `SshShell` drives the system `ssh` client through `sshpass`. Host key
//! verification is disabled, matching the reference deployment.

use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Failure class of a probe attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Dial, authentication or timeout
    Connect,
    /// Session established, command failed
    Command,
}

/// Typed probe failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?} failure: {cause}")]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub cause: String,
}

impl ProbeFailure {
    pub fn connect(cause: impl Into<String>) -> Self {
        Self { kind: FailureKind::Connect, cause: cause.into() }
    }

    pub fn command(cause: impl Into<String>) -> Self {
        Self { kind: FailureKind::Command, cause: cause.into() }
    }
}

/// Login used for every host of the fleet
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One remote command run
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    pub command: String,
    pub timeout: Duration,
}

/// Remote-execution collaborator
pub trait RemoteShell: Send + Sync + 'static {
    /// Runs `request.command` on the remote host and returns its combined output.
    /// The session must be torn down before the future resolves, on every path.
    fn execute(&self, request: ExecRequest) -> impl Future<Output = Result<String, ProbeFailure>> + Send;
}

/// Production transport: `sshpass -e ssh ...`
#[derive(Debug, Clone)]
pub struct SshShell {
    sshpass_bin: String,
    ssh_bin: String,
}

impl Default for SshShell {
    fn default() -> Self {
        Self { sshpass_bin: "sshpass".to_string(), ssh_bin: "ssh".to_string() }
    }
}

impl SshShell {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_command(&self, request: &ExecRequest) -> AsyncCommand {
        let connect_secs = request.timeout.as_secs().max(1);
        let mut cmd = AsyncCommand::new(&self.sshpass_bin);
        cmd.arg("-e")
            .arg(&self.ssh_bin)
            .args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .args(["-o", "LogLevel=ERROR"])
            .args(["-o", "NumberOfPasswordPrompts=1"])
            .arg("-o")
            .arg(format!("ConnectTimeout={connect_secs}"))
            .arg("-p")
            .arg(request.port.to_string())
            .arg(format!("{}@{}", request.credentials.username, request.host))
            .arg(&request.command)
            .env("SSHPASS", &request.credentials.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // dropping the future on timeout kills ssh and closes the session
            .kill_on_drop(true);
        cmd
    }
}

impl RemoteShell for SshShell {
    async fn execute(&self, request: ExecRequest) -> Result<String, ProbeFailure> {
        let start_time = Instant::now();
        debug!(host = %request.host, command = %request.command, "opening ssh session");

        let output = tokio::time::timeout(request.timeout, self.build_command(&request).output())
            .await
            .map_err(|_| ProbeFailure::connect(format!("timed out after {:?}", request.timeout)))?
            .map_err(|e| ProbeFailure::connect(format!("failed to spawn {}: {e}", self.sshpass_bin)))?;

        let combined = combine_output(&output.stdout, &output.stderr);
        debug!(
            host = %request.host,
            exit = ?output.status.code(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "ssh session closed"
        );

        match classify_exit(output.status.code()) {
            None => Ok(combined),
            Some(kind) => Err(ProbeFailure {
                kind,
                cause: format!("exit {:?}: {}", output.status.code(), combined.trim()),
            }),
        }
    }
}

/// Maps an exit code to a failure class; `None` means success.
///
/// 255 is ssh's own error code. sshpass uses 3 (runtime error), 4 (unrecognized
/// prompt), 5 (bad password) and 6 (unknown host key) for failures before the
/// command runs. Those codes share one byte with the remote command's exit status,
/// so a remote command exiting 3..=6 is also reported as a connect failure.
pub fn classify_exit(code: Option<i32>) -> Option<FailureKind> {
    match code {
        Some(0) => None,
        Some(255) | Some(3..=6) | None => Some(FailureKind::Connect),
        Some(_) => Some(FailureKind::Command),
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    if stderr.is_empty() {
        stdout.into_owned()
    } else {
        format!("{stdout}\n{stderr}")
    }
}
