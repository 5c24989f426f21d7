//! Remote probe - runs the fixed diagnostic command on one host

use crate::transport::{Credentials, ExecRequest, ProbeFailure, RemoteShell};
use std::time::Duration;

pub const DEFAULT_COMMAND: &str = "netstat";

#[derive(Debug)]
pub struct Probe<S> {
    shell: S,
    credentials: Credentials,
    command: String,
    port: u16,
}

impl<S: RemoteShell> Probe<S> {
    pub fn new(shell: S, credentials: Credentials) -> Self {
        Self { shell, credentials, command: DEFAULT_COMMAND.to_string(), port: 22 }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// One attempt against `address`; callers must have validated the address
    pub async fn probe(&self, address: &str, timeout: Duration) -> Result<String, ProbeFailure> {
        self.shell
            .execute(ExecRequest {
                host: address.to_string(),
                port: self.port,
                credentials: self.credentials.clone(),
                command: self.command.clone(),
                timeout,
            })
            .await
    }
}
