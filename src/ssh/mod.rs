//! Pure Rust SSH implementation.
//!
//! Replaces external SSH binaries (ssh, scp, ssh-keygen) with native Rust
//! libraries for a self-contained binary.
//!
//! ## Modules
//!
//! - [`keys`] - SSH key generation and fingerprinting for the shared-key manager
//! - [`client`] - SSH connection management
//! - [`exec`] - Remote command execution
//! - [`sftp`] - File transfer via SFTP
//! - [`config`] - Connection configuration

mod client;
pub mod config;
pub mod exec;
pub mod keys;
mod sftp;

pub use client::SshClient;
pub use config::SshConfig;

use std::time::Duration;
use tokio::net::TcpStream;

use crate::error::{GscpError, Result};

/// Wait for the SSH port to accept TCP connections (no protocol handshake).
pub async fn wait_for_ssh(host: &str, port: u16, timeout: Duration) -> Result<()> {
    let start = std::time::Instant::now();
    let addr = format!("{host}:{port}");

    while start.elapsed() < timeout {
        if TcpStream::connect(&addr).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    Err(GscpError::remote(format!("timeout waiting for SSH port on {addr}")))
}

/// Wait for SSH login to actually succeed — port open plus key accepted
/// plus a command running, per the §4.5 readiness contract.
pub async fn wait_for_ssh_login(host: &str, config: &SshConfig, timeout: Duration) -> Result<()> {
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if let Ok(client) = SshClient::connect(host, 22, config).await {
            if let Ok(out) = client.run("echo ok").await {
                if out.success() {
                    return Ok(());
                }
            }
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    Err(GscpError::remote(format!(
        "timeout waiting for SSH login as {}@{host}",
        config.user
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_ssh_times_out_on_closed_port() {
        let result = wait_for_ssh("127.0.0.1", 59999, Duration::from_millis(100)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn wait_for_ssh_succeeds_once_port_is_open() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let result = wait_for_ssh("127.0.0.1", port, Duration::from_secs(5)).await;
        assert!(result.is_ok());
    }
}
