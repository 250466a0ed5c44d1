//! SSH client implementation using russh.
//!
//! Authenticates with the single managed RSA key only — no SSH agent, no
//! passphrase handling, no fallback chain. Host keys are always accepted:
//! these are ephemeral game-server VMs the tool itself just provisioned,
//! not hosts a human has any independent way to verify.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use russh::client::{self, Handle};
use tokio::sync::Mutex;

use crate::error::{GscpError, Result};
use crate::ssh::config::SshConfig;
use crate::ssh::exec::CommandOutput;
use crate::ssh::keys::load_key_pair;
use crate::ssh::sftp::SftpClient;

const CONNECT_ATTEMPTS: u32 = 12;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// SSH client wrapper over russh. Cloning shares the same underlying
/// session, which is what lets a launch-cleanup path close a session
/// opened deeper in the call stack.
#[derive(Clone)]
pub struct SshClient {
    session: Arc<Mutex<Handle<ClientHandler>>>,
}

impl SshClient {
    /// Connect to an SSH server, retrying up to [`CONNECT_ATTEMPTS`] times
    /// (§4.5) to absorb the window between an instance reaching `running`
    /// and sshd actually accepting connections.
    pub async fn connect(host: &str, port: u16, config: &SshConfig) -> Result<Self> {
        let mut last_err = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match Self::try_connect(host, port, config).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    tracing::debug!("SSH connect attempt {attempt}/{CONNECT_ATTEMPTS} failed: {e}");
                    last_err = Some(e);
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| GscpError::remote("unable to connect to host")))
    }

    async fn try_connect(host: &str, port: u16, config: &SshConfig) -> Result<Self> {
        let russh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(15)),
            keepalive_max: 4,
            ..Default::default()
        });

        let addr = format!("{host}:{port}")
            .to_socket_addrs()
            .map_err(|e| GscpError::remote(format!("failed to resolve {host}: {e}")))?
            .next()
            .ok_or_else(|| GscpError::remote(format!("no address found for {host}")))?;

        let mut session = client::connect(russh_config, addr, ClientHandler)
            .await
            .map_err(|e| GscpError::remote(format!("SSH connection to {host}:{port} failed: {e}")))?;

        Self::authenticate(&mut session, config).await?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
        })
    }

    async fn authenticate(session: &mut Handle<ClientHandler>, config: &SshConfig) -> Result<()> {
        let key = load_key_pair(&config.key_path)?;

        let authenticated = session
            .authenticate_publickey(&config.user, Arc::new(key))
            .await
            .map_err(|e| GscpError::remote(format!("authentication failed: {e}")))?;

        if authenticated {
            Ok(())
        } else {
            Err(GscpError::remote(format!(
                "SSH authentication rejected for user {}",
                config.user
            )))
        }
    }

    /// Execute a command on the remote host (non-interactive), returning
    /// merged stdout+stderr and the exit code.
    pub async fn run(&self, command: &str) -> Result<CommandOutput> {
        let session = self.session.lock().await;
        crate::ssh::exec::exec_command(&session, command, None).await
    }

    /// Execute a command with an `on_debug` callback observing the
    /// invocation and its result, per the §6 status-callback contract.
    pub async fn run_with_debug(
        &self,
        command: &str,
        on_debug: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<CommandOutput> {
        let session = self.session.lock().await;
        crate::ssh::exec::exec_command(&session, command, Some(on_debug)).await
    }

    /// Execute a command, returning an error if it exits non-zero.
    pub async fn exec(&self, command: &str) -> Result<String> {
        let out = self.run(command).await?;
        if !out.success() {
            return Err(GscpError::remote(format!(
                "command `{command}` exited {}: {}",
                out.exit_code, out.output
            )));
        }
        Ok(out.output)
    }

    /// Execute a single command, yielding its output lazily as chunks
    /// arrive rather than buffering the whole run (§4.5). A non-zero exit
    /// surfaces as the stream's final error.
    pub fn run_streaming(&self, command: impl Into<String>) -> impl Stream<Item = Result<String>> + '_ {
        let command = command.into();
        try_stream! {
            let session = self.session.lock().await;
            let mut chunks = std::pin::pin!(crate::ssh::exec::exec_command_streaming(&session, command));
            while let Some(chunk) = chunks.next().await {
                yield chunk?;
            }
        }
    }

    /// Get an SFTP client for file transfers.
    pub async fn sftp(&self) -> Result<SftpClient> {
        let session = self.session.lock().await;
        SftpClient::new(&session).await
    }

    pub async fn upload(&self, local_path: impl AsRef<std::path::Path>, remote_path: &str) -> Result<()> {
        self.sftp().await?.upload(local_path, remote_path).await
    }

    pub async fn upload_bytes(&self, content: &[u8], remote_path: &str) -> Result<()> {
        self.sftp().await?.upload_bytes(content, remote_path).await
    }

    pub async fn download(&self, remote_path: &str, local_path: impl AsRef<std::path::Path>) -> Result<()> {
        self.sftp().await?.download(remote_path, local_path).await
    }

    pub async fn close(&self) -> Result<()> {
        let session = self.session.lock().await;
        session
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
            .map_err(|e| GscpError::remote(format!("failed to close SSH session: {e}")))
    }
}

/// Client handler for russh connection callbacks. Host keys are always
/// accepted — see module docs.
pub struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = GscpError;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}
