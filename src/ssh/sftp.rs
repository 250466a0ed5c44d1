//! SFTP file transfer, used for uploads (§4.1 step 19) and remote-side
//! config materialization.

use std::path::Path;

use russh::client::Handle;
use russh_sftp::client::SftpSession;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{GscpError, Result};
use crate::ssh::client::ClientHandler;

pub struct SftpClient {
    session: SftpSession,
}

impl SftpClient {
    pub async fn new(ssh_session: &Handle<ClientHandler>) -> Result<Self> {
        let channel = ssh_session
            .channel_open_session()
            .await
            .map_err(|e| GscpError::remote(format!("failed to open SFTP channel: {e}")))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| GscpError::remote(format!("failed to request SFTP subsystem: {e}")))?;

        let session = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| GscpError::remote(format!("failed to initialize SFTP: {e}")))?;

        Ok(Self { session })
    }

    pub async fn upload(&self, local_path: impl AsRef<Path>, remote_path: &str) -> Result<()> {
        let local_path = local_path.as_ref();
        let content = tokio::fs::read(local_path).await?;

        let mut remote_file = self
            .session
            .create(remote_path)
            .await
            .map_err(|e| GscpError::remote(format!("failed to create remote file: {e}")))?;
        remote_file
            .write_all(&content)
            .await
            .map_err(|e| GscpError::remote(format!("failed to write remote file: {e}")))?;
        remote_file
            .shutdown()
            .await
            .map_err(|e| GscpError::remote(format!("failed to close remote file: {e}")))?;

        Ok(())
    }

    pub async fn upload_bytes(&self, content: &[u8], remote_path: &str) -> Result<()> {
        let mut remote_file = self
            .session
            .create(remote_path)
            .await
            .map_err(|e| GscpError::remote(format!("failed to create remote file: {e}")))?;
        remote_file
            .write_all(content)
            .await
            .map_err(|e| GscpError::remote(format!("failed to write remote file: {e}")))?;
        remote_file
            .shutdown()
            .await
            .map_err(|e| GscpError::remote(format!("failed to close remote file: {e}")))?;
        Ok(())
    }

    pub async fn download(&self, remote_path: &str, local_path: impl AsRef<Path>) -> Result<()> {
        let mut remote_file = self
            .session
            .open(remote_path)
            .await
            .map_err(|e| GscpError::remote(format!("failed to open remote file: {e}")))?;

        let mut content = Vec::new();
        remote_file
            .read_to_end(&mut content)
            .await
            .map_err(|e| GscpError::remote(format!("failed to read remote file: {e}")))?;

        tokio::fs::write(local_path, content).await?;
        Ok(())
    }
}
