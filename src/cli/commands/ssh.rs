//! `gscp ssh` — run a command on a server's host, or print the native
//! `ssh` invocation to connect interactively.
//!
//! The remote driver only ever needs non-interactive command execution
//! (§4.5); there is no PTY/shell forwarding here, so an interactive session
//! goes through the system `ssh` binary using the same managed key.

use console::style;

use crate::config::AppConfig;
use crate::error::{GscpError, Result};
use crate::reconciler::Reconciler;
use crate::ssh::{SshClient, SshConfig};
use crate::state::ServerState;

pub async fn execute(
    config: &AppConfig,
    servers: &ServerState,
    reconciler: &Reconciler,
    id: &str,
    command: Option<&str>,
) -> Result<()> {
    reconciler.auto_reconcile().await;

    let record = servers
        .get_by_name_or_id(id)
        .await
        .ok_or_else(|| GscpError::CloudNotFound(id.to_string()))?;

    if record.public_ip.is_empty() {
        return Err(GscpError::config(format!("{} has no public IP yet", record.name)));
    }

    let key_path = config.state_dir()?.join("ssh_key");

    match command {
        Some(cmd) => {
            let ssh_config = SshConfig::new(config.ssh_user.clone(), key_path);
            let client = SshClient::connect(&record.public_ip, 22, &ssh_config).await?;
            let output = client.run(cmd).await?;
            print!("{}", output.output);
            client.close().await.ok();
            if !output.success() {
                return Err(GscpError::remote(format!("command exited with status {}", output.exit_code)));
            }
            Ok(())
        }
        None => {
            println!(
                "{} {} {}",
                style("→").bold(),
                style(&record.name).white().bold(),
                style(format!("({})", &record.public_ip)).dim()
            );
            println!();
            println!(
                "  {}",
                style(format!(
                    "ssh -i {} -o StrictHostKeyChecking=no {}@{}",
                    key_path.display(),
                    config.ssh_user,
                    record.public_ip
                ))
                .cyan()
            );
            Ok(())
        }
    }
}
