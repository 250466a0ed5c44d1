//! Container-daemon command vocabulary over an SSH session (§4.5).

use std::time::Duration;

use futures::Stream;

use crate::error::{GscpError, Result};
use crate::ssh::exec::shell_quote;
use crate::ssh::SshClient;
use crate::tags::PortSpec;

const DOCKER: &str = "sudo docker";

/// Container daemon commands run against one already-connected SSH session.
pub struct RemoteDocker<'a> {
    ssh: &'a SshClient,
}

impl<'a> RemoteDocker<'a> {
    pub fn new(ssh: &'a SshClient) -> Self {
        Self { ssh }
    }

    /// Poll until the container daemon responds, or fail after `retries`.
    pub async fn wait_ready(&self, retries: u32, delay: Duration) -> Result<()> {
        for attempt in 0..retries {
            let out = self.ssh.run(&format!("{DOCKER} info > /dev/null 2>&1")).await?;
            if out.success() {
                return Ok(());
            }
            if attempt + 1 == retries {
                return Err(GscpError::remote("container daemon did not become available"));
            }
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    pub async fn pull(&self, image: &str) -> Result<()> {
        let out = self.ssh.run(&format!("{DOCKER} pull {}", shell_quote(image))).await?;
        if !out.success() {
            return Err(GscpError::remote(format!("failed to pull image {image}: {}", out.output)));
        }
        Ok(())
    }

    fn build_args(
        &self,
        container_name: &str,
        image: &str,
        ports: &[PortSpec],
        env: &std::collections::HashMap<String, String>,
        volumes: &[String],
        extra_args: &[String],
    ) -> String {
        let mut parts = vec![format!("--name {}", shell_quote(container_name))];
        for port in ports {
            parts.push(format!("-p {}", port.docker_publish()));
        }
        for (key, value) in env {
            parts.push(format!("-e {}", shell_quote(&format!("{key}={value}"))));
        }
        for (i, vol) in volumes.iter().enumerate() {
            let volume_name = format!("{container_name}-data-{i}");
            parts.push(format!("-v {}", shell_quote(&format!("{volume_name}:{vol}"))));
        }
        parts.extend(extra_args.iter().cloned());
        parts.push(shell_quote(image));
        parts.join(" ")
    }

    pub async fn run(
        &self,
        container_name: &str,
        image: &str,
        ports: &[PortSpec],
        env: &std::collections::HashMap<String, String>,
        volumes: &[String],
        extra_args: &[String],
    ) -> Result<()> {
        let args = self.build_args(container_name, image, ports, env, volumes, extra_args);
        let out = self.ssh.run(&format!("{DOCKER} run -d {args}")).await?;
        if !out.success() {
            return Err(GscpError::remote(format!("failed to start container: {}", out.output)));
        }
        Ok(())
    }

    pub async fn create(
        &self,
        container_name: &str,
        image: &str,
        ports: &[PortSpec],
        env: &std::collections::HashMap<String, String>,
        volumes: &[String],
        extra_args: &[String],
    ) -> Result<()> {
        let args = self.build_args(container_name, image, ports, env, volumes, extra_args);
        let out = self.ssh.run(&format!("{DOCKER} create {args}")).await?;
        if !out.success() {
            return Err(GscpError::remote(format!("failed to create container: {}", out.output)));
        }
        Ok(())
    }

    pub async fn start(&self, container_name: &str) -> Result<()> {
        let out = self.ssh.run(&format!("{DOCKER} start {}", shell_quote(container_name))).await?;
        if !out.success() {
            return Err(GscpError::remote(format!("failed to start container: {}", out.output)));
        }
        Ok(())
    }

    pub async fn stop(&self, container_name: &str) -> Result<()> {
        let out = self.ssh.run(&format!("{DOCKER} stop {}", shell_quote(container_name))).await?;
        if !out.success() {
            return Err(GscpError::remote(format!("failed to stop container: {}", out.output)));
        }
        Ok(())
    }

    pub async fn rm(&self, container_name: &str) -> Result<()> {
        let out = self.ssh.run(&format!("{DOCKER} rm {}", shell_quote(container_name))).await?;
        if !out.success() {
            return Err(GscpError::remote(format!("failed to remove container: {}", out.output)));
        }
        Ok(())
    }

    /// Materialise a directory tree inside a container, even while stopped,
    /// via a tar-stream `cp` (there is no `mkdir` for a stopped container).
    pub async fn ensure_dir(&self, container_name: &str, path: &str) -> Result<()> {
        let stripped = path.trim_start_matches('/');
        if stripped.is_empty() {
            return Ok(());
        }
        let staging = "/tmp/_gscp_mkdir";
        let cmd = format!(
            "rm -rf {staging} && mkdir -p {staging}/{quoted_path} && \
             tar -cf - -C {staging} . | {DOCKER} cp - {target} && rm -rf {staging}",
            quoted_path = shell_quote(stripped),
            target = shell_quote(&format!("{container_name}:/")),
        );
        let out = self.ssh.run(&cmd).await?;
        if !out.success() {
            return Err(GscpError::remote(format!("failed to create directory {path} in container: {}", out.output)));
        }
        Ok(())
    }

    pub async fn cp_to(&self, container_name: &str, src: &str, dest: &str) -> Result<()> {
        if let Some(parent) = std::path::Path::new(dest).parent() {
            let parent = parent.to_string_lossy();
            if !parent.is_empty() && parent != "/" {
                self.ensure_dir(container_name, &parent).await?;
            }
        }
        let out = self
            .ssh
            .run(&format!(
                "{DOCKER} cp {} {}",
                shell_quote(src),
                shell_quote(&format!("{container_name}:{dest}"))
            ))
            .await?;
        if !out.success() {
            return Err(GscpError::remote(format!("failed to copy file into container: {}", out.output)));
        }
        Ok(())
    }

    pub async fn cp_from(&self, container_name: &str, src: &str, dest: &str) -> Result<()> {
        let out = self
            .ssh
            .run(&format!(
                "{DOCKER} cp {} {}",
                shell_quote(&format!("{container_name}:{src}")),
                shell_quote(dest)
            ))
            .await?;
        if !out.success() {
            return Err(GscpError::remote(format!("failed to copy file from container: {}", out.output)));
        }
        Ok(())
    }

    /// The first `<tool>-*` container on the host, running or stopped.
    pub async fn find_tool_container(&self, tool_name: &str) -> Result<Option<String>> {
        let out = self
            .ssh
            .run(&format!(
                "{DOCKER} ps -a --filter name={tool_name}- --format '{{{{.Names}}}}'"
            ))
            .await?;
        if !out.success() || out.output.trim().is_empty() {
            return Ok(None);
        }
        Ok(out.output.trim().lines().next().map(|s| s.to_string()))
    }

    pub async fn container_exists(&self, container_name: &str) -> Result<bool> {
        let out = self
            .ssh
            .run(&format!(
                "{DOCKER} inspect {} > /dev/null 2>&1",
                shell_quote(container_name)
            ))
            .await?;
        Ok(out.success())
    }

    pub async fn is_running(&self, container_name: &str) -> Result<bool> {
        let out = self
            .ssh
            .run(&format!(
                "{DOCKER} inspect --format='{{{{.State.Running}}}}' {}",
                shell_quote(container_name)
            ))
            .await?;
        Ok(out.success() && out.output.trim() == "true")
    }

    pub async fn exec(&self, container_name: &str, command: &str) -> Result<String> {
        let out = self
            .ssh
            .run(&format!("{DOCKER} exec {} {command}", shell_quote(container_name)))
            .await?;
        if !out.success() {
            return Err(GscpError::remote(format!("command in container failed: {}", out.output)));
        }
        Ok(out.output)
    }

    pub async fn logs(&self, container_name: &str, tail: Option<u32>) -> Result<String> {
        let mut cmd = format!("{DOCKER} logs {}", shell_quote(container_name));
        if let Some(n) = tail {
            cmd.push_str(&format!(" --tail {n}"));
        }
        let out = self.ssh.run(&cmd).await?;
        Ok(out.output)
    }

    /// Follows the container's log stream, yielding chunks as the remote
    /// `docker logs -f` produces them rather than waiting for it to exit.
    pub fn logs_follow(&self, container_name: &str, tail: Option<u32>) -> impl Stream<Item = Result<String>> + '_ {
        let mut cmd = format!("{DOCKER} logs -f {}", shell_quote(container_name));
        if let Some(n) = tail {
            cmd.push_str(&format!(" --tail {n}"));
        }
        self.ssh.run_streaming(cmd)
    }

    /// Resolve which container belongs to this server: prefer the name the
    /// local record already knows, falling back to discovery on the host
    /// if it has drifted (e.g. a peer recreated it under a new name).
    pub async fn resolve_container(&self, tool_name: &str, known_name: &str) -> Result<String> {
        if self.container_exists(known_name).await? {
            return Ok(known_name.to_string());
        }
        match self.find_tool_container(tool_name).await? {
            Some(found) => Ok(found),
            None => Err(GscpError::remote(format!(
                "no {tool_name}-managed container found on host"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Protocol;

    #[test]
    fn docker_publish_matches_expected_format() {
        let port = PortSpec::new(27015, Protocol::Tcp);
        assert_eq!(port.docker_publish(), "27015:27015/tcp");
    }
}
