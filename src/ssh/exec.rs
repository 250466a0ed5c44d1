//! Remote command execution: stdout/stderr capture and exit code.

use async_stream::try_stream;
use futures::Stream;
use russh::client::Handle;
use russh::ChannelMsg;

use crate::error::{GscpError, Result};
use crate::ssh::client::ClientHandler;

/// Output from a remote command execution: exit code and stdout+stderr
/// merged into one stream, matching the "merged output" contract of §4.5.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Single-quote escape a command string for `bash -c '...'`.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Execute a command on the remote host, returning merged stdout+stderr and
/// the exit code. `on_debug`, when set, observes the command and its exit
/// code (§6 status-callback contract).
pub async fn exec_command(
    session: &Handle<ClientHandler>,
    command: &str,
    on_debug: Option<&(dyn Fn(&str) + Send + Sync)>,
) -> Result<CommandOutput> {
    let wrapped = format!("bash --norc --noprofile -c {}", shell_quote(command));

    let mut channel = session
        .channel_open_session()
        .await
        .map_err(|e| GscpError::remote(format!("failed to open channel: {e}")))?;

    channel
        .exec(true, wrapped.as_bytes())
        .await
        .map_err(|e| GscpError::remote(format!("failed to execute command: {e}")))?;

    let mut merged = Vec::new();
    let mut exit_code = 0i32;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => merged.extend_from_slice(&data),
            Some(ChannelMsg::ExtendedData { data, .. }) => merged.extend_from_slice(&data),
            Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = exit_status as i32,
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
            _ => {}
        }
    }

    let output = String::from_utf8_lossy(&merged).to_string();

    if let Some(cb) = on_debug {
        cb(&format!("$ {command}\n(exit {exit_code})\n{output}"));
    }

    Ok(CommandOutput { exit_code, output })
}

/// Execute a single command on the remote host, yielding output chunks as
/// they arrive instead of buffering to completion (§4.5 `run_streaming`).
/// The stream ends when the command's channel closes; a non-zero exit
/// surfaces as a final error item rather than a `CommandOutput`.
pub fn exec_command_streaming(
    session: &Handle<ClientHandler>,
    command: String,
) -> impl Stream<Item = Result<String>> + '_ {
    try_stream! {
        let wrapped = format!("bash --norc --noprofile -c {}", shell_quote(&command));

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| GscpError::remote(format!("failed to open channel: {e}")))?;

        channel
            .exec(true, wrapped.as_bytes())
            .await
            .map_err(|e| GscpError::remote(format!("failed to execute command: {e}")))?;

        let mut exit_code = 0i32;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    yield String::from_utf8_lossy(&data).into_owned();
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    yield String::from_utf8_lossy(&data).into_owned();
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = exit_status as i32,
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                _ => {}
            }
        }

        if exit_code != 0 {
            Err(GscpError::remote(format!("command `{command}` exited {exit_code}")))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's fine"), "'it'\\''s fine'");
    }

    #[test]
    fn command_output_success() {
        let out = CommandOutput {
            exit_code: 0,
            output: "ok".into(),
        };
        assert!(out.success());
    }

    #[test]
    fn command_output_failure() {
        let out = CommandOutput {
            exit_code: 1,
            output: "boom".into(),
        };
        assert!(!out.success());
    }
}
