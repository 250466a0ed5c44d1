//! SSH connection configuration.

use std::path::PathBuf;

/// SSH connection configuration: a single managed key, host keys always
/// accepted (these are ephemeral game-server VMs, not long-lived hosts a
/// human ever needs to pin).
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub user: String,
    pub key_path: PathBuf,
}

impl SshConfig {
    pub fn new(user: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            key_path: key_path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_user_and_key() {
        let config = SshConfig::new("ec2-user", "/path/to/key");
        assert_eq!(config.user, "ec2-user");
    }
}
