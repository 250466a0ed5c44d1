//! Global configuration, loaded from a YAML file under the state directory.
//!
//! Mirrors the shape of the upstream tool's own config: a small YAML
//! document with environment-variable fallbacks for anything secret. AWS
//! credentials are never read here; they flow through the AWS SDK's own
//! credential chain (env vars, profile files, instance metadata).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GscpError, Result};

/// How the RCON password is synchronised across control-plane hosts.
///
/// See design note O-2: storing the secret in a plaintext cloud tag is the
/// documented cross-machine sync path and remains the default; routing it
/// through the parameter store instead is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RconSyncMode {
    #[default]
    Tag,
    ParameterStore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Namespace prefix used for tags and parameter-store keys, e.g. "gscp".
    #[serde(default = "default_tool_name")]
    pub tool_name: String,

    /// Default region used when none is given on the command line.
    #[serde(default = "default_region")]
    pub region: String,

    /// SSH login user baked into the base image's user-data.
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    /// CIDR the security group opens for SSH (22/tcp). See design note O-1.
    #[serde(default = "default_ssh_cidr")]
    pub ssh_cidr: String,

    /// Cross-machine RCON password sync strategy. See design note O-2.
    #[serde(default)]
    pub rcon_sync: RconSyncMode,

    /// Override for the local state directory (defaults to `~/.<tool_name>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,

    /// Extra regions the reconciler should always scan in addition to the
    /// locally-known ones and the shared active-regions set.
    #[serde(default)]
    pub extra_regions: Vec<String>,
}

fn default_tool_name() -> String {
    "gscp".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_ssh_user() -> String {
    "ec2-user".to_string()
}

fn default_ssh_cidr() -> String {
    "0.0.0.0/0".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tool_name: default_tool_name(),
            region: default_region(),
            ssh_user: default_ssh_user(),
            ssh_cidr: default_ssh_cidr(),
            rcon_sync: RconSyncMode::default(),
            state_dir: None,
            extra_regions: Vec::new(),
        }
    }
}

impl AppConfig {
    /// The per-user state directory: `~/.<tool_name>` unless overridden.
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(PathBuf::from(shellexpand::tilde(dir).to_string()));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| GscpError::config("cannot determine home directory"))?;
        Ok(home.join(format!(".{}", self.tool_name)))
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| GscpError::config("cannot determine home directory"))?;
        Ok(home.join(".config").join("gscp").join("config.yaml"))
    }

    /// Load the config file, falling back to defaults when absent — unlike
    /// the devbox tool this is based on, there is no mandatory `init` step;
    /// every operation works against sane defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tool_name.is_empty() {
            return Err(GscpError::config("tool_name must not be empty"));
        }
        if self.region.is_empty() {
            return Err(GscpError::config("region must not be empty"));
        }
        if !self.ssh_cidr.contains('/') {
            return Err(GscpError::config(format!(
                "ssh_cidr '{}' must be in CIDR notation, e.g. 0.0.0.0/0",
                self.ssh_cidr
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tool_name, "gscp");
        assert_eq!(config.ssh_cidr, "0.0.0.0/0");
        assert_eq!(config.rcon_sync, RconSyncMode::Tag);
    }

    #[test]
    fn rejects_empty_region() {
        let config = AppConfig {
            region: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_cidr_without_slash() {
        let config = AppConfig {
            ssh_cidr: "10.0.0.1".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = AppConfig {
            tool_name: "gscp".to_string(),
            region: "eu-west-1".to_string(),
            rcon_sync: RconSyncMode::ParameterStore,
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.region, "eu-west-1");
        assert_eq!(parsed.rcon_sync, RconSyncMode::ParameterStore);
    }

    #[test]
    fn state_dir_defaults_under_home() {
        let config = AppConfig::default();
        let dir = config.state_dir().unwrap();
        assert!(dir.ends_with(".gscp"));
    }
}
