//! Server and snapshot record types (§3).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a server record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Launching,
    Running,
    Stopped,
    Paused,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerStatus::Launching => "launching",
            ServerStatus::Running => "running",
            ServerStatus::Stopped => "stopped",
            ServerStatus::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

/// The authoritative per-server entity (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub game: String,
    pub instance_id: String,
    pub region: String,
    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,
    pub status: ServerStatus,
    #[serde(default)]
    pub security_group_id: String,
    #[serde(default)]
    pub container_name: String,
    #[serde(default = "Utc::now")]
    pub launch_time: DateTime<Utc>,
    #[serde(default)]
    pub rcon_password: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub eip_allocation_id: String,
    #[serde(default)]
    pub eip_public_ip: String,
}

impl ServerRecord {
    /// Invariant 2 (§3): a pinned, non-paused server's public IP must equal
    /// its elastic IP.
    pub fn eip_consistent(&self) -> bool {
        if self.eip_allocation_id.is_empty() || self.status == ServerStatus::Paused {
            return true;
        }
        self.public_ip == self.eip_public_ip
    }
}

/// A point-in-time capture of a server's root volume plus the config and
/// RCON secret in effect when it was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    pub snapshot_id: String,
    pub game: String,
    pub server_name: String,
    pub server_id: String,
    pub region: String,
    #[serde(default = "default_snapshot_status")]
    pub status: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub rcon_password: String,
}

fn default_snapshot_status() -> String {
    "completed".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ServerRecord {
        ServerRecord {
            id: "abc123".into(),
            name: "factorio-abc123".into(),
            game: "factorio".into(),
            instance_id: "i-0123".into(),
            region: "us-east-1".into(),
            public_ip: "1.2.3.4".into(),
            ports: BTreeMap::new(),
            status: ServerStatus::Running,
            security_group_id: "sg-1".into(),
            container_name: "gscp-factorio-12345678".into(),
            launch_time: Utc::now(),
            rcon_password: String::new(),
            config: BTreeMap::new(),
            eip_allocation_id: String::new(),
            eip_public_ip: String::new(),
        }
    }

    #[test]
    fn eip_consistency_holds_when_unpinned() {
        assert!(sample().eip_consistent());
    }

    #[test]
    fn eip_consistency_fails_on_mismatch() {
        let mut r = sample();
        r.eip_allocation_id = "eipalloc-1".into();
        r.eip_public_ip = "5.6.7.8".into();
        assert!(!r.eip_consistent());
    }

    #[test]
    fn eip_consistency_ignored_while_paused() {
        let mut r = sample();
        r.status = ServerStatus::Paused;
        r.eip_allocation_id = "eipalloc-1".into();
        r.eip_public_ip = "5.6.7.8".into();
        assert!(r.eip_consistent());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ServerStatus::Launching).unwrap(), "\"launching\"");
    }
}
