//! Flat-JSON local state stores (§4.3).
//!
//! Resolves design note O-3 in favor of whole-file JSON documents rather
//! than an embedded database: each store is a single `servers.json` or
//! `snapshots.json` under the state directory, read in full and rewritten
//! in full on every mutation. Writes go through a temp-file-plus-rename so a
//! crash mid-write never corrupts the previous generation; an in-process
//! mutex serializes concurrent callers within this control-plane host (§5).
//! There is no cross-process advisory lock — matching the external contract
//! this is grounded on, which also has none.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::state::records::{ServerRecord, SnapshotRecord};

/// Generic whole-file JSON map store, keyed by record id.
struct JsonStore<T> {
    path: PathBuf,
    records: Mutex<HashMap<String, T>>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let records = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    async fn write_locked(&self, records: &HashMap<String, T>) -> Result<()> {
        let content = serde_json::to_string_pretty(records)?;
        let tmp_path = tmp_path_for(&self.path);
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Option<T> {
        self.records.lock().await.get(id).cloned()
    }

    async fn save(&self, id: String, record: T) -> Result<()> {
        let mut guard = self.records.lock().await;
        guard.insert(id, record);
        self.write_locked(&guard).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut guard = self.records.lock().await;
        guard.remove(id);
        self.write_locked(&guard).await
    }

    async fn list_all(&self) -> Vec<T> {
        self.records.lock().await.values().cloned().collect()
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Store for server records.
pub struct ServerState {
    inner: JsonStore<ServerRecord>,
}

impl ServerState {
    pub fn open(state_dir: &Path) -> Result<Self> {
        Ok(Self {
            inner: JsonStore::open(state_dir.join("servers.json"))?,
        })
    }

    pub async fn get(&self, id: &str) -> Option<ServerRecord> {
        self.inner.get(id).await
    }

    /// `id` exact match, then `name` exact match, then `id` prefix — first
    /// match wins, mirroring the lookup order callers expect from a CLI
    /// where short ids are routinely truncated for display.
    pub async fn get_by_name_or_id(&self, needle: &str) -> Option<ServerRecord> {
        if let Some(r) = self.inner.get(needle).await {
            return Some(r);
        }
        let all = self.inner.list_all().await;
        if let Some(r) = all.iter().find(|r| r.name == needle) {
            return Some(r.clone());
        }
        all.into_iter().find(|r| r.id.starts_with(needle))
    }

    pub async fn save(&self, record: ServerRecord) -> Result<()> {
        self.inner.save(record.id.clone(), record).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }

    pub async fn list_all(&self) -> Vec<ServerRecord> {
        self.inner.list_all().await
    }

    pub async fn name_exists(&self, name: &str) -> bool {
        self.inner.list_all().await.iter().any(|r| r.name == name)
    }

    pub async fn update_status(&self, id: &str, status: crate::state::records::ServerStatus) -> Result<()> {
        if let Some(mut record) = self.get(id).await {
            record.status = status;
            self.save(record).await?;
        }
        Ok(())
    }

    /// Update a single named field on a server record without requiring
    /// the caller to read, mutate, and re-save the whole record by hand.
    /// Unknown keys are a no-op, matching §4.3's schema-evolution
    /// tolerance for records.
    pub async fn update_field(&self, id: &str, key: &str, value: &str) -> Result<()> {
        if let Some(mut record) = self.get(id).await {
            match key {
                "name" => record.name = value.to_string(),
                "public_ip" => record.public_ip = value.to_string(),
                "security_group_id" => record.security_group_id = value.to_string(),
                "container_name" => record.container_name = value.to_string(),
                "rcon_password" => record.rcon_password = value.to_string(),
                "eip_allocation_id" => record.eip_allocation_id = value.to_string(),
                "eip_public_ip" => record.eip_public_ip = value.to_string(),
                _ => return Ok(()),
            }
            self.save(record).await?;
        }
        Ok(())
    }
}

/// Store for snapshot records.
pub struct SnapshotState {
    inner: JsonStore<SnapshotRecord>,
}

impl SnapshotState {
    pub fn open(state_dir: &Path) -> Result<Self> {
        Ok(Self {
            inner: JsonStore::open(state_dir.join("snapshots.json"))?,
        })
    }

    pub async fn get(&self, id: &str) -> Option<SnapshotRecord> {
        self.inner.get(id).await
    }

    pub async fn save(&self, record: SnapshotRecord) -> Result<()> {
        self.inner.save(record.id.clone(), record).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }

    pub async fn list_all(&self) -> Vec<SnapshotRecord> {
        self.inner.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::records::ServerStatus;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample(id: &str, name: &str) -> ServerRecord {
        ServerRecord {
            id: id.to_string(),
            name: name.to_string(),
            game: "factorio".into(),
            instance_id: "i-1".into(),
            region: "us-east-1".into(),
            public_ip: "1.2.3.4".into(),
            ports: Default::default(),
            status: ServerStatus::Running,
            security_group_id: "sg-1".into(),
            container_name: "gscp-factorio-1".into(),
            launch_time: Utc::now(),
            rcon_password: String::new(),
            config: Default::default(),
            eip_allocation_id: String::new(),
            eip_public_ip: String::new(),
        }
    }

    #[tokio::test]
    async fn save_and_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = ServerState::open(dir.path()).unwrap();
        store.save(sample("abc", "alpha")).await.unwrap();

        let got = store.get("abc").await.unwrap();
        assert_eq!(got.name, "alpha");
    }

    #[tokio::test]
    async fn get_by_name_or_id_resolves_by_name_then_prefix() {
        let dir = TempDir::new().unwrap();
        let store = ServerState::open(dir.path()).unwrap();
        store.save(sample("abcdef123456", "alpha")).await.unwrap();

        assert_eq!(store.get_by_name_or_id("alpha").await.unwrap().id, "abcdef123456");
        assert_eq!(store.get_by_name_or_id("abcdef").await.unwrap().id, "abcdef123456");
        assert!(store.get_by_name_or_id("nope").await.is_none());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let dir = TempDir::new().unwrap();
        let store = ServerState::open(dir.path()).unwrap();
        store.save(sample("abc", "alpha")).await.unwrap();
        store.delete("abc").await.unwrap();
        assert!(store.get("abc").await.is_none());
    }

    #[tokio::test]
    async fn reopening_store_reloads_persisted_records() {
        let dir = TempDir::new().unwrap();
        {
            let store = ServerState::open(dir.path()).unwrap();
            store.save(sample("abc", "alpha")).await.unwrap();
        }
        let reopened = ServerState::open(dir.path()).unwrap();
        assert_eq!(reopened.get("abc").await.unwrap().name, "alpha");
    }

    #[tokio::test]
    async fn update_field_sets_known_field_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = ServerState::open(dir.path()).unwrap();
        store.save(sample("abc", "alpha")).await.unwrap();

        store.update_field("abc", "container_name", "gscp-factorio-2").await.unwrap();

        assert_eq!(store.get("abc").await.unwrap().container_name, "gscp-factorio-2");
    }

    #[tokio::test]
    async fn update_field_ignores_unknown_key() {
        let dir = TempDir::new().unwrap();
        let store = ServerState::open(dir.path()).unwrap();
        store.save(sample("abc", "alpha")).await.unwrap();

        store.update_field("abc", "not_a_real_field", "x").await.unwrap();

        assert_eq!(store.get("abc").await.unwrap().name, "alpha");
    }

    #[tokio::test]
    async fn name_exists_checks_across_all_records() {
        let dir = TempDir::new().unwrap();
        let store = ServerState::open(dir.path()).unwrap();
        store.save(sample("abc", "alpha")).await.unwrap();
        assert!(store.name_exists("alpha").await);
        assert!(!store.name_exists("beta").await);
    }
}
