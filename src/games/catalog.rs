//! Catalog-family game descriptors, loaded from a JSON document seeded on
//! first use into the per-user state directory (§4.7). Mirrors the bundled
//! `lgsm_catalog.json` pairing in the prior art this system is drawn from.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::games::GameDefinition;
use crate::tags::{PortSpec, Protocol};

const LGSM_IMAGE: &str = "gameservermanagers/gameserver";
const BUNDLED_CATALOG: &str = include_str!("lgsm_catalog.json");

#[derive(Debug, Deserialize)]
struct CatalogPort {
    port: u16,
    protocol: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    display_name: String,
    server_code: String,
    ports: Vec<CatalogPort>,
    #[serde(default)]
    default_lgsm_config: HashMap<String, String>,
    default_instance_type: String,
    min_ram_gb: u32,
    #[serde(default)]
    disk_gb: Option<u32>,
    #[serde(default)]
    required_config: Vec<String>,
}

fn catalog_file_path(state_dir: &Path) -> std::path::PathBuf {
    state_dir.join("lgsm_catalog.json")
}

/// Copy the bundled catalog into `state_dir` if no catalog file exists yet,
/// so operators can hand-edit it without rebuilding the binary.
fn ensure_seeded(state_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(state_dir)?;
    let target = catalog_file_path(state_dir);
    if !target.exists() {
        std::fs::write(&target, BUNDLED_CATALOG)?;
    }
    Ok(())
}

fn parse_entry(name: &str, entry: &CatalogEntry) -> GameDefinition {
    let ports: Vec<PortSpec> = entry
        .ports
        .iter()
        .map(|p| {
            let protocol = p.protocol.parse::<Protocol>().unwrap_or(Protocol::Tcp);
            PortSpec::new(p.port, protocol)
        })
        .collect();

    let game_code = name.trim_start_matches("lgsm-");
    let rcon_port = ports.iter().find(|p| p.protocol == Protocol::Udp).map(|p| p.port);

    GameDefinition {
        name: name.to_string(),
        display_name: entry.display_name.clone(),
        image: format!("{LGSM_IMAGE}:{game_code}"),
        ports,
        defaults: entry.default_lgsm_config.clone(),
        default_instance_type: entry.default_instance_type.clone(),
        min_ram_gb: entry.min_ram_gb,
        volumes: vec!["/data".to_string()],
        data_paths: [
            ("serverfiles".to_string(), "/data/serverfiles".to_string()),
            ("log".to_string(), "/data/log".to_string()),
            ("config".to_string(), "/data/config-lgsm".to_string()),
        ]
        .into_iter()
        .collect(),
        rcon_port,
        rcon_password_key: rcon_port.map(|_| "rconpassword".to_string()),
        password_keys: vec![],
        disk_gb: entry.disk_gb.unwrap_or(100),
        required_config: entry.required_config.clone(),
        // Catalog-family containers run lgsm's own install/update/start
        // cycle on first boot and expect the container manager to bring
        // them back up after a host reboot or an OOM kill.
        extra_docker_args: vec!["--restart=unless-stopped".to_string()],
        catalog_code: Some(entry.server_code.clone()),
    }
}

/// Load and parse the catalog file into game descriptors, seeding it from
/// the bundled default on first use.
pub fn load_catalog(state_dir: &Path) -> Result<Vec<GameDefinition>> {
    ensure_seeded(state_dir)?;
    let content = std::fs::read_to_string(catalog_file_path(state_dir))?;
    let raw: HashMap<String, CatalogEntry> = serde_json::from_str(&content)?;
    Ok(raw.iter().map(|(name, entry)| parse_entry(name, entry)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn seeding_writes_bundled_catalog_when_absent() {
        let dir = tempdir().unwrap();
        ensure_seeded(dir.path()).unwrap();
        assert!(catalog_file_path(dir.path()).exists());
    }

    #[test]
    fn seeding_does_not_overwrite_an_existing_catalog() {
        let dir = tempdir().unwrap();
        std::fs::write(catalog_file_path(dir.path()), "{}").unwrap();
        ensure_seeded(dir.path()).unwrap();
        let content = std::fs::read_to_string(catalog_file_path(dir.path())).unwrap();
        assert_eq!(content, "{}");
    }

    #[test]
    fn load_catalog_parses_bundled_entries() {
        let dir = tempdir().unwrap();
        let games = load_catalog(dir.path()).unwrap();
        assert!(games.iter().any(|g| g.name == "lgsm-vhserver"));
        let valheim = games.iter().find(|g| g.name == "lgsm-vhserver").unwrap();
        assert!(valheim.is_catalog_family());
        assert_eq!(valheim.catalog_code.as_deref(), Some("vhserver"));
        assert!(valheim.required_config.contains(&"serverpassword".to_string()));
    }

    #[test]
    fn catalog_entries_get_a_restart_policy() {
        let dir = tempdir().unwrap();
        let games = load_catalog(dir.path()).unwrap();
        assert!(games.iter().all(|g| g.extra_docker_args.iter().any(|a| a.starts_with("--restart"))));
    }
}
