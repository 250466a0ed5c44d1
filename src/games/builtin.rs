//! Hand-written native game descriptors — config is environment variables,
//! not a file (`catalog_code = None`).

use std::collections::HashMap;

use crate::games::GameDefinition;
use crate::tags::{PortSpec, Protocol};

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn paths(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn factorio() -> GameDefinition {
    GameDefinition {
        name: "factorio".to_string(),
        display_name: "Factorio".to_string(),
        image: "factoriotools/factorio".to_string(),
        ports: vec![
            PortSpec::new(34197, Protocol::Udp),
            PortSpec::new(27015, Protocol::Tcp),
        ],
        defaults: env(&[
            ("GENERATE_NEW_SAVE", "false"),
            ("SAVE_NAME", "game"),
            ("LOAD_LATEST_SAVE", "true"),
        ]),
        default_instance_type: "t3.medium".to_string(),
        min_ram_gb: 2,
        volumes: vec!["/factorio".to_string()],
        data_paths: paths(&[
            ("saves", "/factorio/saves"),
            ("config", "/factorio/config/server-settings.json"),
            ("mods", "/factorio/mods"),
            ("rcon_pw", "/factorio/config/rconpw"),
        ]),
        rcon_port: Some(27015),
        rcon_password_key: Some("rconpassword".to_string()),
        password_keys: vec![],
        disk_gb: 100,
        required_config: vec![],
        extra_docker_args: vec![],
        catalog_code: None,
    }
}

pub fn minecraft() -> GameDefinition {
    GameDefinition {
        name: "minecraft".to_string(),
        display_name: "Minecraft".to_string(),
        image: "itzg/minecraft-server".to_string(),
        ports: vec![PortSpec::new(25565, Protocol::Tcp)],
        defaults: env(&[("EULA", "TRUE"), ("TYPE", "VANILLA"), ("MEMORY", "2G")]),
        default_instance_type: "t3.medium".to_string(),
        min_ram_gb: 2,
        volumes: vec!["/data".to_string()],
        data_paths: paths(&[("world", "/data/world"), ("config", "/data/server.properties")]),
        rcon_port: Some(25575),
        rcon_password_key: Some("RCON_PASSWORD".to_string()),
        password_keys: vec!["RCON_PASSWORD".to_string()],
        disk_gb: 50,
        required_config: vec![],
        extra_docker_args: vec![],
        catalog_code: None,
    }
}

pub fn native_games() -> Vec<GameDefinition> {
    vec![factorio(), minecraft()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factorio_is_native_not_catalog_family() {
        assert!(!factorio().is_catalog_family());
    }

    #[test]
    fn factorio_declares_rcon_password_auto_generation() {
        let game = factorio();
        assert_eq!(game.rcon_password_key.as_deref(), Some("rconpassword"));
    }
}
