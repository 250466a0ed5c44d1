//! Game registry (§4.7): immutable descriptors of the games this tool can
//! launch, populated at startup from hand-written native descriptors and a
//! parsed catalog file.

pub mod builtin;
pub mod catalog;

use std::collections::HashMap;
use std::sync::RwLock;

use crate::tags::PortSpec;

/// An immutable, registered game descriptor (§3).
#[derive(Debug, Clone)]
pub struct GameDefinition {
    pub name: String,
    pub display_name: String,
    pub image: String,
    pub ports: Vec<PortSpec>,
    pub defaults: HashMap<String, String>,
    pub default_instance_type: String,
    pub min_ram_gb: u32,
    pub volumes: Vec<String>,
    pub data_paths: HashMap<String, String>,
    pub rcon_port: Option<u16>,
    pub rcon_password_key: Option<String>,
    pub password_keys: Vec<String>,
    pub disk_gb: u32,
    pub required_config: Vec<String>,
    pub extra_docker_args: Vec<String>,
    /// Non-null selects the "catalog-family" launch path (§4.1): config is
    /// a file inside the container rather than environment variables.
    pub catalog_code: Option<String>,
}

impl GameDefinition {
    pub fn is_catalog_family(&self) -> bool {
        self.catalog_code.is_some()
    }
}

/// Process-wide collection of registered game descriptors.
pub struct GameRegistry {
    games: RwLock<HashMap<String, GameDefinition>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, game: GameDefinition) {
        self.games.write().unwrap().insert(game.name.clone(), game);
    }

    pub fn get(&self, name: &str) -> Option<GameDefinition> {
        self.games.read().unwrap().get(name).cloned()
    }

    pub fn list_all(&self) -> Vec<GameDefinition> {
        let mut games: Vec<_> = self.games.read().unwrap().values().cloned().collect();
        games.sort_by(|a, b| a.name.cmp(&b.name));
        games
    }

    /// Populate with hand-written native descriptors and the catalog file,
    /// seeding the catalog from a bundled copy on first use (§4.7).
    pub fn load_default(state_dir: &std::path::Path) -> Self {
        let registry = Self::new();
        for game in builtin::native_games() {
            registry.register(game);
        }
        match catalog::load_catalog(state_dir) {
            Ok(entries) => {
                for game in entries {
                    registry.register(game);
                }
            }
            Err(e) => {
                tracing::warn!("failed to load game catalog: {e}");
            }
        }
        registry
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_get_round_trips() {
        let registry = GameRegistry::new();
        let game = builtin::factorio();
        registry.register(game.clone());
        let fetched = registry.get("factorio").unwrap();
        assert_eq!(fetched.image, game.image);
    }

    #[test]
    fn get_missing_returns_none() {
        let registry = GameRegistry::new();
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn list_all_is_sorted_by_name() {
        let registry = GameRegistry::new();
        registry.register(builtin::factorio());
        registry.register(builtin::minecraft());
        let names: Vec<_> = registry.list_all().iter().map(|g| g.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
