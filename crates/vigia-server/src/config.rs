use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_engine")]
    pub engine: DatabaseEngine,
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Sqlite,
    Postgres,
}

impl Default for DatabaseEngine {
    fn default() -> Self {
        Self::Sqlite
    }
}

impl From<DatabaseEngine> for vigia_db::DatabaseEngine {
    fn from(engine: DatabaseEngine) -> Self {
        match engine {
            DatabaseEngine::Sqlite => vigia_db::DatabaseEngine::Sqlite,
            DatabaseEngine::Postgres => vigia_db::DatabaseEngine::Postgres,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: default_database_engine(),
            url: "sqlite://./data/vigia.db?mode=rwc".into(),
            max_connections: default_max_connections(),
        }
    }
}

/// Presence and feed timing. The defaults bound roster staleness to about
/// 90 seconds in the worst case.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_roster_refresh_secs")]
    pub roster_refresh_secs: u64,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            sweep_secs: default_sweep_secs(),
            stale_after_secs: default_stale_after_secs(),
            roster_refresh_secs: default_roster_refresh_secs(),
            recent_limit: default_recent_limit(),
        }
    }
}

impl From<ChatConfig> for vigia_core::ChatSettings {
    fn from(config: ChatConfig) -> Self {
        Self {
            heartbeat: Duration::from_secs(config.heartbeat_secs.max(1)),
            sweep: Duration::from_secs(config.sweep_secs.max(1)),
            stale_after: Duration::from_secs(config.stale_after_secs.max(1)),
            roster_refresh: Duration::from_secs(config.roster_refresh_secs.max(1)),
            recent_limit: config.recent_limit.clamp(1, 1000),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn default_database_engine() -> DatabaseEngine {
    DatabaseEngine::Sqlite
}
fn default_max_connections() -> u32 {
    20
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_sweep_secs() -> u64 {
    30
}
fn default_stale_after_secs() -> u64 {
    60
}
fn default_roster_refresh_secs() -> u64 {
    10
}
fn default_recent_limit() -> i64 {
    200
}

/// Generate a commented config file template with the given values filled in.
fn generate_config_template(config: &Config) -> String {
    format!(
        r#"# Vigia Server Configuration
# Generated automatically on first run. Edit as needed.

[server]
bind_address = "{bind_address}"

[database]
engine = "{db_engine}"
url = "{db_url}"
max_connections = {max_connections}

[chat]
# How often each joined session re-announces its presence.
heartbeat_secs = {heartbeat_secs}
# How often each joined session sweeps stale presence rows.
sweep_secs = {sweep_secs}
# Age past which a presence row is considered stale.
stale_after_secs = {stale_after_secs}
# Fallback full-roster refresh period.
roster_refresh_secs = {roster_refresh_secs}
# Bounded initial message window; there is no pagination further back.
recent_limit = {recent_limit}
"#,
        bind_address = config.server.bind_address,
        db_engine = match config.database.engine {
            DatabaseEngine::Sqlite => "sqlite",
            DatabaseEngine::Postgres => "postgres",
        },
        db_url = config.database.url,
        max_connections = config.database.max_connections,
        heartbeat_secs = config.chat.heartbeat_secs,
        sweep_secs = config.chat.sweep_secs,
        stale_after_secs = config.chat.stale_after_secs,
        roster_refresh_secs = config.chat.roster_refresh_secs,
        recent_limit = config.chat.recent_limit,
    )
}

// ── Config Loading ───────────────────────────────────────────────────────────

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!(
                "Config file not found at '{}', generating defaults...",
                path
            );
            let config = Config::default();

            // Ensure parent directory exists
            if let Some(parent) = std::path::Path::new(path).parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(path, generate_config_template(&config))?;
            tracing::info!("Generated default config at '{}'", path);
            config
        };

        // Environment variable overrides
        if let Ok(value) = std::env::var("VIGIA_BIND_ADDRESS") {
            config.server.bind_address = value;
        }
        if let Ok(value) = std::env::var("VIGIA_DATABASE_URL") {
            config.database.url = value;
        }
        if let Ok(value) = std::env::var("VIGIA_DATABASE_ENGINE") {
            let normalized = value.trim().to_ascii_lowercase();
            match normalized.as_str() {
                "sqlite" => config.database.engine = DatabaseEngine::Sqlite,
                "postgres" | "postgresql" => config.database.engine = DatabaseEngine::Postgres,
                _ => {
                    tracing::warn!(
                        "Ignoring invalid VIGIA_DATABASE_ENGINE value '{}'; expected sqlite or postgres",
                        value
                    );
                }
            }
        }
        if let Ok(value) = std::env::var("VIGIA_DATABASE_MAX_CONNECTIONS") {
            if let Ok(parsed) = value.parse::<u32>() {
                config.database.max_connections = parsed;
            }
        }
        if let Ok(value) = std::env::var("VIGIA_CHAT_HEARTBEAT_SECS") {
            if let Ok(parsed) = value.parse::<u64>() {
                config.chat.heartbeat_secs = parsed;
            }
        }
        if let Ok(value) = std::env::var("VIGIA_CHAT_SWEEP_SECS") {
            if let Ok(parsed) = value.parse::<u64>() {
                config.chat.sweep_secs = parsed;
            }
        }
        if let Ok(value) = std::env::var("VIGIA_CHAT_STALE_AFTER_SECS") {
            if let Ok(parsed) = value.parse::<u64>() {
                config.chat.stale_after_secs = parsed;
            }
        }
        if let Ok(value) = std::env::var("VIGIA_CHAT_ROSTER_REFRESH_SECS") {
            if let Ok(parsed) = value.parse::<u64>() {
                config.chat.roster_refresh_secs = parsed;
            }
        }
        if let Ok(value) = std::env::var("VIGIA_CHAT_RECENT_LIMIT") {
            if let Ok(parsed) = value.parse::<i64>() {
                config.chat.recent_limit = parsed;
            }
        }

        Ok(config)
    }
}
