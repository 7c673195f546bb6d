use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub log: Log,
    pub store: Store,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub backend: String, // "fake" or "redis"
    pub redis_dsn: Option<String>,
    pub token_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "mysql"
    pub mysql_dsn: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Users created at startup if they do not exist yet.
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub id: uuid::Uuid,
    pub username: String,
}

fn default_max_attempts() -> u32 {
    5
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the TOML file at `path` (or the profile default), then applies
/// `MOODY__SECTION__KEY` environment overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("MOODY").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
