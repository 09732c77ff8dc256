//! Application config: a `[bot]` section plus process-level settings.
//!
//! Config files: `cinegate.toml` or `cinegate.json`, project-local first,
//! then the user config directory.

use std::path::{Path, PathBuf};

use {
    cinegate_telegram::BotConfig,
    secrecy::Secret,
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["cinegate.toml", "cinegate.json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bot account settings.
    pub bot: BotConfig,

    /// Port for the plain-HTTP health listener.
    pub port: u16,

    /// Where the access table and media catalog live. When unset the data
    /// directory is resolved at startup (see [`resolve_data_dir`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            port: 3000,
            data_dir: None,
        }
    }
}

/// Load config from the given path (TOML or JSON by extension).
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./cinegate.{toml,json}` (project-local)
/// 2. `~/.config/cinegate/cinegate.{toml,json}` (user-global)
///
/// Returns `AppConfig::default()` if no config file is found.
pub fn discover_and_load() -> AppConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    AppConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/cinegate/
    if let Some(dirs) = directories::ProjectDirs::from("", "", "cinegate") {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<AppConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => anyhow::bail!("unsupported config format: {other}"),
    }
}

/// Apply environment overrides on top of whatever the file provided.
/// `BOT_TOKEN` and `ADMIN_ID` match the names the hosting platform sets.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(token) = std::env::var("BOT_TOKEN")
        && !token.is_empty()
    {
        config.bot.token = Secret::new(token);
    }
    if let Ok(raw) = std::env::var("ADMIN_ID") {
        match raw.parse::<u64>() {
            Ok(id) => config.bot.admin_id = Some(id),
            Err(_) => warn!(value = %raw, "ignoring non-numeric ADMIN_ID"),
        }
    }
}

/// Resolve the data directory, in priority order:
///
/// 1. `--data-dir` flag / `CINEGATE_DATA_DIR` env
/// 2. `data_dir` from the config file
/// 3. `/data` when it exists (mounted volume)
/// 4. the platform data dir (`~/.local/share/cinegate` on Linux)
pub fn resolve_data_dir(cli_override: Option<PathBuf>, config: &AppConfig) -> PathBuf {
    if let Some(dir) = cli_override {
        return dir;
    }
    if let Some(dir) = &config.data_dir {
        return dir.clone();
    }
    let volume = PathBuf::from("/data");
    if volume.is_dir() {
        return volume;
    }
    directories::ProjectDirs::from("", "", "cinegate")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
