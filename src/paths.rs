use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE_NAME;

/// Env var overriding the config directory
pub const CONFIG_DIR_ENV: &str = "FXPROJECT_CONFIG_DIR";

/// Log file name used when `--log` is given without a path
pub const LOG_FILE_NAME: &str = "fxproject.log";

const APP_DIR: &str = "fxproject";

/// Configuration for overriding default application paths
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Create PathConfig from CLI arguments and environment variables
    ///
    /// Priority: CLI args → ENV var (FXPROJECT_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));

        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. FXPROJECT_CONFIG_DIR environment variable
/// 3. Local folder IF fxproject.json or fxproject.log exists there
/// 4. Platform-specific config directory from dirs-next (default)
///
/// Platform paths:
/// - Linux: ~/.config/fxproject/{name}
/// - macOS: ~/Library/Application Support/fxproject/{name}
/// - Windows: %APPDATA%\fxproject\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Get path to a data file (logs)
///
/// Same priority as [`config_file`], falling back to the platform data dir.
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Ensure that configuration and data directories exist
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let data_dir = get_data_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }

    // Only create data_dir if it's different from config_dir
    if data_dir != config_dir && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }

    Ok(())
}

fn has_local_config_files(dir: &Path) -> bool {
    [CONFIG_FILE_NAME, LOG_FILE_NAME].iter().any(|f| dir.join(f).exists())
}

/// Custom dir, else cwd if it holds our files.
fn override_dir(config: &PathConfig) -> Option<PathBuf> {
    if let Some(dir) = &config.config_dir {
        return Some(dir.clone());
    }
    std::env::current_dir().ok().filter(|cwd| has_local_config_files(cwd))
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    override_dir(config)
        .or_else(|| dirs_next::config_dir().map(|d| d.join(APP_DIR)))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    override_dir(config)
        .or_else(|| dirs_next::data_dir().map(|d| d.join(APP_DIR)))
        .unwrap_or_else(|| PathBuf::from("."))
}
