//! Application paths and persisted timeline settings.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::timeline::TimelineSettings;

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "soundsync.json";
/// Default log file name inside the data directory
pub const LOG_FILE: &str = "soundsync.log";

const APP_DIR: &str = "soundsync";
const CONFIG_DIR_ENV: &str = "SOUNDSYNC_CONFIG_DIR";

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (SOUNDSYNC_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. SOUNDSYNC_CONFIG_DIR environment variable
/// 3. Local folder IF any config files exist (soundsync.json, soundsync.log)
/// 4. Platform-specific config directory from dirs-next (default)
///
/// Platform paths:
/// - Linux: ~/.config/soundsync/{name}
/// - macOS: ~/Library/Application Support/soundsync/{name}
/// - Windows: %APPDATA%\soundsync\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir).join(name)
}

/// Get path to a data file (logs, exports). Same priority as [`config_file`],
/// falling back to the platform data directory.
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir).join(name)
}

/// Ensure that configuration and data directories exist
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = resolve_dir(config, dirs_next::config_dir);
    let data_dir = resolve_dir(config, dirs_next::data_dir);

    for dir in [&config_dir, &data_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
    }
    Ok(())
}

fn has_local_config_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, platform_dir: fn() -> Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir() {
        if has_local_config_files(&current_dir) {
            return current_dir;
        }
    }

    if let Some(dir) = platform_dir() {
        return dir.join(APP_DIR);
    }

    // Fallback: "." if everything else fails
    PathBuf::from(".")
}

/// Load timeline settings. A missing file gives defaults; a broken one is
/// reported and replaced by defaults.
pub fn load_settings(config: &PathConfig) -> TimelineSettings {
    let path = config_file(SETTINGS_FILE, config);
    match read_settings(&path) {
        Ok(Some(settings)) => {
            debug!("Loaded settings from {}", path.display());
            settings
        }
        Ok(None) => TimelineSettings::default(),
        Err(e) => {
            warn!("Ignoring settings file: {:#}", e);
            TimelineSettings::default()
        }
    }
}

fn read_settings(path: &Path) -> Result<Option<TimelineSettings>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let settings: TimelineSettings =
        serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(settings.normalized()))
}

pub fn save_settings(settings: &TimelineSettings, config: &PathConfig) -> Result<PathBuf> {
    ensure_dirs(config)?;
    let path = config_file(SETTINGS_FILE, config);
    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Settings saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::DragMode;

    fn custom(dir: &Path) -> PathConfig {
        PathConfig { config_dir: Some(dir.to_path_buf()) }
    }

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig { config_dir: Some(PathBuf::from("/custom")) };
        assert_eq!(config_file("test.json", &config), PathBuf::from("/custom/test.json"));
        assert_eq!(data_file("soundsync.log", &config), PathBuf::from("/custom/soundsync.log"));
    }

    #[test]
    fn test_cli_dir_wins() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from/cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from/cli")));
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = custom(dir.path());

        assert_eq!(load_settings(&config), TimelineSettings::default());

        let mut settings = TimelineSettings::default();
        settings.set_bpm(128.0);
        settings.set_beats_per_bar(8);
        settings.snap_enabled = true;
        settings.drag_mode = DragMode::Scale;
        let written = save_settings(&settings, &config).unwrap();
        assert_eq!(written, dir.path().join(SETTINGS_FILE));

        assert_eq!(load_settings(&config), settings);
    }

    #[test]
    fn test_broken_settings_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = custom(dir.path());
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        assert_eq!(load_settings(&config), TimelineSettings::default());

        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{"bpm": -1, "zoom": 0.01}"#).unwrap();
        let loaded = load_settings(&config);
        assert_eq!(loaded.bpm, 120.0);
        assert_eq!(loaded.zoom, crate::timeline::MIN_ZOOM);
    }
}
