use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use crate::cache::{
    CacheConfig, DEFAULT_MAX_BYTES, DEFAULT_MAX_ITEMS, DEFAULT_MEMORY_ITEMS, EvictionPolicy,
};
use crate::overlay::SCROLL_OFFSET_PX;
use crate::render::{DEFAULT_SCALE, HIGH_FIDELITY_SCALE};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "casepreview";
const CACHE_DIRNAME: &str = "pdf_cache";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Durable tier item ceiling
    pub max_items: usize,
    /// Durable tier byte ceiling
    pub max_bytes: u64,
    /// Memory tier capacity
    pub memory_items: usize,
    /// Durable tier location; platform cache dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            max_bytes: DEFAULT_MAX_BYTES,
            memory_items: DEFAULT_MEMORY_ITEMS,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub default_scale: f32,
    pub high_fidelity_scale: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            default_scale: DEFAULT_SCALE,
            high_fidelity_scale: HIGH_FIDELITY_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Pixels kept above a highlighted marker when scrolling to it
    pub scroll_offset: f32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            scroll_offset: SCROLL_OFFSET_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub render: RenderSettings,

    #[serde(default)]
    pub overlay: OverlaySettings,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            log_level: default_log_level(),
            cache: CacheSettings::default(),
            render: RenderSettings::default(),
            overlay: OverlaySettings::default(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            memory_items: self.cache.memory_items,
            policy: EvictionPolicy::new(self.cache.max_items, self.cache.max_bytes),
        }
    }

    /// Where the durable tier lives
    #[must_use]
    pub fn cache_directory(&self) -> PathBuf {
        self.cache
            .directory
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join(APP_NAME).join(CACHE_DIRNAME)))
            .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME).join(CACHE_DIRNAME))
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the platform config dir, creating the file with
/// defaults on first run
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };

    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        save_settings_to_file(&get_settings(), &path);
    }
}

/// Load settings from `path`. A missing or broken file leaves the current
/// settings untouched.
pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r"# casepreview settings
#
# cache.max_items / cache.max_bytes bound the on-disk document cache; the
# oldest downloads are evicted first once either is exceeded.
# cache.directory overrides the platform cache location.
# render.*_scale are the inline and high-fidelity preview scales.
# overlay.scroll_offset is the gap kept above a highlighted annotation.

";

// Public API for accessing/modifying settings

#[must_use]
pub fn get_settings() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn set_log_level(level: &str) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.log_level = level.to_string();
    }
}

#[must_use]
pub fn get_log_level() -> String {
    SETTINGS
        .read()
        .map(|s| s.log_level.clone())
        .unwrap_or_else(|_| default_log_level())
}
