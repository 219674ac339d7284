use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{DurationCatalog, PhaseDuration};
use crate::clock::TICK_PERIOD;

const SETTINGS_FILE_NAME: &str = "settings.json";
const SETTINGS_ENV_VAR: &str = "PHASE_SESSION_SETTINGS";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Length of one countdown step. Each tick always counts as one second;
    /// shortening this only speeds up demos.
    pub tick_interval_ms: u64,

    /// Replaces the built-in sound phase options when set.
    pub sound_durations: Option<Vec<PhaseDuration>>,

    /// Replaces the built-in capture phase options when set.
    pub capture_durations: Option<Vec<PhaseDuration>>,

    /// Source looped by the host during the sound phase.
    pub emission_source: String,

    /// Where the host stores captured audio.
    pub capture_target: String,

    /// Make the simulated port refuse capture, as if permission had been denied.
    pub simulate_capture_denied: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_PERIOD.as_millis() as u64,
            sound_durations: None,
            capture_durations: None,
            emission_source: "nature.m4a".to_string(),
            capture_target: "recording.m4a".to_string(),
            simulate_capture_denied: false,
        }
    }
}

impl SessionSettings {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// The countdown no longer runs in wall-clock seconds.
    pub fn is_accelerated(&self) -> bool {
        self.tick_period() != TICK_PERIOD
    }

    pub fn catalog(&self) -> DurationCatalog {
        let defaults = DurationCatalog::default();
        DurationCatalog::new(
            self.sound_durations
                .clone()
                .unwrap_or_else(|| defaults.sound_options().to_vec()),
            self.capture_durations
                .clone()
                .unwrap_or_else(|| defaults.capture_options().to_vec()),
        )
    }
}

/// `$PHASE_SESSION_SETTINGS`, or `<config_dir>/phase-session/settings.json`.
pub fn settings_path() -> Result<PathBuf, SettingsError> {
    if let Some(path) = std::env::var_os(SETTINGS_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
    Ok(dir.join("phase-session").join(SETTINGS_FILE_NAME))
}

pub fn load_settings(path: &Path) -> SessionSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<SessionSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                SessionSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            SessionSettings::default()
        }
    }
}

/// Load settings, writing the defaults out first if no file exists yet so there is
/// one to edit.
pub fn load_or_init_settings(path: &Path) -> SessionSettings {
    if path.exists() {
        return load_settings(path);
    }
    let settings = SessionSettings::default();
    match save_settings(path, &settings) {
        Ok(()) => log::info!("Settings: wrote defaults to {:?}", path),
        Err(e) => log::warn!("Settings: failed to write defaults: {}", e),
    }
    settings
}

fn io_err(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> SettingsError {
    let path = path.to_path_buf();
    move |source| SettingsError::Io {
        action,
        path,
        source,
    }
}

pub fn save_settings(path: &Path, settings: &SessionSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err("create config directory", parent))?;
    }

    let contents = serde_json::to_string_pretty(settings)?;

    // Write atomically: write to a temp file in the same directory, then rename.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents).map_err(io_err("write temp settings", &tmp_path))?;

    // On Windows, rename fails if the destination exists
    if cfg!(windows) && path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(io_err("remove existing settings", path)(e));
            }
        }
    }

    std::fs::rename(&tmp_path, path).map_err(io_err("rename temp settings", &tmp_path))?;
    Ok(())
}
