//! Startup configuration (§6 "Configuration") and its atomic persistence.
//!
//! No teacher precedent for the format itself (`drakeerv-ds-rs` takes its
//! team number as a constructor argument, not a config file); `serde` +
//! `toml` is the idiomatic pairing the rest of the pack reaches for
//! (SPEC_FULL §10.3), and the write-temp-then-rename save path follows the
//! standard atomic-replace pattern used for any config file that must never
//! be observed half-written.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OpenStationError;
use crate::practice::PracticeTiming as RuntimePracticeTiming;

/// A single persisted document (§6). Core reads this at startup; everything
/// outside `team_number`..`joystick_locks` is opaque to the engine and kept
/// only so a save doesn't clobber the UI collaborator's own settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    pub team_number: u16,
    #[serde(default)]
    pub use_usb: bool,
    #[serde(default)]
    pub dashboard_command: Option<String>,
    #[serde(default)]
    pub game_data: String,
    /// Must stay above every table-producing field below (`practice_timing`,
    /// `joystick_locks`, `window`): TOML's non-inline serialization parses a
    /// bare `key = value` after a `[section]` header as a member of that
    /// section, so a scalar declared after a table here would silently fold
    /// into it and be lost on reload.
    #[serde(default)]
    pub practice_audio: bool,
    #[serde(default)]
    pub practice_timing: PracticeTimingConfig,
    #[serde(default)]
    pub joystick_locks: HashMap<Uuid, usize>,
    #[serde(default)]
    pub window: WindowConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            team_number: 0,
            use_usb: false,
            dashboard_command: None,
            game_data: String::new(),
            practice_audio: false,
            practice_timing: PracticeTimingConfig::default(),
            joystick_locks: HashMap::new(),
            window: WindowConfig::default(),
        }
    }
}

/// Serializable mirror of [`crate::practice::PracticeTiming`] (`Duration`
/// isn't a natural TOML shape, so seconds are stored as plain floats).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PracticeTimingConfig {
    pub countdown_secs: f64,
    pub auto_secs: f64,
    pub delay_secs: f64,
    pub teleop_secs: f64,
}

impl Default for PracticeTimingConfig {
    fn default() -> Self {
        let defaults = RuntimePracticeTiming::default();
        PracticeTimingConfig {
            countdown_secs: defaults.countdown.as_secs_f64(),
            auto_secs: defaults.autonomous.as_secs_f64(),
            delay_secs: defaults.delay.as_secs_f64(),
            teleop_secs: defaults.teleop.as_secs_f64(),
        }
    }
}

impl From<PracticeTimingConfig> for RuntimePracticeTiming {
    fn from(cfg: PracticeTimingConfig) -> Self {
        RuntimePracticeTiming {
            countdown: std::time::Duration::from_secs_f64(cfg.countdown_secs.max(0.0)),
            autonomous: std::time::Duration::from_secs_f64(cfg.auto_secs.max(0.0)),
            delay: std::time::Duration::from_secs_f64(cfg.delay_secs.max(0.0)),
            teleop: std::time::Duration::from_secs_f64(cfg.teleop_secs.max(0.0)),
        }
    }
}

/// Opaque to the core beyond round-tripping it on save (§6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct WindowConfig {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl StationConfig {
    pub fn load(path: &Path) -> crate::Result<StationConfig> {
        let text = std::fs::read_to_string(path).map_err(OpenStationError::Io)?;
        toml::from_str(&text).map_err(|e| OpenStationError::Config(e.to_string()))
    }

    /// Atomically replaces `path`'s contents: write to a sibling temp file,
    /// `fsync`-free rename over the target. A crash mid-write leaves the old
    /// file intact rather than a half-written one.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| OpenStationError::Config(e.to_string()))?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, text).map_err(OpenStationError::Io)?;
        std::fs::rename(&tmp_path, path).map_err(OpenStationError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_practice_timing_matches_spec_defaults() {
        let cfg = PracticeTimingConfig::default();
        assert_eq!(cfg.countdown_secs, 3.0);
        assert_eq!(cfg.auto_secs, 15.0);
        assert_eq!(cfg.delay_secs, 1.0);
        assert_eq!(cfg.teleop_secs, 135.0);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut cfg = StationConfig { team_number: 1234, use_usb: true, ..StationConfig::default() };
        cfg.joystick_locks.insert(Uuid::from_bytes([7; 16]), 2);
        let text = toml::to_string_pretty(&cfg).unwrap();
        let decoded: StationConfig = toml::from_str(&text).unwrap();
        assert_eq!(decoded, cfg);
    }

    #[test]
    fn practice_audio_survives_round_trip_alongside_table_fields() {
        // Regression: a scalar serialized after a `[section]` header would
        // parse back as a member of that section under TOML's rules, so this
        // must be exercised with practice_audio != its false default.
        let cfg = StationConfig { team_number: 1234, practice_audio: true, ..StationConfig::default() };
        let text = toml::to_string_pretty(&cfg).unwrap();
        let decoded: StationConfig = toml::from_str(&text).unwrap();
        assert!(decoded.practice_audio);
        assert_eq!(decoded, cfg);
    }

    #[test]
    fn save_then_load_round_trips_on_disk() {
        let dir = std::env::temp_dir().join(format!("open-station-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let cfg = StationConfig { team_number: 4201, ..StationConfig::default() };
        cfg.save(&path).unwrap();
        let loaded = StationConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);

        std::fs::remove_dir_all(&dir).ok();
    }
}
