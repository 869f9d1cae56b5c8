use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::Context as _;
use dondon_core::chart::NoteColor;
use dondon_core::state::{DrumSide, HitWindows, Input};
use dondon_core::timing::TimestampDifference;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default config file path, relative to the working directory.
pub const DEFAULT_PATH: &str = "dondon.yaml";

const MAX_GLOBAL_OFFSET_MS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing one subdirectory per mapset.
    pub songs_dir: PathBuf,
    pub hit_windows: HitWindowsConfig,
    /// Subtracted from the playback position when judging. Positive values compensate for input
    /// latency.
    pub global_offset_ms: i32,
    /// Terminal columns per second of playback.
    pub scroll_speed: u16,
    pub keys: KeyBindings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitWindowsConfig {
    pub perfect_ms: u16,
    pub ok_ms: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub kat_left: char,
    pub don_left: char,
    pub don_right: char,
    pub kat_right: char,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            songs_dir: PathBuf::from("songs"),
            hit_windows: HitWindowsConfig::default(),
            global_offset_ms: 0,
            scroll_speed: 40,
            keys: KeyBindings::default(),
        }
    }
}

impl Default for HitWindowsConfig {
    fn default() -> Self {
        Self {
            perfect_ms: 50,
            ok_ms: 140,
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            kat_left: 'd',
            don_left: 'f',
            don_right: 'j',
            kat_right: 'k',
        }
    }
}

impl From<HitWindowsConfig> for HitWindows {
    fn from(config: HitWindowsConfig) -> Self {
        Self {
            perfect: TimestampDifference::from_millis(i32::from(config.perfect_ms)),
            ok: TimestampDifference::from_millis(i32::from(config.ok_ms)),
        }
    }
}

impl KeyBindings {
    /// Returns the drum input bound to `key`.
    pub fn input(&self, key: char) -> Option<Input> {
        let input = if key == self.kat_left {
            Input::new(NoteColor::Kat, DrumSide::Left)
        } else if key == self.don_left {
            Input::new(NoteColor::Don, DrumSide::Left)
        } else if key == self.don_right {
            Input::new(NoteColor::Don, DrumSide::Right)
        } else if key == self.kat_right {
            Input::new(NoteColor::Kat, DrumSide::Right)
        } else {
            return None;
        };
        Some(input)
    }
}

impl Config {
    /// Loads the config from `$DONDON_CONFIG`, or from [`DEFAULT_PATH`].
    ///
    /// A missing file results in the default config.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var_os("DONDON_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH));

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(?path, "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("error opening config {path:?}"));
            }
        };

        let config: Self = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("error parsing config {path:?}"))?;
        config.validate()?;

        debug!(?config, "loaded config");
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            HitWindows::from(self.hit_windows).is_valid(),
            "perfect hit window must be positive and no wider than the ok window"
        );
        anyhow::ensure!(self.scroll_speed > 0, "scroll speed must be positive");
        anyhow::ensure!(
            self.global_offset_ms.unsigned_abs() <= MAX_GLOBAL_OFFSET_MS,
            "global offset must be within ±{MAX_GLOBAL_OFFSET_MS} ms"
        );

        let keys = [
            self.keys.kat_left,
            self.keys.don_left,
            self.keys.don_right,
            self.keys.kat_right,
        ];
        for (i, key) in keys.iter().enumerate() {
            anyhow::ensure!(
                !keys[i + 1..].contains(key),
                "key {key:?} is bound to more than one drum input"
            );
        }

        Ok(())
    }
}
