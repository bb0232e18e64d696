//! Engine settings.
//!
//! Loaded from a TOML file by hosts that want user-tunable pacing and
//! colors; every field has a default so a missing or partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::connector::{Color, DEFAULT_PALETTE};
use crate::error::EngineError;

/// Tunable session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Inter-statement delay for `run()`, in milliseconds.
    pub step_delay_ms: u64,

    /// Whether changed cells are visually flagged on refresh.
    pub flash: bool,

    /// Edge palette as `#rrggbb` strings. Invalid entries are skipped at
    /// parse time; an empty result falls back to the built-in palette.
    pub palette: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            step_delay_ms: 400,
            flash: true,
            palette: Vec::new(), // Empty = built-in palette
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::ConfigParse(e.to_string()))
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// The effective edge palette.
    pub fn effective_palette(&self) -> Vec<Color> {
        let parsed: Vec<Color> =
            self.palette.iter().filter_map(|s| Color::from_hex(s)).collect();
        if parsed.is_empty() {
            DEFAULT_PALETTE.to_vec()
        } else {
            parsed
        }
    }
}
