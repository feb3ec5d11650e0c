// src/settings.rs

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::affects::columns::ColumnId;

pub const DEFAULT_AFFECTS_PER_PAGE: usize = 10;

/// Per-user table presentation state, persisted across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub affects_per_page: usize,
    pub column_visibility: HashMap<ColumnId, bool>,
    pub column_order: Vec<ColumnId>,
    pub column_sizing: HashMap<ColumnId, f32>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            affects_per_page: DEFAULT_AFFECTS_PER_PAGE,
            column_visibility: ColumnId::all().iter().map(|id| (*id, true)).collect(),
            column_order: ColumnId::all().to_vec(),
            column_sizing: HashMap::new(),
        }
    }
}

impl UserSettings {
    pub fn is_column_visible(&self, id: ColumnId) -> bool {
        self.column_visibility.get(&id).copied().unwrap_or(true)
    }

    /// Load from disk, falling back to defaults when the file is absent or
    /// unreadable. A broken settings file should never keep the console from
    /// starting.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("Ignoring malformed settings file {path:?}: {err}");
                    Self::default()
                }
            },
            Err(_) => {
                info!("No settings file at {path:?}, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, contents).context("Failed to write settings file")?;
        Ok(())
    }
}

/// Default settings location under the user's config directory.
pub fn default_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Could not determine config directory")?;
    path.push("osim-console");
    path.push("settings.json");
    Ok(path)
}
