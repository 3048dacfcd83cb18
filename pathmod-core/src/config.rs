use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::GameLayout;
use crate::{PatchError, Result};

pub const GAME_EXECUTABLE: &str = "pokePathTD_Electron.exe";
pub const ORIGINAL_APP_FOLDER: &str = "pokePathTD_Electron";
pub const MODIFIED_APP_FOLDER: &str = "pokePathTD_Electron_modded";

/// Settings for one patcher invocation.
///
/// Every field has a default so a partial JSON file is enough.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatcherConfig {
    pub game_root: PathBuf,
    /// Replacement fixtures; `<game_root>/mods/patches` when unset.
    pub fixtures_dir: Option<PathBuf>,
    /// Holds `node_modules/@electron/asar` and `save_helper.js`;
    /// `<game_root>/mods` when unset.
    pub tools_dir: Option<PathBuf>,
    pub node: String,
    /// Fallback asar runner when the bundled copy fails.
    pub npx: String,
    pub game_executable: String,
    pub archive_timeout_secs: u64,
    pub save_timeout_secs: u64,
    /// Parent of the per-variant persistence roots (`%APPDATA%`).
    pub app_data: Option<PathBuf>,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            game_root: PathBuf::from("."),
            fixtures_dir: None,
            tools_dir: None,
            node: "node".to_string(),
            npx: "npx".to_string(),
            game_executable: GAME_EXECUTABLE.to_string(),
            archive_timeout_secs: 300,
            save_timeout_secs: 30,
            app_data: None,
        }
    }
}

impl PatcherConfig {
    /// Load from a JSON file. A missing file yields defaults; a malformed
    /// one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        let cfg: PatcherConfig = serde_json::from_str(&data).map_err(|e| {
            PatchError::Config(format!("invalid config {}: {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.trim().is_empty() {
            return Err(PatchError::Config("node executable must not be empty".into()));
        }
        if self.npx.trim().is_empty() {
            return Err(PatchError::Config("npx executable must not be empty".into()));
        }
        if self.game_executable.trim().is_empty() {
            return Err(PatchError::Config("game executable must not be empty".into()));
        }
        if self.archive_timeout_secs == 0 || self.save_timeout_secs == 0 {
            return Err(PatchError::Config("timeouts must be at least one second".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> GameLayout {
        GameLayout::new(&self.game_root, self.fixtures_dir.clone())
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.tools_dir
            .clone()
            .unwrap_or_else(|| self.game_root.join("mods"))
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_secs(self.save_timeout_secs)
    }

    pub fn app_data(&self) -> PathBuf {
        if let Some(dir) = &self.app_data {
            return dir.clone();
        }
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| self.game_root.join("userdata"))
    }

    /// LevelDB store of the unmodified installation.
    pub fn original_store(&self) -> PathBuf {
        store_under(&self.app_data(), ORIGINAL_APP_FOLDER)
    }

    /// LevelDB store the modified game writes to.
    pub fn modified_store(&self) -> PathBuf {
        store_under(&self.app_data(), MODIFIED_APP_FOLDER)
    }
}

fn store_under(app_data: &Path, folder: &str) -> PathBuf {
    app_data.join(folder).join("Local Storage").join("leveldb")
}
