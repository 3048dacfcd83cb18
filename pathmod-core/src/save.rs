//! Keeps the modified game's save separate from the original's, migrating
//! progress across once.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use walkdir::WalkDir;

use crate::layout::SENTINEL_TAG;
use crate::process::{run_with_timeout, ProcessProbe, ToolError};
use crate::{PatchError, Result};

pub const HELPER_SCRIPT: &str = "save_helper.js";
pub const TRANSFER_FILE: &str = "current_save.json";

/// Which installation's persisted store an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveVariant {
    Original,
    Modified,
}

impl SaveVariant {
    /// The store the game currently reads, as recorded by the sentinel.
    pub fn active(sentinel: &Path) -> Self {
        if sentinel.exists() {
            SaveVariant::Modified
        } else {
            SaveVariant::Original
        }
    }
}

impl fmt::Display for SaveVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveVariant::Original => f.write_str("original"),
            SaveVariant::Modified => f.write_str("modified"),
        }
    }
}

/// Storage-engine access for saves. The transfer file is the save as JSON.
pub trait SaveHelper {
    fn export(&self, variant: SaveVariant) -> std::result::Result<PathBuf, ToolError>;
    fn import(&self, transfer: &Path, variant: SaveVariant) -> std::result::Result<(), ToolError>;
}

/// `node save_helper.js export|import [--modded]`, run from the tools folder.
#[derive(Debug, Clone)]
pub struct NodeSaveHelper {
    pub tools_dir: PathBuf,
    pub node: String,
    pub timeout: Duration,
}

impl NodeSaveHelper {
    pub fn new(tools_dir: impl Into<PathBuf>, node: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tools_dir: tools_dir.into(),
            node: node.into(),
            timeout,
        }
    }

    pub fn transfer_path(&self) -> PathBuf {
        self.tools_dir.join(TRANSFER_FILE)
    }

    fn call(&self, verb: &str, variant: SaveVariant) -> std::result::Result<String, ToolError> {
        let script = self.tools_dir.join(HELPER_SCRIPT);
        if !script.is_file() {
            return Err(ToolError::NotFound {
                program: script.display().to_string(),
            });
        }
        let mut cmd = Command::new(&self.node);
        cmd.arg(&script).arg(verb).current_dir(&self.tools_dir);
        if variant == SaveVariant::Modified {
            cmd.arg("--modded");
        }
        let output = run_with_timeout(&mut cmd, self.timeout)?;
        // The helper reports success on stdout; exit 0 alone is not enough.
        match output.stdout.lines().find_map(|l| l.trim().strip_prefix("OK:")) {
            Some(rest) => Ok(rest.to_string()),
            None => Err(ToolError::Failed {
                program: format!("{HELPER_SCRIPT} {verb}"),
                code: Some(0),
                output: output.combined(),
            }),
        }
    }
}

impl SaveHelper for NodeSaveHelper {
    fn export(&self, variant: SaveVariant) -> std::result::Result<PathBuf, ToolError> {
        let reported = self.call("export", variant)?;
        let path = if reported.is_empty() {
            self.transfer_path()
        } else {
            PathBuf::from(reported)
        };
        if !path.is_file() {
            return Err(ToolError::Failed {
                program: format!("{HELPER_SCRIPT} export"),
                code: Some(0),
                output: format!("no transfer file at {}", path.display()),
            });
        }
        Ok(path)
    }

    fn import(&self, transfer: &Path, variant: SaveVariant) -> std::result::Result<(), ToolError> {
        let expected = self.transfer_path();
        if transfer != expected {
            fs::copy(transfer, &expected).map_err(|source| ToolError::Transfer {
                path: expected.clone(),
                source,
            })?;
        }
        self.call("import", variant).map(|_| ())
    }
}

/// A store holds progress only when it has LevelDB table files; a freshly
/// initialized store has just a log and manifest.
pub fn has_real_save(store: &Path) -> bool {
    let Ok(entries) = fs::read_dir(store) else {
        return false;
    };
    entries.filter_map(|e| e.ok()).any(|e| {
        e.path()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("ldb"))
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationPath {
    Api,
    /// The helper failed; files were copied directly.
    RawCopy { helper_error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveSetup {
    AlreadyPresent,
    Migrated(MigrationPath),
    FreshInstall,
}

impl fmt::Display for SaveSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveSetup::AlreadyPresent => f.write_str("modified save already exists"),
            SaveSetup::Migrated(MigrationPath::Api) => {
                f.write_str("original save migrated through the save helper")
            }
            SaveSetup::Migrated(MigrationPath::RawCopy { helper_error }) => write!(
                f,
                "original save copied file by file (save helper failed: {helper_error})"
            ),
            SaveSetup::FreshInstall => f.write_str("fresh install, no save to migrate"),
        }
    }
}

pub struct SaveBridge<'a> {
    pub original_store: PathBuf,
    pub modified_store: PathBuf,
    pub sentinel: PathBuf,
    pub executable: String,
    pub helper: &'a dyn SaveHelper,
    pub probe: &'a dyn ProcessProbe,
}

impl SaveBridge<'_> {
    /// Make sure the modified store holds the player's progress, then mark
    /// the installation as modified.
    pub fn setup_modified_save(&self) -> Result<SaveSetup> {
        if self.probe.is_running(&self.executable) {
            return Err(PatchError::GameRunning);
        }

        let outcome = if has_real_save(&self.modified_store) {
            SaveSetup::AlreadyPresent
        } else if has_real_save(&self.original_store) {
            match self.migrate_via_helper() {
                Ok(()) => SaveSetup::Migrated(MigrationPath::Api),
                Err(err) => {
                    log::warn!("save helper migration failed, copying files: {err}");
                    self.raw_copy().map_err(|source| PatchError::SaveMigration {
                        helper: err.to_string(),
                        source,
                    })?;
                    SaveSetup::Migrated(MigrationPath::RawCopy {
                        helper_error: err.to_string(),
                    })
                }
            }
        } else {
            fs::create_dir_all(&self.modified_store)?;
            SaveSetup::FreshInstall
        };

        fs::write(&self.sentinel, SENTINEL_TAG)?;
        log::info!("{outcome}");
        Ok(outcome)
    }

    fn migrate_via_helper(&self) -> Result<()> {
        let transfer = self.helper.export(SaveVariant::Original)?;
        if let Some(parent) = self.modified_store.parent() {
            fs::create_dir_all(parent)?;
        }
        self.helper.import(&transfer, SaveVariant::Modified)?;
        if let Err(e) = fs::remove_file(&transfer) {
            log::warn!("could not remove transfer file {}: {e}", transfer.display());
        }
        if !has_real_save(&self.modified_store) {
            return Err(ToolError::Failed {
                program: format!("{HELPER_SCRIPT} import"),
                code: Some(0),
                output: "import reported success but the store is still empty".into(),
            }
            .into());
        }
        Ok(())
    }

    fn raw_copy(&self) -> std::io::Result<()> {
        if self.modified_store.exists() {
            fs::remove_dir_all(&self.modified_store)?;
        }
        copy_tree(&self.original_store, &self.modified_store)
    }
}

pub(crate) fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialized_store_is_not_real() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("LOG"), "").unwrap();
        fs::write(dir.path().join("MANIFEST-000001"), "x").unwrap();
        assert!(!has_real_save(dir.path()));
        fs::write(dir.path().join("000005.ldb"), "x").unwrap();
        assert!(has_real_save(dir.path()));
    }

    #[test]
    fn missing_store_is_not_real() {
        assert!(!has_real_save(Path::new("/definitely/not/a/store")));
    }

    #[test]
    fn sentinel_selects_variant() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = dir.path().join(".modded");
        assert_eq!(SaveVariant::active(&sentinel), SaveVariant::Original);
        fs::write(&sentinel, SENTINEL_TAG).unwrap();
        assert_eq!(SaveVariant::active(&sentinel), SaveVariant::Modified);
    }
}
