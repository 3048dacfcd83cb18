use std::path::{Path, PathBuf};

use crate::{PatchError, Result};

pub const ARCHIVE_NAME: &str = "app.asar";
pub const BACKUP_NAME: &str = "app.asar.vanilla";
pub const WORKING_DIR_NAME: &str = "app_extracted";
pub const SENTINEL_NAME: &str = ".modded";
pub const SENTINEL_TAG: &str = "modded";

const FIXTURE_CANDIDATES: &[&str] = &["mods/patches", "patches"];

/// Every on-disk location the pipeline touches, derived from the game root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    pub root: PathBuf,
    pub resources: PathBuf,
    pub archive: PathBuf,
    pub backup: PathBuf,
    pub working: PathBuf,
    pub sentinel: PathBuf,
    pub fixtures: PathBuf,
}

impl GameLayout {
    pub fn new(root: impl Into<PathBuf>, fixtures: Option<PathBuf>) -> Self {
        let root = root.into();
        let resources = root.join("resources");
        let fixtures = fixtures
            .or_else(|| find_first_existing(&root, FIXTURE_CANDIDATES))
            .unwrap_or_else(|| join_candidate(&root, FIXTURE_CANDIDATES[0]));
        Self {
            archive: resources.join(ARCHIVE_NAME),
            backup: resources.join(BACKUP_NAME),
            working: resources.join(WORKING_DIR_NAME),
            sentinel: resources.join(SENTINEL_NAME),
            resources,
            fixtures,
            root,
        }
    }

    /// Fails when there is nothing to patch at all.
    pub fn validate(&self) -> Result<()> {
        if !self.resources.is_dir() {
            return Err(PatchError::Config(format!(
                "resources folder not found at {}",
                self.resources.display()
            )));
        }
        if !self.archive.is_file() && !self.backup.is_file() {
            return Err(PatchError::Config(format!(
                "neither {} nor {} exists; reinstall the game",
                self.archive.display(),
                self.backup.display()
            )));
        }
        Ok(())
    }

    pub fn has_backup(&self) -> bool {
        self.backup.is_file()
    }

    pub fn has_working_dir(&self) -> bool {
        self.working.is_dir()
    }

    pub fn is_modded(&self) -> bool {
        self.sentinel.exists()
    }
}

/// Join a `/`- or `\`-separated relative path onto `base`.
pub fn join_candidate(base: &Path, candidate: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in candidate.split(['/', '\\']) {
        if !part.is_empty() {
            path.push(part);
        }
    }
    path
}

pub fn find_first_existing(base: &Path, candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|c| join_candidate(base, c))
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_resource_paths() {
        let layout = GameLayout::new("/games/pokepath", None);
        assert_eq!(
            layout.archive,
            PathBuf::from("/games/pokepath/resources/app.asar")
        );
        assert_eq!(
            layout.backup,
            PathBuf::from("/games/pokepath/resources/app.asar.vanilla")
        );
        assert_eq!(
            layout.fixtures,
            PathBuf::from("/games/pokepath/mods/patches")
        );
    }

    #[test]
    fn fixtures_found_next_to_game() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("patches")).unwrap();
        let layout = GameLayout::new(dir.path(), None);
        assert_eq!(layout.fixtures, dir.path().join("patches"));
    }

    #[test]
    fn candidates_accept_either_separator() {
        let layout = GameLayout::new("/g", None);
        assert_eq!(
            join_candidate(&layout.working, "src\\js/game/Game.js"),
            PathBuf::from("/g/resources/app_extracted/src/js/game/Game.js")
        );
    }
}
