//! The pristine `app.asar.vanilla` backup: creation, refusal, restore.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::layout::GameLayout;
use crate::process::ProcessProbe;
use crate::{PatchError, Result};

/// Strings only modified game sources contain. Finding any of them means the
/// archive is not pristine.
pub const MOD_MARKERS: &[&str] = &[
    "calculateAsymptoticSpeed",
    "isShinyEgg",
    "countUniqueSpecies",
    "this.isShinyReveal",
    "DELTA TIME FIX",
    "this.stopped ? 0 :",
];

const SCAN_CHUNK: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    AlreadyPresent,
    Created,
}

/// First marker found in `path`, scanning in chunks so large archives are
/// never held in memory at once.
pub fn find_marker_in_file(path: &Path) -> std::io::Result<Option<&'static str>> {
    let overlap = MOD_MARKERS.iter().map(|m| m.len()).max().unwrap_or(1) - 1;
    let mut file = File::open(path)?;
    let mut window: Vec<u8> = Vec::with_capacity(SCAN_CHUNK + overlap);
    let mut chunk = vec![0u8; SCAN_CHUNK];

    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            return Ok(None);
        }
        window.extend_from_slice(&chunk[..n]);
        if let Some(marker) = MOD_MARKERS
            .iter()
            .find(|m| contains_bytes(&window, m.as_bytes()))
        {
            return Ok(Some(*marker));
        }
        let cut = window.len() - window.len().min(overlap);
        window.drain(..cut);
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// First marker found in any file under `dir`, with the file it was in.
pub fn find_marker_in_tree(dir: &Path) -> std::io::Result<Option<(&'static str, PathBuf)>> {
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(marker) = find_marker_in_file(entry.path())? {
            return Ok(Some((marker, entry.path().to_path_buf())));
        }
    }
    Ok(None)
}

/// Create the pristine backup unless it already exists.
///
/// Refuses when the archive (or, with no archive, the working directory)
/// already carries a mod marker. The copy goes through a `.partial` file so
/// the backup path either holds a complete copy or nothing.
pub fn ensure_backup(layout: &GameLayout) -> Result<BackupOutcome> {
    if layout.has_backup() {
        log::info!("pristine backup already present");
        return Ok(BackupOutcome::AlreadyPresent);
    }

    if layout.archive.is_file() {
        if let Some(marker) = find_marker_in_file(&layout.archive)? {
            return Err(PatchError::BackupRefused {
                marker: marker.to_string(),
                location: layout.archive.clone(),
            });
        }
    } else if layout.has_working_dir() {
        if let Some((marker, location)) = find_marker_in_tree(&layout.working)? {
            return Err(PatchError::BackupRefused {
                marker: marker.to_string(),
                location,
            });
        }
        return Err(PatchError::Config(format!(
            "{} is missing; only an extracted folder exists, nothing to back up",
            layout.archive.display()
        )));
    } else {
        return Err(PatchError::Config(format!(
            "{} not found",
            layout.archive.display()
        )));
    }

    copy_via_partial(&layout.archive, &layout.backup)?;
    log::info!("created pristine backup {}", layout.backup.display());
    Ok(BackupOutcome::Created)
}

/// Copy `src` to a `.partial` sibling of `dest`, then rename it into place,
/// so `dest` is never left half-written.
fn copy_via_partial(src: &Path, dest: &Path) -> std::io::Result<()> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    if let Err(e) = fs::copy(src, &partial) {
        if let Err(cleanup) = fs::remove_file(&partial) {
            log::debug!("could not remove {}: {cleanup}", partial.display());
        }
        return Err(e);
    }
    fs::rename(&partial, dest)
}

/// Put the pristine archive back and leave modified mode. Modified saves
/// are kept.
pub fn restore_original(
    layout: &GameLayout,
    probe: &dyn ProcessProbe,
    executable: &str,
) -> Result<()> {
    if probe.is_running(executable) {
        return Err(PatchError::GameRunning);
    }
    if !layout.has_backup() {
        return Err(PatchError::NoBackup);
    }
    copy_via_partial(&layout.backup, &layout.archive)?;
    if layout.sentinel.exists() {
        fs::remove_file(&layout.sentinel)?;
    }
    log::info!("restored {} from backup", layout.archive.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_split_across_chunks_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.asar");
        let mut data = vec![b'x'; SCAN_CHUNK - 5];
        data.extend_from_slice(b"isShinyEgg = true");
        fs::write(&path, &data).unwrap();
        assert_eq!(find_marker_in_file(&path).unwrap(), Some("isShinyEgg"));
    }

    #[test]
    fn clean_file_has_no_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.asar");
        fs::write(&path, "class Game { animate() {} }").unwrap();
        assert_eq!(find_marker_in_file(&path).unwrap(), None);
    }

    struct Idle;

    impl ProcessProbe for Idle {
        fn is_running(&self, _: &str) -> bool {
            false
        }
    }

    #[test]
    fn restore_replaces_archive_through_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path(), None);
        fs::create_dir_all(&layout.resources).unwrap();
        fs::write(&layout.backup, "pristine").unwrap();
        fs::write(&layout.archive, "modified and longer than the backup").unwrap();
        fs::write(&layout.sentinel, "modded").unwrap();
        let partial = layout.resources.join("app.asar.partial");
        fs::write(&partial, "left over from an interrupted restore").unwrap();

        restore_original(&layout, &Idle, "game.exe").unwrap();

        assert_eq!(fs::read_to_string(&layout.archive).unwrap(), "pristine");
        assert!(!partial.exists());
        assert!(!layout.sentinel.exists());
    }

    #[test]
    fn failed_copy_leaves_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("app.asar");
        fs::write(&dest, "current").unwrap();
        assert!(copy_via_partial(&dir.path().join("missing.vanilla"), &dest).is_err());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "current");
        assert!(!dir.path().join("app.asar.partial").exists());
    }
}
