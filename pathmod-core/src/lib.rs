//! Patch engine for the PokePath TD desktop build.
//!
//! The game ships as an Electron `app.asar`. A run backs the pristine archive
//! up once, extracts it to a clean working directory, applies the selected
//! catalog entries, packs the result back over `app.asar` and moves the
//! player's save to the modified installation's own store.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub mod archive;
pub mod backup;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod features;
pub mod layout;
pub mod patch;
pub mod process;
pub mod save;
pub mod save_doc;
mod text;

pub use archive::{ArchiveTool, AsarCli, ExtractReport, ToolReport};
pub use backup::BackupOutcome;
pub use config::PatcherConfig;
pub use engine::{RunResult, SkipReason};
pub use layout::GameLayout;
pub use patch::{PatchContext, PatchEntry, PatchFailure};
pub use process::{ProcessProbe, SystemProbe, ToolError};
pub use save::{NodeSaveHelper, SaveBridge, SaveHelper, SaveSetup, SaveVariant};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(
        "{} already contains modified code ('{marker}'); reinstall the unmodified game before patching",
        location.display()
    )]
    BackupRefused { marker: String, location: PathBuf },
    #[error("PokePath TD is running; close the game first")]
    GameRunning,
    #[error("game has not been extracted")]
    NotExtracted,
    #[error("no pristine backup (app.asar.vanilla) found")]
    NoBackup,
    #[error("save migration failed: save helper ({helper}), file copy ({source})")]
    SaveMigration {
        helper: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PatchError>;

/// External collaborators of a run.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub archive: &'a dyn ArchiveTool,
    pub saves: &'a dyn SaveHelper,
    pub probe: &'a dyn ProcessProbe,
}

/// The real tools: Node's asar, `save_helper.js`, the OS process list.
#[derive(Debug, Clone)]
pub struct SystemServices {
    pub asar: AsarCli,
    pub helper: NodeSaveHelper,
    pub probe: SystemProbe,
}

impl SystemServices {
    pub fn from_config(config: &PatcherConfig) -> Self {
        let tools = config.tools_dir();
        Self {
            asar: AsarCli::new(&tools, &config.node, config.archive_timeout())
                .with_npx(&config.npx),
            helper: NodeSaveHelper::new(&tools, &config.node, config.save_timeout()),
            probe: SystemProbe::default(),
        }
    }

    pub fn services(&self) -> Services<'_> {
        Services {
            archive: &self.asar,
            saves: &self.helper,
            probe: &self.probe,
        }
    }
}

#[derive(Debug)]
pub struct InstallReport {
    pub backup: BackupOutcome,
    pub extract: ExtractReport,
    pub run: RunResult,
    pub repack: ToolReport,
    pub save: SaveSetup,
}

impl InstallReport {
    /// One line per stage, then one per applied, skipped and failed entry.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            match self.backup {
                BackupOutcome::AlreadyPresent => "backup: pristine backup already present".to_string(),
                BackupOutcome::Created => "backup: created app.asar.vanilla".to_string(),
            },
            format!("extract: {}", self.extract),
        ];
        lines.extend(self.run.applied.iter().map(|(k, d)| format!("[OK] {k}: {d}")));
        lines.extend(self.run.skipped.iter().map(|(k, r)| format!("[SKIP] {k}: {r}")));
        lines.extend(self.run.failed.iter().map(|(k, f)| format!("[FAIL] {k}: {f}")));
        let mut repack = format!("repack: via {}", self.repack.invocation);
        if let Some(note) = &self.repack.fallback_note {
            repack.push_str(&format!(" ({note})"));
        }
        lines.push(repack);
        lines.push(format!("save: {}", self.save));
        lines.push(format!("result: {}", self.run.summary()));
        lines
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Backup, extract, patch, repack, migrate saves.
///
/// Entry failures end up in the report's `RunResult`; only the fatal stages
/// (backup refusal, extraction, repack, a running game) return `Err`.
pub fn install<S: AsRef<str>>(
    config: &PatcherConfig,
    selected: &[S],
    services: Services<'_>,
    progress: Option<engine::Progress<'_>>,
) -> Result<InstallReport> {
    config.validate()?;
    let layout = config.layout();
    layout.validate()?;
    let entries = features::expand(selected)?;
    if entries.is_empty() {
        return Err(PatchError::Config("no features selected".into()));
    }

    if services.probe.is_running(&config.game_executable) {
        return Err(PatchError::GameRunning);
    }

    let backup = backup::ensure_backup(&layout)?;
    let extract = archive::extract_clean(&layout, services.archive)?;

    let ctx = PatchContext::new(&layout);
    let run = engine::run(&ctx, &entries, progress);
    log::info!("patching finished: {}", run.summary());

    let repack = archive::repack(&layout, services.archive)?;

    let bridge = SaveBridge {
        original_store: config.original_store(),
        modified_store: config.modified_store(),
        sentinel: layout.sentinel.clone(),
        executable: config.game_executable.clone(),
        helper: services.saves,
        probe: services.probe,
    };
    let save = bridge.setup_modified_save()?;

    Ok(InstallReport {
        backup,
        extract,
        run,
        repack,
        save,
    })
}

/// Put the pristine archive back and leave modified mode.
pub fn restore(config: &PatcherConfig, probe: &dyn ProcessProbe) -> Result<()> {
    let layout = config.layout();
    backup::restore_original(&layout, probe, &config.game_executable)
}

#[derive(Debug, Clone)]
pub struct Status {
    pub has_backup: bool,
    pub archive_present: bool,
    /// First mod marker found in the live archive, if any.
    pub archive_marker: Option<&'static str>,
    pub has_working_dir: bool,
    pub modded: bool,
    /// Applied flag per catalog entry for the current working directory.
    pub entries: Vec<(&'static str, bool)>,
}

pub fn status(layout: &GameLayout) -> Result<Status> {
    let archive_present = layout.archive.is_file();
    let archive_marker = if archive_present {
        backup::find_marker_in_file(&layout.archive)?
    } else {
        None
    };
    let has_working_dir = layout.has_working_dir();
    let entries = if has_working_dir {
        let ctx = PatchContext::new(layout);
        catalog::CATALOG
            .iter()
            .map(|e| (e.key, e.is_applied(&ctx)))
            .collect()
    } else {
        Vec::new()
    };
    Ok(Status {
        has_backup: layout.has_backup(),
        archive_present,
        archive_marker,
        has_working_dir,
        modded: layout.is_modded(),
        entries,
    })
}
