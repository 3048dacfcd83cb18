//! Extraction and repacking of `app.asar` through the external asar tool.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::layout::GameLayout;
use crate::process::{run_with_timeout, ToolError, ToolOutput};
use crate::{PatchError, Result};

/// Which way of reaching the asar tool succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// `node <tools>/node_modules/@electron/asar/bin/asar.js`
    Bundled,
    /// `npx asar`, fetched on demand.
    Npx,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Bundled => f.write_str("bundled asar"),
            Invocation::Npx => f.write_str("npx asar"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolReport {
    pub invocation: Invocation,
    pub output: ToolOutput,
    /// Set when the bundled tool was tried first and did not work.
    pub fallback_note: Option<String>,
}

pub trait ArchiveTool {
    fn extract(&self, archive: &Path, dest: &Path) -> std::result::Result<ToolReport, ToolError>;
    fn pack(&self, src: &Path, archive: &Path) -> std::result::Result<ToolReport, ToolError>;
}

/// The `asar` command line, bundled copy first and `npx` second.
#[derive(Debug, Clone)]
pub struct AsarCli {
    pub tools_dir: PathBuf,
    pub node: String,
    /// Program used for the fallback, `npx` unless configured.
    pub npx: String,
    pub timeout: Duration,
}

impl AsarCli {
    pub fn new(tools_dir: impl Into<PathBuf>, node: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tools_dir: tools_dir.into(),
            node: node.into(),
            npx: "npx".to_string(),
            timeout,
        }
    }

    pub fn with_npx(mut self, npx: impl Into<String>) -> Self {
        self.npx = npx.into();
        self
    }

    fn bundled_script(&self) -> PathBuf {
        crate::layout::join_candidate(&self.tools_dir, "node_modules/@electron/asar/bin/asar.js")
    }

    fn npx_command(&self) -> Command {
        if cfg!(windows) {
            // cmd.exe sidesteps the PowerShell policy that blocks npx.ps1.
            let mut cmd = Command::new("cmd");
            cmd.arg("/c").arg(&self.npx);
            cmd
        } else {
            Command::new(&self.npx)
        }
    }

    /// `output` is removed before the fallback runs when the first attempt
    /// left anything behind.
    fn invoke(
        &self,
        args: [&Path; 2],
        verb: &str,
        output: Option<&Path>,
    ) -> std::result::Result<ToolReport, ToolError> {
        let mut fallback_note = None;

        let script = self.bundled_script();
        if script.is_file() {
            let mut cmd = Command::new(&self.node);
            cmd.arg(&script).arg(verb).args(args);
            match run_with_timeout(&mut cmd, self.timeout) {
                Ok(output) => {
                    return Ok(ToolReport {
                        invocation: Invocation::Bundled,
                        output,
                        fallback_note: None,
                    })
                }
                Err(err) => {
                    log::warn!("bundled asar {verb} failed, trying npx: {err}");
                    fallback_note = Some(format!("bundled asar failed ({err}); used npx"));
                    if let Some(dir) = output.filter(|d| d.exists()) {
                        fs::remove_dir_all(dir).map_err(|source| ToolError::Transfer {
                            path: dir.to_path_buf(),
                            source,
                        })?;
                    }
                }
            }
        } else {
            log::debug!("no bundled asar at {}", script.display());
        }

        let mut cmd = self.npx_command();
        cmd.arg("asar").arg(verb).args(args);
        let output = run_with_timeout(&mut cmd, self.timeout)?;
        Ok(ToolReport {
            invocation: Invocation::Npx,
            output,
            fallback_note,
        })
    }
}

impl ArchiveTool for AsarCli {
    fn extract(&self, archive: &Path, dest: &Path) -> std::result::Result<ToolReport, ToolError> {
        self.invoke([archive, dest], "extract", Some(dest))
    }

    fn pack(&self, src: &Path, archive: &Path) -> std::result::Result<ToolReport, ToolError> {
        self.invoke([src, archive], "pack", None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractSource {
    Backup,
    /// No backup existed; the live archive may already be modified.
    LiveArchive,
}

#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub source: ExtractSource,
    pub tool: ToolReport,
}

impl fmt::Display for ExtractReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            ExtractSource::Backup => write!(f, "extracted pristine backup via {}", self.tool.invocation)?,
            ExtractSource::LiveArchive => write!(
                f,
                "extracted live app.asar via {} (no pristine backup, source may not be clean)",
                self.tool.invocation
            )?,
        }
        if let Some(note) = &self.tool.fallback_note {
            write!(f, "; {note}")?;
        }
        Ok(())
    }
}

/// Recreate the working directory from the pristine backup (or the live
/// archive when there is none). Any previous working directory is removed
/// first.
pub fn extract_clean(layout: &GameLayout, tool: &dyn ArchiveTool) -> Result<ExtractReport> {
    let (source, archive) = if layout.has_backup() {
        (ExtractSource::Backup, &layout.backup)
    } else if layout.archive.is_file() {
        log::warn!("no pristine backup, extracting the live archive");
        (ExtractSource::LiveArchive, &layout.archive)
    } else {
        return Err(PatchError::NoBackup);
    };

    if layout.working.exists() {
        log::info!("removing previous {}", layout.working.display());
        fs::remove_dir_all(&layout.working)?;
    }

    let tool = tool.extract(archive, &layout.working)?;
    if !layout.has_working_dir() {
        return Err(PatchError::NotExtracted);
    }
    let report = ExtractReport { source, tool };
    log::info!("{report}");
    Ok(report)
}

/// Serialize the working directory back over `app.asar`.
pub fn repack(layout: &GameLayout, tool: &dyn ArchiveTool) -> Result<ToolReport> {
    if !layout.has_working_dir() {
        return Err(PatchError::NotExtracted);
    }
    let report = tool.pack(&layout.working, &layout.archive)?;
    match &report.fallback_note {
        Some(note) => log::warn!("repacked via {}: {note}", report.invocation),
        None => log::info!("repacked via {}", report.invocation),
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_script_lives_under_tools() {
        let cli = AsarCli::new("/g/mods", "node", Duration::from_secs(1));
        assert!(cli
            .bundled_script()
            .ends_with("node_modules/@electron/asar/bin/asar.js"));
    }

    #[test]
    fn live_archive_report_warns() {
        let report = ExtractReport {
            source: ExtractSource::LiveArchive,
            tool: ToolReport {
                invocation: Invocation::Npx,
                output: ToolOutput::default(),
                fallback_note: Some("bundled asar failed".into()),
            },
        };
        let text = report.to_string();
        assert!(text.contains("may not be clean"));
        assert!(text.ends_with("; bundled asar failed"));
    }
}
