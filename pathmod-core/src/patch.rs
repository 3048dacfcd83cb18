//! One named modification and the strategies used to apply it.
//!
//! Entries carry no state between runs. Whether an entry is applied is always
//! re-derived from the current file content, so a file reverted by hand is
//! simply patched again on the next run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::layout::GameLayout;
use crate::text::{self, Syntax};

/// Entry-local failure. Recorded in the run result; never aborts a run.
#[derive(Debug, Error)]
pub enum PatchFailure {
    #[error("target file missing: {}", .0.display())]
    TargetMissing(PathBuf),

    #[error("pattern not found")]
    PatternNotFound,

    #[error("fixture {} not found", .0.display())]
    FixtureMissing(PathBuf),

    #[error("result rejected: {0}")]
    ValidationRejected(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

/// What a successful `apply` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Changed(String),
    /// Nothing to do in this installation; not a failure.
    NotApplicable(String),
}

pub type Transform = fn(&str) -> Result<String, PatchFailure>;
pub type Verify = fn(&str) -> Result<(), PatchFailure>;

/// One literal find/replace pair.
#[derive(Debug, Clone, Copy)]
pub struct Edit {
    pub find: &'static str,
    pub replace: &'static str,
    /// A required edit must match or nothing is written.
    pub required: bool,
}

impl Edit {
    pub const fn required(find: &'static str, replace: &'static str) -> Self {
        Self {
            find,
            replace,
            required: true,
        }
    }

    pub const fn optional(find: &'static str, replace: &'static str) -> Self {
        Self {
            find,
            replace,
            required: false,
        }
    }
}

/// Content test deciding whether an entry is already applied.
#[derive(Clone, Copy)]
pub enum Detect {
    Contains(&'static str),
    AllOf(&'static [&'static str]),
    /// Target equals the strategy's fixture with any BOM removed.
    MatchesFixture,
    /// Every fixture asset exists in the target directory byte-for-byte.
    FixtureAssets,
    Custom(fn(&str) -> bool),
}

/// How an entry changes its target.
#[derive(Clone, Copy)]
pub enum Strategy {
    /// Literal substitution of each edit.
    Exact(&'static [Edit]),
    /// Literal edits first; the structural transform only when they miss.
    Pattern {
        exact: &'static [Edit],
        fallback: Transform,
    },
    /// Copy a prepared fixture over the target. Falls back to `inline` edits
    /// when the fixture is absent.
    WholeFile {
        fixture: &'static str,
        inline: &'static [Edit],
        verify: Option<Verify>,
    },
    /// Whole-file replacement for every `*.{extension}` in a fixture folder.
    AssetCopy {
        fixture_dir: &'static str,
        extension: &'static str,
    },
}

/// Where entries read fixtures from and write targets to.
pub struct PatchContext<'a> {
    pub working: &'a Path,
    pub fixtures: &'a Path,
}

impl<'a> PatchContext<'a> {
    pub fn new(layout: &'a GameLayout) -> Self {
        Self {
            working: &layout.working,
            fixtures: &layout.fixtures,
        }
    }

    fn target(&self, relative: &str) -> PathBuf {
        crate::layout::join_candidate(self.working, relative)
    }

    fn fixture(&self, relative: &str) -> PathBuf {
        crate::layout::join_candidate(self.fixtures, relative)
    }
}

pub struct PatchEntry {
    pub key: &'static str,
    pub label: &'static str,
    /// File (or asset folder) relative to the working directory.
    pub target: &'static str,
    pub detect: Detect,
    pub strategy: Strategy,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PatchFailure + '_ {
    move |source| PatchFailure::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Targets are rewritten in full, so anything that is not UTF-8 is refused
/// rather than written back with replacement characters.
fn read_text(path: &Path) -> Result<String, PatchFailure> {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes).map_err(|_| {
            PatchFailure::ValidationRejected(format!("{} is not UTF-8", path.display()))
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(PatchFailure::TargetMissing(path.to_path_buf()))
        }
        Err(e) => Err(io_err(path)(e)),
    }
}

fn read_fixture(path: &Path) -> Result<String, PatchFailure> {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes)
            .map(|s| text::strip_bom(&s).to_string())
            .map_err(|_| {
                PatchFailure::ValidationRejected(format!(
                    "fixture {} is not UTF-8",
                    path.display()
                ))
            }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(PatchFailure::FixtureMissing(path.to_path_buf()))
        }
        Err(e) => Err(io_err(path)(e)),
    }
}

/// Apply `edits` to `content`. `None` when a required edit missed or nothing
/// changed.
pub fn apply_edits(content: &str, edits: &[Edit]) -> Option<(String, usize)> {
    let mut out = content.to_string();
    let mut changed = 0usize;
    for edit in edits {
        if out.contains(edit.find) {
            out = out.replace(edit.find, edit.replace);
            changed += 1;
        } else if edit.required {
            return None;
        }
    }
    (changed > 0).then_some((out, changed))
}

fn fixture_assets(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut assets = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches && path.is_file() {
            assets.push(path);
        }
    }
    assets.sort();
    Ok(assets)
}

impl PatchEntry {
    fn syntax(&self) -> Option<Syntax> {
        Syntax::for_path(self.target)
    }

    /// Pure content check. A missing target is "not applied", never an error.
    pub fn is_applied(&self, ctx: &PatchContext<'_>) -> bool {
        let target = ctx.target(self.target);

        if let Detect::FixtureAssets = self.detect {
            let Strategy::AssetCopy {
                fixture_dir,
                extension,
            } = self.strategy
            else {
                return false;
            };
            let Ok(assets) = fixture_assets(&ctx.fixture(fixture_dir), extension) else {
                return false;
            };
            return !assets.is_empty()
                && assets.iter().all(|src| {
                    let Some(name) = src.file_name() else {
                        return false;
                    };
                    match (fs::read(src), fs::read(target.join(name))) {
                        (Ok(a), Ok(b)) => a == b,
                        _ => false,
                    }
                });
        }

        let Ok(bytes) = fs::read(&target) else {
            return false;
        };
        let content = String::from_utf8_lossy(&bytes);

        match self.detect {
            Detect::Contains(needle) => content.contains(needle),
            Detect::AllOf(needles) => needles.iter().all(|n| content.contains(n)),
            Detect::MatchesFixture => match self.strategy {
                Strategy::WholeFile { fixture, .. } => read_fixture(&ctx.fixture(fixture))
                    .map(|f| f == content)
                    .unwrap_or(false),
                _ => false,
            },
            Detect::Custom(check) => check(&content),
            Detect::FixtureAssets => false,
        }
    }

    /// Apply the strategy. On any failure the target is left untouched.
    pub fn apply(&self, ctx: &PatchContext<'_>) -> Result<Applied, PatchFailure> {
        let target = ctx.target(self.target);

        match self.strategy {
            Strategy::Exact(edits) => {
                let content = read_text(&target)?;
                let (patched, changed) =
                    apply_edits(&content, edits).ok_or(PatchFailure::PatternNotFound)?;
                self.write_checked(&target, &content, &patched)?;
                Ok(Applied::Changed(format!("{changed} edit(s)")))
            }
            Strategy::Pattern { exact, fallback } => {
                let content = read_text(&target)?;
                if let Some((patched, changed)) = apply_edits(&content, exact) {
                    self.write_checked(&target, &content, &patched)?;
                    return Ok(Applied::Changed(format!("{changed} edit(s)")));
                }
                let patched = fallback(&content)?;
                if patched == content {
                    return Err(PatchFailure::PatternNotFound);
                }
                self.write_checked(&target, &content, &patched)?;
                Ok(Applied::Changed("structural match".to_string()))
            }
            Strategy::WholeFile {
                fixture,
                inline,
                verify,
            } => {
                if !target.is_file() {
                    return Err(PatchFailure::TargetMissing(target));
                }
                let fixture_path = ctx.fixture(fixture);
                let replacement = match read_fixture(&fixture_path) {
                    Ok(text) => text,
                    Err(PatchFailure::FixtureMissing(path)) if !inline.is_empty() => {
                        log::debug!("{} absent, trying inline edits", path.display());
                        let content = read_text(&target)?;
                        let (patched, changed) = apply_edits(&content, inline)
                            .ok_or(PatchFailure::FixtureMissing(path))?;
                        self.write_checked(&target, &content, &patched)?;
                        return Ok(Applied::Changed(format!("inline, {changed} edit(s)")));
                    }
                    Err(e) => return Err(e),
                };
                if replacement.trim().is_empty() {
                    return Err(PatchFailure::ValidationRejected(format!(
                        "fixture {fixture} is empty"
                    )));
                }
                if let Some(syntax) = self.syntax() {
                    text::check_balance(&replacement, syntax).map_err(|e| {
                        PatchFailure::ValidationRejected(format!("fixture {fixture}: {e}"))
                    })?;
                }
                if let Some(verify) = verify {
                    verify(&replacement)?;
                }
                text::write_atomic(&target, &replacement).map_err(io_err(&target))?;
                Ok(Applied::Changed(format!("replaced from {fixture}")))
            }
            Strategy::AssetCopy {
                fixture_dir,
                extension,
            } => {
                let src_dir = ctx.fixture(fixture_dir);
                if !src_dir.is_dir() {
                    return Ok(Applied::NotApplicable(format!(
                        "no {} folder",
                        src_dir.display()
                    )));
                }
                let assets = fixture_assets(&src_dir, extension).map_err(io_err(&src_dir))?;
                if assets.is_empty() {
                    return Ok(Applied::NotApplicable(format!(
                        "no .{extension} files in {}",
                        src_dir.display()
                    )));
                }
                fs::create_dir_all(&target).map_err(io_err(&target))?;
                for src in &assets {
                    if let Some(name) = src.file_name() {
                        let dest = target.join(name);
                        fs::copy(src, &dest).map_err(io_err(&dest))?;
                    }
                }
                Ok(Applied::Changed(format!("{} asset(s) installed", assets.len())))
            }
        }
    }

    /// Refuse a result that breaks structure the original still had.
    fn write_checked(&self, target: &Path, before: &str, after: &str) -> Result<(), PatchFailure> {
        if let Some(syntax) = self.syntax() {
            if text::check_balance(before, syntax).is_ok() {
                text::check_balance(after, syntax)
                    .map_err(|e| PatchFailure::ValidationRejected(e.to_string()))?;
            }
        }
        text::write_atomic(target, after).map_err(io_err(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_edit_miss_changes_nothing() {
        let edits = [
            Edit::optional("a", "A"),
            Edit::required("zzz", "Z"),
        ];
        assert!(apply_edits("abc", &edits).is_none());
    }

    #[test]
    fn optional_edits_count_only_hits() {
        let edits = [Edit::optional("a", "A"), Edit::optional("q", "Q")];
        let (out, changed) = apply_edits("abca", &edits).unwrap();
        assert_eq!(out, "AbcA");
        assert_eq!(changed, 1);
    }

    #[test]
    fn non_utf8_target_is_left_alone() {
        static ENTRY: PatchEntry = PatchEntry {
            key: "greet",
            label: "a.js: greeting",
            target: "a.js",
            detect: Detect::Contains("hello"),
            strategy: Strategy::Exact(&[Edit::required("hi", "hello")]),
        };
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.js");
        let bytes = b"say('hi'); // \xff\xfe\n".to_vec();
        fs::write(&target, &bytes).unwrap();
        let ctx = PatchContext {
            working: dir.path(),
            fixtures: dir.path(),
        };

        assert!(matches!(
            ENTRY.apply(&ctx),
            Err(PatchFailure::ValidationRejected(_))
        ));
        assert_eq!(fs::read(&target).unwrap(), bytes);
    }

    #[test]
    fn no_hits_is_not_a_change() {
        assert!(apply_edits("abc", &[Edit::optional("x", "y")]).is_none());
    }
}
