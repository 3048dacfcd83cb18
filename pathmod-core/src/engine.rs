//! Runs a selection of catalog entries over the working directory.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::patch::{Applied, PatchContext, PatchEntry, PatchFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyApplied,
    NotApplicable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyApplied => f.write_str("already applied"),
            SkipReason::NotApplicable(why) => write!(f, "not applicable: {why}"),
        }
    }
}

/// Outcome of one engine pass. Built fresh per call.
#[derive(Debug, Default)]
pub struct RunResult {
    pub applied: Vec<(&'static str, String)>,
    pub skipped: Vec<(&'static str, SkipReason)>,
    pub failed: Vec<(&'static str, PatchFailure)>,
}

impl RunResult {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn applied_keys(&self) -> Vec<&'static str> {
        self.applied.iter().map(|(k, _)| *k).collect()
    }

    pub fn failed_keys(&self) -> Vec<&'static str> {
        self.failed.iter().map(|(k, _)| *k).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} applied, {} skipped, {} failed",
            self.applied.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

pub type Progress<'p> = &'p mut dyn FnMut(usize, usize, &str);

/// Apply `entries` in the order given. Entry failures, panics included, are
/// recorded and never stop the run.
pub fn run(
    ctx: &PatchContext<'_>,
    entries: &[&PatchEntry],
    mut progress: Option<Progress<'_>>,
) -> RunResult {
    let mut result = RunResult::default();
    let total = entries.len();

    for (idx, entry) in entries.iter().enumerate() {
        if let Some(report) = progress.as_mut() {
            report(idx, total, entry.label);
        }

        if entry.is_applied(ctx) {
            log::info!("[SKIP] {} (already applied)", entry.label);
            result.skipped.push((entry.key, SkipReason::AlreadyApplied));
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.apply(ctx)))
            .unwrap_or_else(|payload| Err(PatchFailure::Internal(panic_message(&*payload))));

        match outcome {
            Ok(Applied::Changed(detail)) => {
                log::info!("[OK] {} ({detail})", entry.label);
                result.applied.push((entry.key, detail));
            }
            Ok(Applied::NotApplicable(why)) => {
                log::info!("[SKIP] {} ({why})", entry.label);
                result.skipped.push((entry.key, SkipReason::NotApplicable(why)));
            }
            Err(failure) => {
                log::warn!("[FAIL] {}: {failure}", entry.label);
                result.failed.push((entry.key, failure));
            }
        }
    }

    if let Some(report) = progress.as_mut() {
        report(total, total, "done");
    }
    result
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "entry panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{Detect, Edit, Strategy};
    use std::fs;

    fn boom(_: &str) -> Result<String, PatchFailure> {
        panic!("transform exploded")
    }

    static ENTRIES: &[PatchEntry] = &[
        PatchEntry {
            key: "greet",
            label: "a.js: greeting",
            target: "a.js",
            detect: Detect::Contains("hello"),
            strategy: Strategy::Exact(&[Edit::required("hi", "hello")]),
        },
        PatchEntry {
            key: "explode",
            label: "b.js: explode",
            target: "b.js",
            detect: Detect::Contains("never"),
            strategy: Strategy::Pattern {
                exact: &[],
                fallback: boom,
            },
        },
    ];

    #[test]
    fn panicking_entry_is_recorded_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "say('hi');\n").unwrap();
        fs::write(dir.path().join("b.js"), "x();\n").unwrap();
        let ctx = PatchContext {
            working: dir.path(),
            fixtures: dir.path(),
        };

        let entries: Vec<&PatchEntry> = vec![&ENTRIES[1], &ENTRIES[0]];
        let mut seen = Vec::new();
        let mut sink = |i: usize, n: usize, _: &str| seen.push((i, n));
        let result = run(&ctx, &entries, Some(&mut sink));

        assert_eq!(result.applied_keys(), ["greet"]);
        match &result.failed[..] {
            [("explode", PatchFailure::Internal(msg))] => assert!(msg.contains("exploded")),
            other => panic!("unexpected failures: {other:?}"),
        }
        assert_eq!(seen, [(0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn second_pass_only_skips() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "say('hi');\n").unwrap();
        let ctx = PatchContext {
            working: dir.path(),
            fixtures: dir.path(),
        };
        let entries = vec![&ENTRIES[0]];
        assert_eq!(run(&ctx, &entries, None).applied.len(), 1);
        let again = run(&ctx, &entries, None);
        assert!(again.applied.is_empty());
        assert_eq!(again.skipped, [("greet", SkipReason::AlreadyApplied)]);
    }
}
