//! Running external tools with a deadline, and asking whether the game is
//! running.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why an external tool invocation did not succeed. Each variant maps to a
/// different fix for the operator.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{program} not found (is Node.js installed and on PATH?)")]
    NotFound { program: String },

    #[error("{program} timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },

    #[error("{program} failed (exit {code:?}): {output}")]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{program} was blocked by the PowerShell execution policy; run from cmd.exe or set RemoteSigned for the current user")]
    ScriptPolicy { program: String },

    #[error("could not stage {}: {source}", path.display())]
    Transfer {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// stdout and stderr joined, trimmed; what gets surfaced to the operator.
    pub fn combined(&self) -> String {
        let out = self.stdout.trim();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (true, _) => err.to_string(),
            (false, true) => out.to_string(),
            (false, false) => format!("{out}\n{err}"),
        }
    }
}

const SCRIPT_POLICY_MESSAGE: &str = "cannot be loaded because running scripts is disabled";

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// Exit code zero is success; anything else is `ToolError::Failed` carrying
/// the tool's output verbatim.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<ToolOutput, ToolError> {
    let program = program_name(cmd);
    log::debug!("running {:?}", cmd);

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ToolError::NotFound {
                    program: program.clone(),
                }
            } else {
                ToolError::Spawn {
                    program: program.clone(),
                    source,
                }
            }
        })?;

    // Pipes are drained on their own threads so a chatty tool cannot fill
    // the pipe buffer and stall until the timeout.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                return Err(ToolError::Spawn { program, source });
            }
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut {
                program,
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(Duration::from_millis(50));
    };

    let output = ToolOutput {
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    };

    if output.stderr.contains(SCRIPT_POLICY_MESSAGE) {
        return Err(ToolError::ScriptPolicy { program });
    }
    if status.success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            program,
            code: status.code(),
            output: output.combined(),
        })
    }
}

/// Boolean "is the game running" gate used before touching archive or saves.
pub trait ProcessProbe {
    fn is_running(&self, executable: &str) -> bool;
}

/// Asks the platform's process list. Any failure to ask counts as "not
/// running".
#[derive(Debug, Clone)]
pub struct SystemProbe {
    pub timeout: Duration,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl ProcessProbe for SystemProbe {
    fn is_running(&self, executable: &str) -> bool {
        if cfg!(windows) {
            let mut cmd = Command::new("tasklist");
            cmd.args(["/FI", &format!("IMAGENAME eq {executable}"), "/NH"]);
            match run_with_timeout(&mut cmd, self.timeout) {
                Ok(out) => out.stdout.contains(executable),
                Err(_) => false,
            }
        } else {
            let stem = executable.trim_end_matches(".exe");
            let mut cmd = Command::new("pgrep");
            cmd.args(["-f", stem]);
            // pgrep exits 1 when nothing matched, which lands in Err.
            run_with_timeout(&mut cmd, self.timeout).is_ok()
        }
    }
}
