// src/exec/mod.rs

//! Subprocess adapters.
//!
//! All shell-outs go to well-known tools (rpm, systemctl, readelf, file,
//! podman) and every one of them passes through the [`ToolRunner`] trait so
//! tests can substitute canned outputs. Nothing else in the crate is allowed
//! to spawn a process.

pub mod bridge;

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

pub use bridge::{HostBridge, HostExec, ProbeStatus};

/// Default wall-clock deadline for a single tool invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured result of a tool invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Why a tool invocation produced no output.
#[derive(Debug)]
pub enum RunError {
    /// The binary is not present in the inspection container
    NotFound(String),
    /// Spawn failed for another reason
    Spawn(std::io::Error),
    /// The deadline elapsed and the child was killed
    Timeout(Duration),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::NotFound(tool) => write!(f, "tool not found: {}", tool),
            RunError::Spawn(e) => write!(f, "spawn failed: {}", e),
            RunError::Timeout(d) => write!(f, "timed out after {:?}", d),
        }
    }
}

impl std::error::Error for RunError {}

/// The single seam between the crate and the outside world.
pub trait ToolRunner: Send + Sync {
    fn run(&self, argv: &[&str]) -> Result<RunOutput, RunError>;
}

/// Real runner: spawns the command with piped output and a bounded wait.
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        SystemRunner { timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRunner for SystemRunner {
    fn run(&self, argv: &[&str]) -> Result<RunOutput, RunError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(RunError::Spawn(std::io::Error::other("empty argv")));
        };
        debug!(command = %argv.join(" "), "exec");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RunError::NotFound(program.to_string())
                } else {
                    RunError::Spawn(e)
                }
            })?;

        // Drain pipes on threads so a chatty child cannot deadlock the wait.
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_thread = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });
        let stderr_thread = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status.code().unwrap_or(-1),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_thread.join();
                let _ = stderr_thread.join();
                return Err(RunError::Timeout(self.timeout));
            }
            Err(e) => return Err(RunError::Spawn(e)),
        };

        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        Ok(RunOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

/// Scripted runner for tests: maps an argv pattern to a canned output.
/// A pattern matches when its elements appear in argv in order (not
/// necessarily contiguously), so variable paths between flags don't matter.
pub struct FakeRunner {
    scripts: Vec<(Vec<String>, RunOutput)>,
    /// Tools that should report NotFound
    missing: Vec<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        FakeRunner {
            scripts: Vec::new(),
            missing: Vec::new(),
        }
    }

    /// Register a canned success for any argv containing `pattern` in order.
    pub fn on(mut self, pattern: &[&str], stdout: &str) -> Self {
        self.scripts.push((
            pattern.iter().map(|s| s.to_string()).collect(),
            RunOutput {
                status: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
        self
    }

    pub fn on_output(mut self, pattern: &[&str], output: RunOutput) -> Self {
        self.scripts
            .push((pattern.iter().map(|s| s.to_string()).collect(), output));
        self
    }

    pub fn without(mut self, tool: &str) -> Self {
        self.missing.push(tool.to_string());
        self
    }

    fn matches(pattern: &[String], argv: &[&str]) -> bool {
        let mut argv_iter = argv.iter();
        pattern
            .iter()
            .all(|wanted| argv_iter.any(|arg| arg == wanted))
    }
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, argv: &[&str]) -> Result<RunOutput, RunError> {
        if let Some(program) = argv.first() {
            if self.missing.iter().any(|m| m == program) {
                return Err(RunError::NotFound(program.to_string()));
            }
        }
        for (pattern, output) in &self.scripts {
            if Self::matches(pattern, argv) {
                return Ok(output.clone());
            }
        }
        // Unscripted command: behave like a missing tool so inspectors
        // exercise their degraded paths.
        Err(RunError::NotFound(
            argv.first().unwrap_or(&"").to_string(),
        ))
    }
}
