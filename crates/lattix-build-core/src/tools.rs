//! Subprocess execution capability.
//!
//! Every external tool the orchestrator touches (git, the native toolchain,
//! the slate translator) is invoked through [`ToolRunner`], so tests can
//! substitute a scripted fake and exercise tool-absent and tool-erroring
//! paths without spawning real processes.

use std::io;
use std::path::Path;
use std::process::Command;

/// Captured outcome of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the tool exited with code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external tools synchronously, capturing exit code and output.
///
/// A spawn failure (tool not installed, not executable) surfaces as an
/// `io::Error`; a nonzero exit is a normal [`ToolOutput`]. No invocation
/// is retried.
pub trait ToolRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> io::Result<ToolOutput>;
}

/// [`ToolRunner`] backed by `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> io::Result<ToolOutput> {
        let output = Command::new(program).args(args).current_dir(cwd).output()?;
        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
