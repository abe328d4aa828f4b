//! Package version resolution.
//!
//! The authoritative version comes from `git describe` when the tree is a
//! checkout, falling back to the static stamp a previous build wrote, and
//! finally to the literal `"unknown"`. Resolution is a pure query; only the
//! packaging commands write the stamp back to disk.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::Result;
use crate::tools::ToolRunner;

/// Static version stamp, relative to the package root.
pub const STATIC_VERSION_FILE: &str = "lattix/_static_version";

const STAMP_HEADER: &str = "# Generated by lattix-build. Do not edit.";

/// How a version value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Derived from the version-control system.
    ControlSystem,
    /// Read back from a previously written stamp file.
    StaticStamp,
    /// Neither source was available.
    Unknown,
}

/// Resolved package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub string: String,
    pub provenance: Provenance,
}

/// Determine the package version.
///
/// Never fails: a missing tool, a tree that is not a checkout and a
/// malformed stamp all degrade the provenance instead of aborting.
pub fn resolve(runner: &dyn ToolRunner, root: &Path) -> Version {
    if let Some(string) = from_git(runner, root) {
        return Version {
            string,
            provenance: Provenance::ControlSystem,
        };
    }
    if let Some(string) = read_stamp(&root.join(STATIC_VERSION_FILE)) {
        return Version {
            string,
            provenance: Provenance::StaticStamp,
        };
    }
    Version {
        string: "unknown".to_owned(),
        provenance: Provenance::Unknown,
    }
}

fn from_git(runner: &dyn ToolRunner, root: &Path) -> Option<String> {
    let describe = runner.run("git", &["describe"], root).ok()?;
    if !describe.success() {
        return None;
    }
    let mut version = describe.stdout.trim().to_owned();
    if version.is_empty() {
        return None;
    }
    if let Some(stripped) = version.strip_prefix('v') {
        version = stripped.to_owned();
    }

    // Exit 0: clean tree. Exit 1: local modifications. Anything else,
    // including a check that would not run, leaves the state unknowable;
    // dirtiness is never inferred from partial output.
    match runner.run("git", &["diff", "--quiet"], root) {
        Ok(diff) if diff.code == Some(0) => {}
        Ok(diff) if diff.code == Some(1) => version.push_str("-dirty"),
        _ => {
            tracing::warn!("could not determine whether the working tree is modified");
            version.push_str("-confused");
        }
    }
    Some(version)
}

/// Parse the stamp file. Anything but the exact two-line shape (a `#`
/// comment, then `version = '<literal>'`) yields nothing, not an error.
pub fn read_stamp(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let mut lines = contents.lines();
    if !lines.next()?.starts_with('#') {
        return None;
    }
    let version_line = lines.next()?;
    if lines.next().is_some() {
        return None;
    }
    let literal = version_line
        .strip_prefix("version = '")?
        .strip_suffix('\'')?;
    (!literal.is_empty()).then(|| literal.to_owned())
}

/// Overwrite `path` with a freshly stamped version.
///
/// Any existing file is removed first; a missing file is fine.
pub fn write_stamp(version: &Version, path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{STAMP_HEADER}\nversion = '{}'\n", version.string))?;
    Ok(())
}
