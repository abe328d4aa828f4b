//! Optional native dependency detection.
//!
//! A user-supplied `build.conf` section always wins; auto-probing only
//! happens for components without one. Probe failure means the component
//! is left out, never that the build aborts.

use std::fs;

use crate::catalog::BuildArgs;
use crate::config::UserConfig;
use crate::tools::ToolRunner;

/// Library names the default linear-algebra guess links against.
const LAPACK_DEFAULT: &[&str] = &["lapack", "blas"];

/// Fixed candidate set for the sparse-solver link probe.
const MUMPS_CANDIDATES: &[&str] = &[
    "zmumps_scotch",
    "mumps_common_scotch",
    "pord",
    "mpiseq_scotch",
    "gfortran",
];

fn libraries(names: &[&str]) -> BuildArgs {
    BuildArgs {
        libraries: names.iter().map(|s| (*s).to_owned()).collect(),
        ..BuildArgs::default()
    }
}

/// Linear-algebra configuration.
///
/// Always resolves: a user section wins, otherwise the conventional
/// library names are assumed without querying the toolchain.
pub fn lapack(config: &UserConfig, summary: &mut Vec<String>) -> BuildArgs {
    if let Some(args) = config.section("lapack") {
        summary.push("User-configured LAPACK and BLAS".to_owned());
        return args.clone();
    }
    summary.push("Default LAPACK and BLAS".to_owned());
    libraries(LAPACK_DEFAULT)
}

/// Sparse-solver configuration: user section, else a real link probe.
///
/// `None` means the component is omitted entirely, which is not an error.
pub fn mumps(
    config: &UserConfig,
    runner: &dyn ToolRunner,
    summary: &mut Vec<String>,
) -> Option<BuildArgs> {
    if let Some(args) = config.section("mumps") {
        summary.push("User-configured MUMPS".to_owned());
        return Some(args.clone());
    }
    match link_probe(runner) {
        Some(args) => {
            summary.push("MUMPS via toolchain link probe".to_owned());
            Some(args)
        }
        None => {
            summary.push("No MUMPS support".to_owned());
            None
        }
    }
}

/// Link a do-nothing program against the candidate libraries and discard
/// the result. Only a clean zero exit counts; a nonzero exit or a
/// toolchain that cannot be spawned both mean "not available".
fn link_probe(runner: &dyn ToolRunner) -> Option<BuildArgs> {
    let scratch = tempfile::tempdir().ok()?;
    let source = scratch.path().join("probe.c");
    fs::write(&source, "int main(void) { return 0; }\n").ok()?;
    let binary = scratch.path().join("probe");

    let mut args = vec![
        source.to_string_lossy().into_owned(),
        "-o".to_owned(),
        binary.to_string_lossy().into_owned(),
    ];
    args.extend(MUMPS_CANDIDATES.iter().map(|lib| format!("-l{lib}")));
    let argv: Vec<&str> = args.iter().map(String::as_str).collect();

    let output = runner.run("cc", &argv, scratch.path()).ok()?;
    if !output.success() {
        tracing::debug!(stderr = %output.stderr, "MUMPS link probe failed");
        return None;
    }
    Some(libraries(MUMPS_CANDIDATES))
}
