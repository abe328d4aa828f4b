//! The build steps: compile every extension, then stamp the version.

use std::fs;
use std::path::PathBuf;

use crate::catalog::{self, Language};
use crate::config::{CONFIG_FILE, UserConfig};
use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::translate::{self, ResolvedUnit, TranslationDecision};
use crate::version::{self, Provenance, STATIC_VERSION_FILE};

/// Build output tree, relative to the package root.
pub const BUILD_DIR: &str = "build";

/// Assemble the catalog, run the gate, and compile every resolved unit.
///
/// On a translator or toolchain failure the accumulated build summary and
/// a remediation banner naming `build.conf` are printed before the error
/// propagates; the underlying diagnostic is never swallowed.
pub fn build_extensions(ctx: &mut BuildContext) -> Result<()> {
    let units = catalog::assemble(ctx)?;
    let resolved = translate::resolve_units(ctx, &units)?;

    match compile_all(ctx, &resolved) {
        Ok(()) => {
            ctx.units = resolved;
            print_summary(ctx);
            Ok(())
        }
        Err(error) => {
            emit_failure_banner(ctx);
            Err(error)
        }
    }
}

fn compile_all(ctx: &BuildContext, units: &[ResolvedUnit]) -> Result<()> {
    if let TranslationDecision::Run { trace } = ctx.decision {
        translate::run_translator(ctx, units, trace)?;
    }
    for unit in units {
        compile_unit(ctx, unit)?;
    }
    Ok(())
}

/// Invoke the native toolchain for one unit, producing
/// `build/lib/<module path>.so`.
fn compile_unit(ctx: &BuildContext, unit: &ResolvedUnit) -> Result<()> {
    let output_path = unit_output(ctx, unit)?;
    let driver = toolchain_driver(unit);

    let mut argv: Vec<String> = vec!["-shared".to_owned(), "-fPIC".to_owned()];
    for dir in &unit.args.include_dirs {
        argv.push(format!("-I{dir}"));
    }
    for def in &unit.args.define_macros {
        argv.push(format!("-D{def}"));
    }
    argv.extend(unit.args.extra_compile_args.iter().cloned());
    for source in &unit.sources {
        argv.push(source.to_string_lossy().into_owned());
    }
    for dir in &unit.args.library_dirs {
        argv.push(format!("-L{dir}"));
    }
    for lib in &unit.args.libraries {
        argv.push(format!("-l{lib}"));
    }
    argv.extend(unit.args.extra_link_args.iter().cloned());
    argv.push("-o".to_owned());
    argv.push(output_path.to_string_lossy().into_owned());

    let argv_refs: Vec<&str> = argv.iter().map(String::as_str).collect();
    let output = ctx
        .runner
        .run(driver, &argv_refs, &ctx.root)
        .map_err(|e| Error::Compile {
            unit: unit.name.clone(),
            detail: e.to_string(),
        })?;
    if !output.success() {
        // The toolchain's own diagnostic, verbatim.
        eprint!("{}", output.stderr);
        return Err(Error::Compile {
            unit: unit.name.clone(),
            detail: match output.code {
                Some(code) => format!("{driver} exited with code {code}"),
                None => format!("{driver} was terminated by a signal"),
            },
        });
    }
    tracing::info!("built {}", unit.name);
    Ok(())
}

/// C++ anywhere in the unit means the C++ driver links it.
fn toolchain_driver(unit: &ResolvedUnit) -> &'static str {
    let has_cpp = unit.language == Language::Cpp
        || unit
            .sources
            .iter()
            .any(|s| s.extension().is_some_and(|e| e == "cc" || e == "cpp"));
    if has_cpp { "c++" } else { "cc" }
}

fn unit_output(ctx: &BuildContext, unit: &ResolvedUnit) -> Result<PathBuf> {
    let rel = PathBuf::from(BUILD_DIR)
        .join("lib")
        .join(format!("{}.so", unit.name.replace('.', "/")));
    if let Some(parent) = rel.parent() {
        fs::create_dir_all(ctx.path(parent))?;
    }
    Ok(rel)
}

/// Fixed-format remediation banner around a failed extension build.
fn emit_failure_banner(ctx: &BuildContext) {
    if let Err(error) = UserConfig::create_if_missing(&ctx.root) {
        tracing::warn!("could not create {CONFIG_FILE}: {error}");
    }
    let rule = "*".repeat(70);
    eprintln!("{rule}");
    eprintln!("The compilation of lattix has failed. Please examine the error message");
    eprintln!("above and consult the installation instructions in README.");
    eprintln!("You might have to customize {CONFIG_FILE}.");
    eprintln!("{rule}");
    eprintln!("Build configuration was:");
    eprintln!("{}", ctx.summary.join("\n"));
    eprintln!("{rule}");
}

fn print_summary(ctx: &BuildContext) {
    println!("**************** Build summary ****************");
    println!("{}", ctx.summary.join("\n"));
}

/// Stamp the resolved version into the build tree, and keep the
/// source-tree stamp in sync with a control-system-derived version so the
/// two never disagree on disk after a build.
pub fn stamp_version(ctx: &mut BuildContext) -> Result<()> {
    version::write_stamp(
        &ctx.version,
        &ctx.path(PathBuf::from(BUILD_DIR).join(STATIC_VERSION_FILE)),
    )?;

    if ctx.version.provenance == Provenance::ControlSystem {
        let stamp_path = ctx.path(STATIC_VERSION_FILE);
        if version::read_stamp(&stamp_path).as_deref() != Some(ctx.version.string.as_str()) {
            version::write_stamp(&ctx.version, &stamp_path)?;
        }
    }
    Ok(())
}
