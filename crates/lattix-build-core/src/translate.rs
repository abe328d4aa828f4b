//! The translate-or-skip gate.
//!
//! Decides once per invocation whether the slate translator runs. When it
//! does not, the shipped generated files stand in for the translator's
//! output, and the gate validates that they are complete and not stale
//! relative to the translator sources and declared dependency files.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use semver::Version as ToolVersion;

use crate::catalog::{BuildArgs, CompilationUnit, Language};
use crate::config::CONFIG_FILE;
use crate::context::{BuildContext, BuildOptions};
use crate::error::{Error, Result};
use crate::tools::ToolRunner;
use crate::version::{Provenance, Version};

/// Translator command looked up on PATH.
pub const TRANSLATOR_COMMAND: &str = "slate";

/// Extension of translator source files.
pub const TRANSLATOR_SOURCE_EXT: &str = "sl";

const REQUIRED_TRANSLATOR_VERSION: (u64, u64, u64) = (1, 2, 0);

fn required_version() -> ToolVersion {
    let (major, minor, patch) = REQUIRED_TRANSLATOR_VERSION;
    ToolVersion::new(major, minor, patch)
}

/// A translator found on PATH, with its reported version.
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    pub path: PathBuf,
    pub version: ToolVersion,
}

/// Locate the translator and query its version.
///
/// Any failure along the way (not on PATH, `--version` fails, output
/// unparsable) means there is no usable translator; this is never an
/// error.
pub fn find_translator(runner: &dyn ToolRunner, root: &Path) -> Option<TranslatorInfo> {
    let path = which::which(TRANSLATOR_COMMAND).ok()?;
    let output = runner.run(TRANSLATOR_COMMAND, &["--version"], root).ok()?;
    if !output.success() {
        return None;
    }
    let version = parse_version_output(&output.stdout)?;
    Some(TranslatorInfo { path, version })
}

/// Parse `slate X.Y.Z`; the version is the last whitespace token.
fn parse_version_output(stdout: &str) -> Option<ToolVersion> {
    let token = stdout.split_whitespace().last()?;
    ToolVersion::parse(token).ok()
}

/// Translate-or-skip decision for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationDecision {
    /// Run the translator over every translator source.
    Run { trace: bool },
    /// Use the shipped generated files. `translator_reachable`
    /// distinguishes a self-inflicted opt-out (staleness is a caution)
    /// from a tree that must be usable as-is (staleness is fatal).
    Skip { translator_reachable: bool },
}

/// Compute the decision from the opt-in flags, the version provenance and
/// the discovered translator.
///
/// An unset opt-in defaults to "translate iff the version came from the
/// control system": a checkout belongs to someone working on the sources,
/// a distribution does not. Returns an optional help line for the build
/// summary when a requested translation cannot happen.
pub fn decide(
    options: &BuildOptions,
    version: &Version,
    translator: Option<&TranslatorInfo>,
) -> (TranslationDecision, Option<String>) {
    let wanted = options
        .translate
        .unwrap_or(version.provenance == Provenance::ControlSystem);
    let adequate = translator.filter(|info| info.version >= required_version());

    if !wanted {
        return (
            TranslationDecision::Skip {
                translator_reachable: adequate.is_some(),
            },
            None,
        );
    }
    if adequate.is_some() {
        return (
            TranslationDecision::Run {
                trace: options.trace,
            },
            None,
        );
    }

    let help = match translator {
        Some(info) => format!(
            "{TRANSLATOR_COMMAND} {} is too old ({} or later is required); \
             falling back to the shipped generated files",
            info.version,
            required_version()
        ),
        None => format!(
            "{TRANSLATOR_COMMAND} is not installed; \
             falling back to the shipped generated files"
        ),
    };
    (
        TranslationDecision::Skip {
            translator_reachable: false,
        },
        Some(help),
    )
}

/// A compilation unit after the gate: the sources the native toolchain
/// gets, plus the translator inputs they came from.
#[derive(Debug, Clone)]
pub struct ResolvedUnit {
    pub name: String,
    pub language: Language,
    /// Sources handed to the native toolchain.
    pub sources: Vec<PathBuf>,
    /// The `.sl` inputs (empty for purely native units).
    pub translator_sources: Vec<PathBuf>,
    pub args: BuildArgs,
}

/// Pairs of (source file, generated file) where the source is newer than
/// the oldest generated file of its unit.
pub type StalenessReport = Vec<(PathBuf, PathBuf)>;

/// Resolve every unit through the gate.
///
/// In the run state, `.sl` sources are rewritten to the paths the
/// translator will generate; freshly generated files need no staleness
/// check. In the skip states the generated files must already exist:
/// missing ones are fatal no matter what, stale ones are fatal only when
/// no translator could regenerate them.
pub fn resolve_units(
    ctx: &BuildContext,
    units: &[CompilationUnit],
) -> Result<Vec<ResolvedUnit>> {
    let mut resolved = Vec::with_capacity(units.len());
    let mut report: StalenessReport = Vec::new();

    for unit in units {
        let language = Language::parse(&unit.name, unit.args.language.as_deref())?;
        let ext = language.generated_extension();

        let mut sources = Vec::new();
        let mut translator_sources = Vec::new();
        let mut generated = Vec::new();
        for source in &unit.sources {
            if source
                .extension()
                .is_some_and(|e| e == TRANSLATOR_SOURCE_EXT)
            {
                let counterpart = source.with_extension(ext);
                translator_sources.push(source.clone());
                generated.push(counterpart.clone());
                sources.push(counterpart);
            } else {
                sources.push(source.clone());
            }
        }

        if let TranslationDecision::Skip {
            translator_reachable,
        } = ctx.decision
        {
            check_generated(
                ctx,
                unit,
                &translator_sources,
                &generated,
                translator_reachable,
                &mut report,
            )?;
        }

        resolved.push(ResolvedUnit {
            name: unit.name.clone(),
            language,
            sources,
            translator_sources,
            args: unit.args.clone(),
        });
    }

    if !report.is_empty() {
        if ctx.decision
            == (TranslationDecision::Skip {
                translator_reachable: false,
            })
        {
            for (source, generated) in &report {
                tracing::error!(
                    "{} is newer than {} and the translator is unavailable",
                    source.display(),
                    generated.display()
                );
            }
            return Err(Error::Stale { report });
        }
        for (source, generated) in &report {
            tracing::warn!(
                "{} is newer than {}; the stale file will be used because \
                 translation is not requested",
                source.display(),
                generated.display()
            );
        }
    }

    Ok(resolved)
}

/// Validate the shipped generated files of one unit, accumulating stale
/// pairs into `report`.
fn check_generated(
    ctx: &BuildContext,
    unit: &CompilationUnit,
    translator_sources: &[PathBuf],
    generated: &[PathBuf],
    translator_reachable: bool,
    report: &mut StalenessReport,
) -> Result<()> {
    // The oldest generated artifact bounds the staleness comparison.
    let mut oldest: Option<(SystemTime, &PathBuf)> = None;
    for path in generated {
        let mtime = match fs::metadata(ctx.path(path)).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => {
                let hint = if translator_reachable {
                    format!(
                        "Re-run with --translate so {TRANSLATOR_COMMAND} can generate it."
                    )
                } else {
                    format!(
                        "Install {TRANSLATOR_COMMAND} {} or later, or use a source \
                         distribution of lattix.",
                        required_version()
                    )
                };
                return Err(Error::MissingGenerated {
                    path: path.clone(),
                    hint,
                });
            }
        };
        if oldest.is_none_or(|(time, _)| mtime < time) {
            oldest = Some((mtime, path));
        }
    }
    let Some((oldest_time, oldest_path)) = oldest else {
        return Ok(());
    };

    for source in translator_sources.iter().chain(unit.args.depends.iter()) {
        // The configuration file gates recompilation, never retranslation.
        if source.as_os_str() == OsStr::new(CONFIG_FILE) {
            continue;
        }
        let Ok(mtime) = fs::metadata(ctx.path(source)).and_then(|m| m.modified()) else {
            tracing::warn!(
                "declared dependency file {} does not exist",
                source.display()
            );
            continue;
        };
        if mtime > oldest_time {
            report.push((source.clone(), oldest_path.clone()));
        }
    }
    Ok(())
}

/// Hand every translator source to slate. The translator's failure is the
/// build's failure.
pub fn run_translator(ctx: &BuildContext, units: &[ResolvedUnit], trace: bool) -> Result<()> {
    for unit in units {
        for source in &unit.translator_sources {
            let source_arg = source.to_string_lossy();
            let mut args: Vec<&str> = Vec::new();
            if trace {
                args.push("--line-trace");
            }
            args.push(&source_arg);

            let output = ctx
                .runner
                .run(TRANSLATOR_COMMAND, &args, &ctx.root)
                .map_err(|e| Error::Translator {
                    path: source.clone(),
                    detail: e.to_string(),
                })?;
            if !output.success() {
                return Err(Error::Translator {
                    path: source.clone(),
                    detail: output.stderr.trim().to_owned(),
                });
            }
            tracing::debug!("translated {}", source.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRunner;
    use std::time::Duration;
    use tempfile::TempDir;

    fn tool(version: &str) -> TranslatorInfo {
        TranslatorInfo {
            path: PathBuf::from("/usr/bin/slate"),
            version: ToolVersion::parse(version).unwrap(),
        }
    }

    fn version(provenance: Provenance) -> Version {
        Version {
            string: "1.0".to_owned(),
            provenance,
        }
    }

    fn context(root: &Path, decision: TranslationDecision) -> BuildContext {
        BuildContext {
            root: root.to_path_buf(),
            options: BuildOptions::default(),
            runner: Box::new(FakeRunner::new()),
            version: version(Provenance::Unknown),
            decision,
            summary: Vec::new(),
            units: Vec::new(),
        }
    }

    /// Write `path` (creating parents) and pin its mtime `age` seconds in
    /// the past so staleness comparisons are deterministic.
    fn write_aged(root: &Path, rel: &str, age: u64) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "x").unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn simple_unit() -> CompilationUnit {
        CompilationUnit {
            name: "lattix.graph.core".to_owned(),
            sources: vec![PathBuf::from("lattix/graph/core.sl")],
            args: BuildArgs {
                depends: vec![PathBuf::from("lattix/graph/core.sld")],
                ..BuildArgs::default()
            },
        }
    }

    #[test]
    fn version_output_parses_last_token() {
        assert_eq!(
            parse_version_output("slate 1.4.2\n"),
            Some(ToolVersion::new(1, 4, 2))
        );
        assert_eq!(parse_version_output("gibberish"), None);
        assert_eq!(parse_version_output(""), None);
    }

    #[test]
    fn explicit_opt_in_with_adequate_tool_runs() {
        let options = BuildOptions {
            translate: Some(true),
            trace: false,
        };
        let (decision, help) = decide(&options, &version(Provenance::Unknown), Some(&tool("1.4.0")));
        assert_eq!(decision, TranslationDecision::Run { trace: false });
        assert!(help.is_none());
    }

    #[test]
    fn checkout_provenance_defaults_to_run() {
        let options = BuildOptions::default();
        let (decision, _) = decide(
            &options,
            &version(Provenance::ControlSystem),
            Some(&tool("1.2.0")),
        );
        assert_eq!(decision, TranslationDecision::Run { trace: false });
    }

    #[test]
    fn stamp_provenance_defaults_to_skip() {
        let options = BuildOptions::default();
        let (decision, help) = decide(
            &options,
            &version(Provenance::StaticStamp),
            Some(&tool("1.4.0")),
        );
        assert_eq!(
            decision,
            TranslationDecision::Skip {
                translator_reachable: true
            }
        );
        assert!(help.is_none());
    }

    #[test]
    fn requested_but_missing_tool_degrades_with_help() {
        let options = BuildOptions {
            translate: Some(true),
            trace: false,
        };
        let (decision, help) = decide(&options, &version(Provenance::Unknown), None);
        assert_eq!(
            decision,
            TranslationDecision::Skip {
                translator_reachable: false
            }
        );
        assert!(help.unwrap().contains("not installed"));
    }

    #[test]
    fn requested_but_old_tool_degrades_with_help() {
        let options = BuildOptions {
            translate: Some(true),
            trace: false,
        };
        let (decision, help) = decide(&options, &version(Provenance::Unknown), Some(&tool("1.1.9")));
        assert_eq!(
            decision,
            TranslationDecision::Skip {
                translator_reachable: false
            }
        );
        assert!(help.unwrap().contains("too old"));
    }

    #[test]
    fn explicit_opt_out_beats_checkout_default() {
        let options = BuildOptions {
            translate: Some(false),
            trace: false,
        };
        let (decision, _) = decide(
            &options,
            &version(Provenance::ControlSystem),
            Some(&tool("1.4.0")),
        );
        assert_eq!(
            decision,
            TranslationDecision::Skip {
                translator_reachable: true
            }
        );
    }

    #[test]
    fn skip_with_fresh_artifacts_resolves_generated_sources() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write_aged(temp.path(), "lattix/graph/core.sl", 100);
        write_aged(temp.path(), "lattix/graph/core.sld", 100);
        write_aged(temp.path(), "lattix/graph/core.c", 10);
        let ctx = context(
            temp.path(),
            TranslationDecision::Skip {
                translator_reachable: false,
            },
        );

        let resolved = resolve_units(&ctx, &[simple_unit()]).expect("gate should pass");
        assert_eq!(resolved[0].sources, [PathBuf::from("lattix/graph/core.c")]);
        assert_eq!(
            resolved[0].translator_sources,
            [PathBuf::from("lattix/graph/core.sl")]
        );
    }

    #[test]
    fn missing_generated_file_is_fatal_even_without_staleness() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write_aged(temp.path(), "lattix/graph/core.sl", 100);
        write_aged(temp.path(), "lattix/graph/core.sld", 100);
        // No core.c on disk.
        let ctx = context(
            temp.path(),
            TranslationDecision::Skip {
                translator_reachable: false,
            },
        );

        let error = resolve_units(&ctx, &[simple_unit()]).unwrap_err();
        match error {
            Error::MissingGenerated { path, .. } => {
                assert_eq!(path, PathBuf::from("lattix/graph/core.c"));
            }
            other => panic!("expected MissingGenerated, got {other:?}"),
        }
    }

    #[test]
    fn staleness_is_fatal_only_when_translator_unreachable() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write_aged(temp.path(), "lattix/graph/core.sl", 10);
        write_aged(temp.path(), "lattix/graph/core.sld", 100);
        write_aged(temp.path(), "lattix/graph/core.c", 50);

        let unreachable = context(
            temp.path(),
            TranslationDecision::Skip {
                translator_reachable: false,
            },
        );
        let error = resolve_units(&unreachable, &[simple_unit()]).unwrap_err();
        assert!(matches!(error, Error::Stale { ref report } if report.len() == 1));

        // Same tree, but the skip was self-inflicted: a caution, not an error.
        let reachable = context(
            temp.path(),
            TranslationDecision::Skip {
                translator_reachable: true,
            },
        );
        resolve_units(&reachable, &[simple_unit()]).expect("staleness should be a warning");
    }

    #[test]
    fn declared_dependency_files_participate_in_staleness() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write_aged(temp.path(), "lattix/graph/core.sl", 100);
        write_aged(temp.path(), "lattix/graph/core.sld", 10); // newer than core.c
        write_aged(temp.path(), "lattix/graph/core.c", 50);
        let ctx = context(
            temp.path(),
            TranslationDecision::Skip {
                translator_reachable: false,
            },
        );

        let error = resolve_units(&ctx, &[simple_unit()]).unwrap_err();
        match error {
            Error::Stale { report } => {
                assert_eq!(report[0].0, PathBuf::from("lattix/graph/core.sld"));
            }
            other => panic!("expected Stale, got {other:?}"),
        }
    }

    #[test]
    fn config_file_is_exempt_from_staleness() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write_aged(temp.path(), "lattix/graph/core.sl", 100);
        write_aged(temp.path(), "lattix/graph/core.sld", 100);
        write_aged(temp.path(), "lattix/graph/core.c", 50);
        write_aged(temp.path(), CONFIG_FILE, 1); // newest file in the tree

        let mut unit = simple_unit();
        unit.args.depends.push(PathBuf::from(CONFIG_FILE));
        let ctx = context(
            temp.path(),
            TranslationDecision::Skip {
                translator_reachable: false,
            },
        );

        resolve_units(&ctx, &[unit]).expect("config file must not trigger staleness");
    }

    #[test]
    fn cpp_units_resolve_to_cpp_files() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        write_aged(temp.path(), "lattix/fancy.sl", 100);
        write_aged(temp.path(), "lattix/fancy.cpp", 10);
        let unit = CompilationUnit {
            name: "lattix.fancy".to_owned(),
            sources: vec![PathBuf::from("lattix/fancy.sl")],
            args: BuildArgs {
                language: Some("c++".to_owned()),
                ..BuildArgs::default()
            },
        };
        let ctx = context(
            temp.path(),
            TranslationDecision::Skip {
                translator_reachable: false,
            },
        );

        let resolved = resolve_units(&ctx, &[unit]).expect("gate should pass");
        assert_eq!(resolved[0].language, Language::Cpp);
        assert_eq!(resolved[0].sources, [PathBuf::from("lattix/fancy.cpp")]);
    }

    #[test]
    fn run_state_skips_staleness_entirely() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        // Nothing generated on disk at all.
        write_aged(temp.path(), "lattix/graph/core.sl", 100);
        let ctx = context(temp.path(), TranslationDecision::Run { trace: false });

        let resolved = resolve_units(&ctx, &[simple_unit()]).expect("run state needs no artifacts");
        assert_eq!(resolved[0].sources, [PathBuf::from("lattix/graph/core.c")]);
    }

    #[test]
    fn translator_failure_propagates_with_source_name() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut ctx = context(temp.path(), TranslationDecision::Run { trace: false });
        ctx.runner = Box::new(FakeRunner::new().on(
            TRANSLATOR_COMMAND,
            None,
            crate::test_support::Outcome::Exit {
                code: 1,
                stdout: String::new(),
                stderr: "syntax error".to_owned(),
            },
        ));

        let resolved = resolve_units(&ctx, &[simple_unit()]).unwrap();
        let error = run_translator(&ctx, &resolved, false).unwrap_err();
        match error {
            Error::Translator { path: source, detail } => {
                assert_eq!(source, PathBuf::from("lattix/graph/core.sl"));
                assert_eq!(detail, "syntax error");
            }
            other => panic!("expected Translator, got {other:?}"),
        }
    }

    #[test]
    fn trace_flag_reaches_the_translator_invocation() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let runner = FakeRunner::new().ok(TRANSLATOR_COMMAND, None, "");
        let calls = runner.calls();
        let mut ctx = context(temp.path(), TranslationDecision::Run { trace: true });
        ctx.runner = Box::new(runner);

        let resolved = resolve_units(&ctx, &[simple_unit()]).unwrap();
        run_translator(&ctx, &resolved, true).expect("translation should succeed");
        let log = calls.borrow();
        assert!(log.iter().any(|c| c.contains("--line-trace")));
    }
}
