//! Compilation-unit descriptors and the extension catalog.
//!
//! The catalog is the declarative list of native modules: four fixed units
//! without external compile-time dependencies, the linear-algebra unit
//! (always present) and the sparse-solver unit (only when the dependency
//! probe resolves it).

use std::path::PathBuf;

use crate::config::{CONFIG_FILE, UserConfig};
use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::probe;

/// Native build arguments accumulated for one compilation unit.
///
/// Merging appends; nothing is ever overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArgs {
    pub libraries: Vec<String>,
    pub library_dirs: Vec<String>,
    pub include_dirs: Vec<String>,
    pub define_macros: Vec<String>,
    pub extra_compile_args: Vec<String>,
    pub extra_link_args: Vec<String>,
    /// Declared dependency files; they gate recompilation and are part of
    /// the staleness comparison.
    pub depends: Vec<PathBuf>,
    /// Explicit language tag ("c" or "c++").
    pub language: Option<String>,
}

impl BuildArgs {
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
            && self.library_dirs.is_empty()
            && self.include_dirs.is_empty()
            && self.define_macros.is_empty()
            && self.extra_compile_args.is_empty()
            && self.extra_link_args.is_empty()
            && self.depends.is_empty()
            && self.language.is_none()
    }

    /// Append every argument of `other`. An existing language tag is kept.
    pub fn merge(&mut self, other: &BuildArgs) {
        self.libraries.extend(other.libraries.iter().cloned());
        self.library_dirs.extend(other.library_dirs.iter().cloned());
        self.include_dirs.extend(other.include_dirs.iter().cloned());
        self.define_macros.extend(other.define_macros.iter().cloned());
        self.extra_compile_args
            .extend(other.extra_compile_args.iter().cloned());
        self.extra_link_args
            .extend(other.extra_link_args.iter().cloned());
        self.depends.extend(other.depends.iter().cloned());
        if self.language.is_none() {
            self.language = other.language.clone();
        }
    }

    /// Apply one `build.conf` entry. Values are whitespace-separated
    /// token lists; unknown keys are ignored with a warning.
    pub fn apply_config_entry(&mut self, key: &str, value: &str) {
        let tokens = || value.split_whitespace().map(str::to_owned);
        match key {
            "libraries" => self.libraries.extend(tokens()),
            "library_dirs" => self.library_dirs.extend(tokens()),
            "include_dirs" => self.include_dirs.extend(tokens()),
            "define_macros" => self.define_macros.extend(tokens()),
            "extra_compile_args" => self.extra_compile_args.extend(tokens()),
            "extra_link_args" => self.extra_link_args.extend(tokens()),
            "depends" => self
                .depends
                .extend(value.split_whitespace().map(PathBuf::from)),
            "language" => self.language = Some(value.trim().to_owned()),
            other => tracing::warn!(key = other, "ignoring unknown {CONFIG_FILE} key"),
        }
    }
}

/// Languages a compilation unit may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    /// Parse a declared tag; a missing tag means C, anything unknown is a
    /// user-actionable misconfiguration.
    pub fn parse(unit: &str, tag: Option<&str>) -> Result<Self> {
        match tag {
            None | Some("c") => Ok(Self::C),
            Some("c++") => Ok(Self::Cpp),
            Some(other) => Err(Error::UnknownLanguage {
                unit: unit.to_owned(),
                language: other.to_owned(),
            }),
        }
    }

    /// Extension of the files the translator generates for this language.
    pub fn generated_extension(self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }
}

/// One logical native module: dotted name, ordered sources and build
/// arguments.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// Dotted module name, e.g. `lattix.graph.core`.
    pub name: String,
    pub sources: Vec<PathBuf>,
    pub args: BuildArgs,
}

fn unit(name: &str, sources: &[&str], args: BuildArgs) -> CompilationUnit {
    CompilationUnit {
        name: name.to_owned(),
        sources: sources.iter().map(PathBuf::from).collect(),
        args,
    }
}

fn paths(raw: &[&str]) -> Vec<PathBuf> {
    raw.iter().map(PathBuf::from).collect()
}

/// The units with no external compile-time dependency.
fn fixed_units() -> Vec<CompilationUnit> {
    vec![
        unit(
            "lattix.system",
            &["lattix/system.sl"],
            BuildArgs {
                include_dirs: vec!["lattix/graph".to_owned()],
                ..BuildArgs::default()
            },
        ),
        unit(
            "lattix.graph.core",
            &["lattix/graph/core.sl"],
            BuildArgs {
                depends: paths(&[
                    "lattix/graph/core.sld",
                    "lattix/graph/defs.h",
                    "lattix/graph/defs.sld",
                ]),
                ..BuildArgs::default()
            },
        ),
        unit(
            "lattix.graph.utils",
            &["lattix/graph/utils.sl"],
            BuildArgs {
                depends: paths(&[
                    "lattix/graph/defs.h",
                    "lattix/graph/defs.sld",
                    "lattix/graph/core.sld",
                ]),
                ..BuildArgs::default()
            },
        ),
        unit(
            "lattix.graph.slicer",
            &[
                "lattix/graph/slicer.sl",
                "lattix/graph/c_slicer/partitioner.cc",
                "lattix/graph/c_slicer/slicer.cc",
            ],
            BuildArgs {
                depends: paths(&[
                    "lattix/graph/defs.h",
                    "lattix/graph/defs.sld",
                    "lattix/graph/core.sld",
                    "lattix/graph/c_slicer.sld",
                    "lattix/graph/c_slicer/bucket_list.h",
                    "lattix/graph/c_slicer/graphwrap.h",
                    "lattix/graph/c_slicer/partitioner.h",
                    "lattix/graph/c_slicer/slicer.h",
                ]),
                ..BuildArgs::default()
            },
        ),
    ]
}

/// Assemble the full catalog: fixed units plus the ones dependency
/// probing contributes.
pub fn assemble(ctx: &mut BuildContext) -> Result<Vec<CompilationUnit>> {
    let config = UserConfig::load(&ctx.root)?;
    let mut units = fixed_units();

    let lapack = probe::lapack(&config, &mut ctx.summary);
    let mut lapack_args = lapack.clone();
    lapack_args.depends.push(CONFIG_FILE.into());
    lapack_args.depends.push("lattix/linalg/f_lapack.sld".into());
    units.push(unit(
        "lattix.linalg.lapack",
        &["lattix/linalg/lapack.sl"],
        lapack_args,
    ));

    // The sparse solver needs linear algebra transitively, so its
    // arguments are augmented with the lapack ones.
    if let Some(mut mumps) = probe::mumps(&config, ctx.runner.as_ref(), &mut ctx.summary) {
        mumps.merge(&lapack);
        mumps.depends.push(CONFIG_FILE.into());
        mumps.depends.push("lattix/linalg/cmumps.sld".into());
        units.push(unit(
            "lattix.linalg.mumps",
            &["lattix/linalg/mumps.sl"],
            mumps,
        ));
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BuildOptions;
    use crate::test_support::FakeRunner;
    use crate::translate::TranslationDecision;
    use crate::version::{Provenance, Version};
    use std::fs;
    use tempfile::TempDir;

    fn context(root: &std::path::Path, runner: FakeRunner) -> BuildContext {
        BuildContext {
            root: root.to_path_buf(),
            options: BuildOptions::default(),
            runner: Box::new(runner),
            version: Version {
                string: "0.0".to_owned(),
                provenance: Provenance::Unknown,
            },
            decision: TranslationDecision::Skip {
                translator_reachable: false,
            },
            summary: Vec::new(),
            units: Vec::new(),
        }
    }

    #[test]
    fn without_mumps_the_catalog_has_five_units() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut ctx = context(temp.path(), FakeRunner::new());

        let units = assemble(&mut ctx).expect("Failed to assemble catalog");
        let names: Vec<_> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "lattix.system",
                "lattix.graph.core",
                "lattix.graph.utils",
                "lattix.graph.slicer",
                "lattix.linalg.lapack",
            ]
        );
        assert!(ctx.summary.iter().any(|l| l == "No MUMPS support"));
    }

    #[test]
    fn user_override_feeds_solver_unit_and_skips_probe() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        fs::write(
            temp.path().join(CONFIG_FILE),
            "[mumps]\nlibraries = foo bar\n",
        )
        .unwrap();
        let runner = FakeRunner::new();
        let calls = runner.calls();
        let mut ctx = context(temp.path(), runner);

        let units = assemble(&mut ctx).expect("Failed to assemble catalog");
        let mumps = units
            .iter()
            .find(|u| u.name == "lattix.linalg.mumps")
            .expect("solver unit should be present");

        // User libraries first, then every lapack library, appended.
        assert_eq!(mumps.args.libraries, ["foo", "bar", "lapack", "blas"]);
        assert!(mumps.args.depends.contains(&PathBuf::from(CONFIG_FILE)));
        assert!(
            mumps
                .args
                .depends
                .contains(&PathBuf::from("lattix/linalg/cmumps.sld"))
        );
        // No link probe was spawned.
        assert!(calls.borrow().iter().all(|call| !call.starts_with("cc")));
        assert!(
            ctx.summary
                .iter()
                .any(|l| l == "User-configured MUMPS")
        );
    }

    #[test]
    fn lapack_unit_always_declares_its_dependency_files() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut ctx = context(temp.path(), FakeRunner::new());

        let units = assemble(&mut ctx).expect("Failed to assemble catalog");
        let lapack = units
            .iter()
            .find(|u| u.name == "lattix.linalg.lapack")
            .unwrap();
        assert_eq!(lapack.args.libraries, ["lapack", "blas"]);
        assert!(lapack.args.depends.contains(&PathBuf::from(CONFIG_FILE)));
        assert!(
            lapack
                .args
                .depends
                .contains(&PathBuf::from("lattix/linalg/f_lapack.sld"))
        );
    }

    #[test]
    fn merge_appends_and_keeps_language() {
        let mut base = BuildArgs {
            libraries: vec!["a".to_owned()],
            language: Some("c++".to_owned()),
            ..BuildArgs::default()
        };
        let other = BuildArgs {
            libraries: vec!["b".to_owned()],
            include_dirs: vec!["inc".to_owned()],
            language: Some("c".to_owned()),
            ..BuildArgs::default()
        };
        base.merge(&other);
        assert_eq!(base.libraries, ["a", "b"]);
        assert_eq!(base.include_dirs, ["inc"]);
        assert_eq!(base.language.as_deref(), Some("c++"));
    }

    #[test]
    fn unknown_language_is_rejected() {
        let error = Language::parse("lattix.system", Some("fortran")).unwrap_err();
        assert!(matches!(error, Error::UnknownLanguage { .. }));
    }
}
