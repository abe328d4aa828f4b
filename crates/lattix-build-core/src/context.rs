//! Per-invocation build state.
//!
//! [`BuildContext`] is constructed once at the start of an invocation and
//! threaded explicitly through every component call. The build summary and
//! the translation decision live here and nowhere else; there is no
//! process-global state.

use std::path::{Path, PathBuf};

use crate::tools::ToolRunner;
use crate::translate::{self, TranslationDecision};
use crate::version::{self, Version};

/// Command-line options that influence orchestration.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Explicit translation opt-in (`Some(true)`) or opt-out
    /// (`Some(false)`); `None` defers to the version provenance.
    pub translate: Option<bool>,
    /// Enable line tracing in the translator.
    pub trace: bool,
}

/// State threaded through one orchestrator invocation.
pub struct BuildContext {
    /// Package root directory, where `build.conf` and the sources live.
    pub root: PathBuf,
    pub options: BuildOptions,
    pub runner: Box<dyn ToolRunner>,
    /// Version resolved once at construction; the authoritative in-memory
    /// copy for the process lifetime.
    pub version: Version,
    /// Translate-or-skip decision, computed once at construction.
    pub decision: TranslationDecision,
    /// One line per dependency component, shown in the build summary.
    pub summary: Vec<String>,
    /// Units resolved by the build-ext step, reused by the sdist steps.
    pub units: Vec<translate::ResolvedUnit>,
}

impl BuildContext {
    /// Resolve the version, discover the translator and compute the
    /// translation decision for one invocation.
    pub fn new(root: impl Into<PathBuf>, options: BuildOptions, runner: Box<dyn ToolRunner>) -> Self {
        let root = root.into();
        let version = version::resolve(runner.as_ref(), &root);
        tracing::debug!(version = %version.string, "resolved package version");

        let translator = translate::find_translator(runner.as_ref(), &root);
        let (decision, help) = translate::decide(&options, &version, translator.as_ref());
        let mut summary = Vec::new();
        if let Some(help) = help {
            tracing::warn!("{help}");
            summary.push(help);
        }

        Self {
            root,
            options,
            runner,
            version,
            decision,
            summary,
            units: Vec::new(),
        }
    }

    /// Absolute form of a package-root-relative path.
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }
}
