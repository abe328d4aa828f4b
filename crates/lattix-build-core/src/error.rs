//! Error types for lattix-build-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::CONFIG_FILE;
use crate::translate::StalenessReport;

/// Result type for lattix-build-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while orchestrating a build.
///
/// Tolerable conditions (version-control query failed, dependency probe
/// failed) never reach this type; they degrade to defaults inside the
/// component that noticed them.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file exists but does not parse.
    #[error("malformed {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// A compilation unit declares a language tag the toolchain driver
    /// does not know.
    #[error("unknown language '{language}' declared for {unit}")]
    UnknownLanguage { unit: String, language: String },

    /// A shipped generated file is missing while the translator is not
    /// going to run.
    #[error("generated file {} is missing", .path.display())]
    MissingGenerated { path: PathBuf, hint: String },

    /// Generated files are older than their sources and cannot be
    /// regenerated.
    #[error("{} generated file(s) are older than their sources", .report.len())]
    Stale { report: StalenessReport },

    /// The translator ran and failed.
    #[error("translation of {} failed: {detail}", .path.display())]
    Translator { path: PathBuf, detail: String },

    /// The native toolchain ran and failed.
    #[error("compilation of {unit} failed: {detail}")]
    Compile { unit: String, detail: String },

    /// No justifiable source-distribution manifest can be produced.
    #[error("cannot produce a source-distribution manifest: {0}")]
    Manifest(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Render the error together with a recovery hint where one applies,
    /// so the user can act without reading the orchestrator's internals.
    pub fn with_hint(&self) -> String {
        match self {
            Error::Config { path, .. } => format!(
                "{self}\nEdit {} or delete it to fall back to auto-detection.",
                path.display()
            ),
            Error::UnknownLanguage { .. } => {
                format!("{self}\nOnly 'c' and 'c++' are understood; check {CONFIG_FILE}.")
            }
            Error::MissingGenerated { hint, .. } => format!("{self}\n{hint}"),
            Error::Stale { .. } => format!(
                "{self}\nInstall the translator to regenerate them, or restore a pristine \
                 source distribution."
            ),
            Error::Manifest(_) => {
                format!("{self}\nRun from a git checkout or provide a MANIFEST.in.")
            }
            _ => self.to_string(),
        }
    }
}
