//! User build configuration (`build.conf`).
//!
//! An INI file whose sections name optional components (`lapack`, `mumps`)
//! and whose keys are native build arguments with whitespace-separated
//! values. A missing file is a valid, empty configuration.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use ini::Ini;

use crate::catalog::BuildArgs;
use crate::error::{Error, Result};

/// User configuration file, relative to the package root.
pub const CONFIG_FILE: &str = "build.conf";

const CONFIG_HEADER: &str = "# Created by lattix-build - feel free to modify.\n";

/// Per-section build arguments parsed from `build.conf`.
#[derive(Debug, Default)]
pub struct UserConfig {
    sections: BTreeMap<String, BuildArgs>,
}

impl UserConfig {
    /// Load `build.conf` from the package root.
    ///
    /// A missing file yields an empty configuration; a file that does not
    /// parse as INI is a user-actionable error naming the file.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(&path).map_err(|e| Error::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let mut sections = BTreeMap::new();
        for (section, properties) in ini.iter() {
            // Keys outside any section configure nothing.
            let Some(name) = section else { continue };
            let mut args = BuildArgs::default();
            for (key, value) in properties.iter() {
                args.apply_config_entry(key, value);
            }
            sections.insert(name.to_owned(), args);
        }
        Ok(Self { sections })
    }

    /// Arguments for one component, if its section exists and is
    /// non-empty.
    pub fn section(&self, name: &str) -> Option<&BuildArgs> {
        self.sections.get(name).filter(|args| !args.is_empty())
    }

    /// Create an empty `build.conf` with an explanatory header, so the
    /// remediation banner names a file the user can actually edit.
    pub fn create_if_missing(root: &Path) -> io::Result<()> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            return Ok(());
        }
        fs::write(path, CONFIG_HEADER)
    }
}
