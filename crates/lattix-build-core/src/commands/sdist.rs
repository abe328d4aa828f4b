//! Source-distribution steps: manifest regeneration and release staging.

use std::fs;
use std::path::{Path, PathBuf};

use crate::context::BuildContext;
use crate::error::{Error, Result};
use crate::translate::TRANSLATOR_SOURCE_EXT;
use crate::version;

/// Manifest file, relative to the package root.
pub const MANIFEST_FILE: &str = "MANIFEST.in";

/// Release staging area.
pub const DIST_DIR: &str = "dist";

/// Regenerate the manifest from the version-control file listing.
///
/// Every tracked translator source carries its generated file as a second
/// token on the same line, so the derived artifact ships even though it is
/// not tracked. If git cannot produce the listing, a pre-existing manifest
/// is kept with a warning; without one the distribution cannot be
/// justified and the step fails.
pub fn write_manifest(ctx: &mut BuildContext) -> Result<()> {
    let listing = ctx
        .runner
        .run("git", &["ls-files"], &ctx.root)
        .ok()
        .filter(|output| output.success());
    let Some(listing) = listing else {
        if ctx.path(MANIFEST_FILE).exists() {
            tracing::warn!(
                "version-control file listing unavailable; keeping the existing {MANIFEST_FILE}"
            );
            return Ok(());
        }
        return Err(Error::Manifest(format!(
            "version-control file listing unavailable and no {MANIFEST_FILE} to fall back to"
        )));
    };

    let mut manifest = String::new();
    for tracked in listing.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let path = Path::new(tracked);
        if is_ignore_file(path) {
            continue;
        }
        manifest.push_str("include ");
        manifest.push_str(tracked);
        if path
            .extension()
            .is_some_and(|e| e == TRANSLATOR_SOURCE_EXT)
        {
            manifest.push(' ');
            manifest.push_str(&generated_counterpart(ctx, path));
        }
        manifest.push('\n');
    }
    fs::write(ctx.path(MANIFEST_FILE), manifest)?;
    tracing::info!("regenerated {MANIFEST_FILE}");
    Ok(())
}

/// Version-control housekeeping files stay out of the distribution.
fn is_ignore_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(".git"))
}

/// Generated path for a tracked translator source, using the owning
/// unit's language when one is known.
fn generated_counterpart(ctx: &BuildContext, source: &Path) -> String {
    let ext = ctx
        .units
        .iter()
        .find(|unit| unit.translator_sources.iter().any(|s| s == source))
        .map_or("c", |unit| unit.language.generated_extension());
    source.with_extension(ext).to_string_lossy().into_owned()
}

/// Copy every manifest entry into `dist/lattix-<version>/` and stamp the
/// release tree, independently of the build-tree stamp.
pub fn stage_release(ctx: &mut BuildContext) -> Result<()> {
    let release_root = ctx.path(
        PathBuf::from(DIST_DIR).join(format!("lattix-{}", ctx.version.string)),
    );

    let manifest = fs::read_to_string(ctx.path(MANIFEST_FILE))?;
    for line in manifest.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("include") {
            continue;
        }
        for entry in tokens {
            let source = ctx.path(entry);
            if !source.exists() {
                tracing::warn!("manifest entry {entry} does not exist; skipping");
                continue;
            }
            let target = release_root.join(entry);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &target)?;
        }
    }

    version::write_stamp(&ctx.version, &release_root.join(version::STATIC_VERSION_FILE))?;
    tracing::info!("staged release tree {}", release_root.display());
    Ok(())
}
