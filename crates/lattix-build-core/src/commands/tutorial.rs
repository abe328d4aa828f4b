//! Tutorial script generation.
//!
//! Tutorial sources keep their plumbing (plot setup, data dumps) behind a
//! hidden-line marker so the published scripts stay readable; building
//! strips those lines into the output tree.

use std::fs;

use crate::context::BuildContext;
use crate::error::Result;

/// Where the annotated tutorial sources live, relative to the package root.
pub const TUT_SOURCE_DIR: &str = "doc/tutorial";

/// Where the stripped scripts go.
pub const TUT_OUTPUT_DIR: &str = "tutorial";

/// Lines starting with this marker never reach the output.
pub const TUT_HIDDEN_PREFIX: &str = "#HIDDEN";

const TUT_EXT: &str = "lx";

/// Strip hidden lines from every tutorial script into `tutorial/`.
///
/// All other lines are preserved byte-for-byte in their original order.
/// A package without tutorial sources builds fine; zero scripts is not an
/// error.
pub fn build_tutorial(ctx: &mut BuildContext) -> Result<()> {
    let output_dir = ctx.path(TUT_OUTPUT_DIR);
    if !output_dir.exists() {
        fs::create_dir_all(&output_dir)?;
    }

    let entries = match fs::read_dir(ctx.path(TUT_SOURCE_DIR)) {
        Ok(entries) => entries,
        Err(_) => {
            tracing::debug!("no tutorial sources under {TUT_SOURCE_DIR}");
            return Ok(());
        }
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_none_or(|e| e != TUT_EXT) {
            continue;
        }
        let contents = fs::read_to_string(&path)?;
        let stripped: String = contents
            .split_inclusive('\n')
            .filter(|line| !line.starts_with(TUT_HIDDEN_PREFIX))
            .collect();
        fs::write(output_dir.join(entry.file_name()), stripped)?;
        tracing::debug!("stripped tutorial script {}", path.display());
    }
    Ok(())
}
