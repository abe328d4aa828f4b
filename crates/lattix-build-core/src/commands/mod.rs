//! Packaging commands as explicit ordered step lists.
//!
//! A command is a list of named steps, each a function over the build
//! context, run in order and stopped at the first failure. `sdist`
//! includes every `build` step up front: a source distribution cut from a
//! tree that does not build is invalid.

mod build;
mod sdist;
mod tutorial;

pub use build::BUILD_DIR;
pub use sdist::{DIST_DIR, MANIFEST_FILE};
pub use tutorial::{TUT_HIDDEN_PREFIX, TUT_OUTPUT_DIR, TUT_SOURCE_DIR};

use crate::context::BuildContext;
use crate::error::Result;

/// One named packaging step.
pub struct Step {
    pub name: &'static str,
    pub run: fn(&mut BuildContext) -> Result<()>,
}

/// Steps of the `build` command.
///
/// The tutorial scripts and the version stamp are not needed for
/// installation, but a build without them is incomplete; listing them
/// here guarantees they are always produced.
pub fn build_steps() -> Vec<Step> {
    vec![
        Step {
            name: "build-ext",
            run: build::build_extensions,
        },
        Step {
            name: "stamp-version",
            run: build::stamp_version,
        },
        Step {
            name: "build-tut",
            run: tutorial::build_tutorial,
        },
    ]
}

/// Steps of the `sdist` command.
pub fn sdist_steps() -> Vec<Step> {
    let mut steps = build_steps();
    steps.push(Step {
        name: "write-manifest",
        run: sdist::write_manifest,
    });
    steps.push(Step {
        name: "stage-release",
        run: sdist::stage_release,
    });
    steps
}

/// Steps of the standalone `build-tut` command.
pub fn tutorial_steps() -> Vec<Step> {
    vec![Step {
        name: "build-tut",
        run: tutorial::build_tutorial,
    }]
}

/// Run steps in order; the first failure aborts the command.
pub fn run_steps(ctx: &mut BuildContext, steps: &[Step]) -> Result<()> {
    for step in steps {
        tracing::debug!(step = step.name, "running");
        (step.run)(ctx)?;
    }
    Ok(())
}
