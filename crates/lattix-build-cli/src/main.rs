//! lattix-build CLI - build orchestrator for the lattix native extensions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lattix_build_core::commands::{self, Step};
use lattix_build_core::{BuildContext, BuildOptions, SystemRunner};

#[derive(Parser)]
#[command(name = "lattix-build")]
#[command(about = "Build orchestrator for the lattix native extensions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Package root directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
}

#[derive(Args, Clone, Default)]
struct TranslateFlags {
    /// Run the slate translator over the .sl sources
    #[arg(long, overrides_with = "no_translate")]
    translate: bool,

    /// Use the shipped generated files even in a checkout
    #[arg(long, overrides_with = "translate")]
    no_translate: bool,

    /// Enable line tracing in the translator (requires --translate)
    #[arg(long)]
    translator_trace: bool,
}

impl TranslateFlags {
    fn options(&self) -> anyhow::Result<BuildOptions> {
        if self.translator_trace && !self.translate {
            anyhow::bail!("--translator-trace requires --translate");
        }
        let translate = if self.translate {
            Some(true)
        } else if self.no_translate {
            Some(false)
        } else {
            None
        };
        Ok(BuildOptions {
            translate,
            trace: self.translator_trace,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the extensions, the version stamp and the tutorial scripts
    Build {
        #[command(flatten)]
        flags: TranslateFlags,
    },

    /// Build, then regenerate the manifest and stage a source distribution
    Sdist {
        #[command(flatten)]
        flags: TranslateFlags,
    },

    /// Build only the stripped tutorial scripts
    BuildTut,

    /// Print the resolved package version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let run = |options: BuildOptions, steps: Vec<Step>| -> anyhow::Result<()> {
        let mut ctx = BuildContext::new(cli.root.clone(), options, Box::new(SystemRunner));
        commands::run_steps(&mut ctx, &steps)
            .map_err(|error| anyhow::anyhow!("{}", error.with_hint()))
    };

    match &cli.command {
        Commands::Build { flags } => run(flags.options()?, commands::build_steps())?,

        Commands::Sdist { flags } => run(flags.options()?, commands::sdist_steps())?,

        Commands::BuildTut => run(BuildOptions::default(), commands::tutorial_steps())?,

        Commands::Version => {
            let ctx = BuildContext::new(
                cli.root.clone(),
                BuildOptions::default(),
                Box::new(SystemRunner),
            );
            tracing::info!(provenance = ?ctx.version.provenance, "resolved version");
            println!("{}", ctx.version.string);
        }
    }

    Ok(())
}
