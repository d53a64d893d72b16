mod cache;
mod config;
mod diagnostics;
mod error;
mod hasher;
mod linkcheck;
mod markdown;
mod nav;
mod report;
mod resolver;
mod transform;
mod types;
mod walker;
mod writer;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use crate::config::Config;
use crate::report::Report;
use crate::walker::MigrationRun;
use crate::writer::{OutputMode, Writer};

/// Command-line arguments.
#[derive(Parser)]
#[command(
    name = "docmigrate",
    version,
    about = "Migrate Docusaurus markdown trees to Mintlify MDX"
)]
struct Cli {
    /// Config file to use instead of `.docmigrate.toml` in the source root.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Compute and report everything without touching the filesystem.
    #[arg(long, conflicts_with = "staging")]
    dry_run: bool,

    /// Product namespace used in canonical links and image paths.
    #[arg(index = 3)]
    product: String,

    /// Directory holding one subdirectory per version.
    #[arg(index = 1)]
    source_root: PathBuf,

    /// Write all output under a staging directory instead of the real destinations.
    #[expect(clippy::option_option, reason = "absent, bare and valued flag are three distinct modes")]
    #[arg(long, value_name = "DIR", num_args = 0..=1, require_equals = true)]
    staging: Option<Option<PathBuf>>,

    /// Directory migrated documents are written into.
    #[arg(index = 2)]
    target_root: PathBuf,

    /// Merge the produced page list into the navigation manifest.
    #[arg(long)]
    update_nav: bool,

    /// Log more (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Parse arguments, run the migration and map the outcome to an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    return match migrate(&cli) {
        Ok(report) => {
            print!("{}", report.render());
            report.exit_code()
        },
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
    };
}

/// Load config, discover versions and run the migration.
///
/// # Errors
///
/// Returns fatal errors only: config, source root, output roots, nav file.
fn migrate(cli: &Cli) -> Result<Report, error::Error> {
    let config = Config::load(&cli.source_root, cli.config.as_deref())?;
    let versions = walker::discover_versions(&cli.source_root, &config)?;

    let assets_root = config
        .assets_root
        .clone()
        .unwrap_or_else(|| return default_assets_root(&cli.target_root));
    let writer = Writer::new(output_mode(cli), cli.target_root.clone(), assets_root);
    match writer.mode() {
        OutputMode::DryRun => eprintln!("dry run: nothing will be written"),
        OutputMode::Staging { root } => eprintln!("staging output under {}", root.display()),
        OutputMode::Write => {},
    }

    let mut run = MigrationRun::new(&config, cli.product.as_str(), writer);
    run.run(&versions, cli.update_nav)?;
    log::info!("{} issue(s) recorded", run.report().issues().len());
    return Ok(run.into_report());
}

/// Mode selected by the flags; `--staging` without a value uses a
/// per-product directory under the system temp dir.
fn output_mode(cli: &Cli) -> OutputMode {
    if cli.dry_run {
        return OutputMode::DryRun;
    }
    return match &cli.staging {
        Some(Some(root)) => OutputMode::Staging { root: root.clone() },
        Some(None) => OutputMode::Staging {
            root: std::env::temp_dir().join("docmigrate-staging").join(&cli.product),
        },
        None => OutputMode::Write,
    };
}

/// `assets/` next to the target root.
fn default_assets_root(target_root: &Path) -> PathBuf {
    return target_root
        .parent()
        .map_or_else(|| return PathBuf::from("assets"), |parent| return parent.join("assets"));
}
