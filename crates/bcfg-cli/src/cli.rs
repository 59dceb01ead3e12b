//! CLI argument definitions for the build-config pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "bcfg",
    version,
    about = "Flavor-swappable build constants for compiled JVM applications",
    long_about = "Tag declared string constants before compilation, collect per-unit\n\
                  flavor documents, and rewrite compiled classes and archives so the\n\
                  inlined constants resolve through the runtime flavor delegate."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full pass over a build directory: collect flavor documents,
    /// then rewrite class trees and first-party archives.
    Apply(ApplyArgs),

    /// Tag the constant table and emit per-unit flavor documents only.
    Collect(CollectArgs),

    /// Rewrite a single class file or archive.
    Rewrite(RewriteArgs),

    /// Print the declared fields per unit and variant.
    Fields(FieldsArgs),
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Build output directory to process.
    #[arg(value_name = "BUILD_DIR")]
    pub build_dir: PathBuf,

    /// Constant table (default: <BUILD_DIR>/build-config.json).
    #[arg(long = "table", value_name = "PATH")]
    pub table: Option<PathBuf>,

    /// Directory to write flavor documents into
    /// (default: <BUILD_DIR>/flavor-docs).
    #[arg(long = "docs-dir", value_name = "DIR")]
    pub docs_dir: Option<PathBuf>,

    /// Loose class tree to rewrite (default: <BUILD_DIR>/classes).
    #[arg(long = "classes-dir", value_name = "DIR")]
    pub classes_dir: Option<PathBuf>,

    /// Directory of archives to repackage (default: <BUILD_DIR>/libs).
    /// Only archives named after a first-party unit are opened.
    #[arg(long = "libs-dir", value_name = "DIR")]
    pub libs_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub struct CollectArgs {
    /// Constant table to collect from.
    #[arg(value_name = "TABLE")]
    pub table: PathBuf,

    /// Directory to write `<unit>.json` flavor documents into.
    #[arg(long = "out", value_name = "DIR")]
    pub out: PathBuf,
}

#[derive(Parser)]
pub struct RewriteArgs {
    /// Class file or zip archive to rewrite in place.
    #[arg(value_name = "ARTIFACT")]
    pub artifact: PathBuf,

    /// Constant table defining the known tagged constants.
    #[arg(long = "table", value_name = "PATH")]
    pub table: PathBuf,
}

#[derive(Parser)]
pub struct FieldsArgs {
    /// Constant table to list.
    #[arg(value_name = "TABLE")]
    pub table: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
