//! CLI argument definitions for the `bpa` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "bpa",
    version,
    about = "Best Practice Analyzer - check tabular models against rule files",
    long_about = "Check a tabular model snapshot against Best Practice Analyzer rules.\n\n\
                  Rules are merged from the built-in set, rule URLs, the model's own\n\
                  annotations, and the user and machine rule files."
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
    /// Check a rule file for structural problems.
    Lint(LintArgs),

    /// Show which rules each source contributes to a model's rule set.
    Audit(AuditArgs),

    /// Analyze a model snapshot and optionally apply fixes.
    Analyze(AnalyzeArgs),
}

#[derive(Parser)]
pub struct LintArgs {
    /// Rule file to check.
    #[arg(value_name = "RULES")]
    pub rules: PathBuf,

    /// Rewrite the file: strip comment and runtime fields, use CRLF.
    #[arg(long = "fix")]
    pub fix: bool,
}

/// Where rules come from, in addition to the model's own annotations.
#[derive(Args, Clone, Debug, Default)]
pub struct SourceArgs {
    /// Do not load the built-in rules.
    #[arg(long = "no-builtin")]
    pub no_builtin: bool,

    /// Additional rule file URL or path (repeatable).
    #[arg(long = "rules-url", value_name = "URL")]
    pub rules_urls: Vec<String>,

    /// User rule file (default: $BPA_USER_RULES or %LOCALAPPDATA%).
    #[arg(long = "user-rules", value_name = "PATH")]
    pub user_rules: Option<PathBuf>,

    /// Machine rule file (default: $BPA_MACHINE_RULES or %PROGRAMDATA%).
    #[arg(long = "machine-rules", value_name = "PATH")]
    pub machine_rules: Option<PathBuf>,

    /// Host preferences file controlling the built-in rules.
    #[arg(long = "preferences", value_name = "PATH")]
    pub preferences: Option<PathBuf>,

    /// Let the user rule file override the machine rule file.
    #[arg(long = "local-first")]
    pub local_first: bool,
}

#[derive(Parser)]
pub struct AuditArgs {
    /// Model snapshot (JSON).
    #[arg(long = "model", value_name = "SNAPSHOT")]
    pub model: PathBuf,

    #[command(flatten)]
    pub sources: SourceArgs,
}

#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Model snapshot (JSON).
    #[arg(long = "model", value_name = "SNAPSHOT")]
    pub model: PathBuf,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// Apply fix expressions to violating objects, then analyze again.
    #[arg(long = "fix")]
    pub fix: bool,

    /// Write the (fixed) model snapshot to this path.
    #[arg(long = "write-model", value_name = "PATH", requires = "fix")]
    pub write_model: Option<PathBuf>,

    /// Write a JSON analysis report.
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Write violations as CSV.
    #[arg(long = "csv", value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Abandon a rule that runs longer than this many milliseconds.
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Evaluate each rule on a single thread.
    #[arg(long = "no-parallel")]
    pub no_parallel: bool,
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
