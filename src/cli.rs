use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keel")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision clusters and applications from declarations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base URL of the provisioning API
    #[arg(long, env = "KEEL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Directory holding one output directory per environment
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what an apply would create and delete
    #[command(subcommand)]
    Diff(DiffTarget),

    /// Create and delete resources until the environment matches the declaration
    #[command(subcommand)]
    Apply(ApplyTarget),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Diff
// ============================================================================

#[derive(Subcommand)]
pub enum DiffTarget {
    /// Diff a cluster declaration against its environment
    Cluster(DiffArgs),

    /// Diff an application declaration against its cluster
    Application(DiffArgs),
}

#[derive(Args)]
pub struct DiffArgs {
    /// Declaration file (.toml or .json), or - for stdin
    #[arg(short, long)]
    pub file: String,

    /// Print the transition as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Subcommand)]
pub enum ApplyTarget {
    /// Apply a cluster declaration
    Cluster(ApplyArgs),

    /// Apply an application declaration to its cluster
    Application(ApplyArgs),
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Declaration file (.toml or .json), or - for stdin
    #[arg(short, long)]
    pub file: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show what would be done without calling any service
    #[arg(short, long)]
    pub dry_run: bool,

    /// Number of sibling resources reconciled at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Give up after this many seconds, retries included
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run once instead of retrying until resources are ready
    #[arg(long)]
    pub no_retry: bool,
}
