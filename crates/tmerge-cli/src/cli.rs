use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tmerge_engine::RedirectSpec;
use tmerge_hierarchy::TrunkWidget;
use tmerge_types::TermId;

#[derive(Parser, Debug)]
#[command(
    name = "term-merge",
    about = "Merge taxonomy terms into a single trunk term",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a vocabulary as an indented tree
    Tree(TreeArgs),
    /// List the terms the given branches may be merged into
    Candidates(CandidatesArgs),
    /// Merge branch terms into a trunk term
    Merge(MergeArgs),
    /// Print the effective merge settings as TOML
    Settings(SettingsArgs),
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// JSON snapshot of the term store
    #[arg(long)]
    pub store: PathBuf,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[arg(long)]
    pub vocabulary: String,
}

#[derive(Args, Debug)]
pub struct CandidatesArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[arg(long)]
    pub vocabulary: String,
    #[arg(long = "branch")]
    pub branches: Vec<TermId>,
    /// Force a widget instead of choosing by vocabulary size
    #[arg(long)]
    pub widget: Option<TrunkWidget>,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[arg(long = "branch", required = true)]
    pub branches: Vec<TermId>,
    #[arg(long, required_unless_present = "trunk_name", conflicts_with = "trunk_name")]
    pub trunk: Option<TermId>,
    /// Exact name of the trunk term, looked up in the branches' vocabulary
    #[arg(long)]
    pub trunk_name: Option<String>,
    /// Read synonyms of each branch from these fields
    #[arg(long = "synonym-source")]
    pub synonym_sources: Vec<String>,
    /// Where to write the merged store; defaults to --store
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Merge in memory and print the report without writing anything
    #[arg(long)]
    pub dry_run: bool,
    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// TOML file with merge settings; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub keep_branches: bool,
    #[arg(long = "merge-field")]
    pub merge_fields: Vec<String>,
    #[arg(long = "synonym-field")]
    pub synonym_fields: Vec<String>,
    /// none, default, or a 3xx status code
    #[arg(long)]
    pub redirect: Option<RedirectSpec>,
    /// Branch terms per batch increment
    #[arg(long)]
    pub step: Option<NonZeroUsize>,
    #[arg(long, conflicts_with = "no_unique")]
    pub unique: bool,
    #[arg(long)]
    pub no_unique: bool,
}
