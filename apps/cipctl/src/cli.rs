use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cipctl", version, about = "CIP wash-cycle analysis CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Analyze(AnalyzeArgs),
    Validate(ValidateArgs),
    Tags(TagsArgs),
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Run file describing tanks, tags, and the query window.
    #[arg(long)]
    pub run: PathBuf,
    /// Directory of exported historian series (one `<tag>.json` per tag).
    #[arg(long)]
    pub data_dir: PathBuf,
    /// Analysis config JSON; engine defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Tanks analyzed concurrently.
    #[arg(long, default_value_t = 4)]
    pub max_concurrency: usize,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[arg(long)]
    pub run: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct TagsArgs {
    #[arg(long)]
    pub run: PathBuf,
}
