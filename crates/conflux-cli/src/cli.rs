use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use conflux_types::Platform;

#[derive(Parser)]
#[command(
    name = "conflux",
    about = "Conflux: checkpoint, capture, and merge multi-node state",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge node state exports into one unified snapshot
    Merge(MergeArgs),
    /// Print the effective configuration as TOML
    Config,
    /// List the available resolution strategies
    Strategies,
}

#[derive(Args)]
pub struct MergeArgs {
    /// Node export as PLATFORM=FILE (repeatable)
    #[arg(short, long = "node", value_parser = parse_node, required = true)]
    pub nodes: Vec<(Platform, PathBuf)>,

    /// Resolution strategy (overrides the configuration)
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Name recorded for the node group
    #[arg(long, default_value = "cli")]
    pub group: String,
}

fn parse_node(spec: &str) -> Result<(Platform, PathBuf), String> {
    let (platform, path) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected PLATFORM=FILE, got '{spec}'"))?;
    let platform = platform.parse::<Platform>().map_err(|e| e.to_string())?;
    if path.is_empty() {
        return Err(format!("missing file for {platform}"));
    }
    Ok((platform, PathBuf::from(path)))
}
