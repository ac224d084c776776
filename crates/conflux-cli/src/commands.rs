use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use conflux_merge::{ConflictResolver, StrategyKind};
use conflux_node::{InMemoryNode, NodeGroup};
use conflux_orchestrator::{MergeOrchestrator, MergeSession, OrchestratorConfig, SessionError};
use conflux_types::{Platform, Severity, UnifiedSnapshot};
use serde_json::json;
use tracing::{debug, info};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Merge(args) => cmd_merge(args, config, cli.format).await,
        Command::Config => cmd_config(&config),
        Command::Strategies => cmd_strategies(&config, cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<OrchestratorConfig> {
    match path {
        Some(p) => {
            debug!(path = %p.display(), "loading configuration");
            OrchestratorConfig::load(p).with_context(|| format!("loading {}", p.display()))
        }
        None => Ok(OrchestratorConfig::default()),
    }
}

/// Build an in-memory node group from `PLATFORM=FILE` exports.
pub fn load_group(name: &str, nodes: &[(Platform, PathBuf)]) -> anyhow::Result<NodeGroup> {
    let mut group = NodeGroup::new(name);
    for (platform, path) in nodes {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let state: serde_json::Value =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        anyhow::ensure!(state.is_object(), "{} must hold a JSON object", path.display());
        debug!(%platform, path = %path.display(), "loaded node export");
        group.add(Arc::new(InMemoryNode::with_state(*platform, state)))?;
    }
    Ok(group)
}

async fn cmd_merge(args: MergeArgs, mut config: OrchestratorConfig, format: OutputFormat) -> anyhow::Result<()> {
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    let group = load_group(&args.group, &args.nodes)?;
    let orchestrator = MergeOrchestrator::new(config)?;
    info!(
        group = %args.group,
        nodes = group.len(),
        strategy = %orchestrator.config().strategy,
        "starting merge"
    );

    match orchestrator.merge_active_platforms(&group).await {
        Ok(snapshot) => {
            let history = orchestrator.history();
            let session = history.last().context("completed session missing from history")?;
            match format {
                OutputFormat::Json => print_json(session, &snapshot)?,
                OutputFormat::Text => print_summary(session, &snapshot),
            }
            Ok(())
        }
        Err(e) => {
            if let Some(session) = e.session() {
                print_failure(session, &e);
            }
            Err(e.into())
        }
    }
}

fn print_json(session: &MergeSession, snapshot: &UnifiedSnapshot) -> anyhow::Result<()> {
    let out = json!({
        "session": session.id.to_string(),
        "strategy": session.strategy,
        "digest": snapshot.digest(),
        "document": snapshot.to_json(),
        "provenance": snapshot.provenance(),
        "conflicts": snapshot.conflicts(),
        "resolutions": snapshot.resolutions(),
        "unresolved": snapshot.unresolved(),
        "node_failures": session.node_failures,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn severity_label(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::High => "high".red().bold(),
        Severity::Medium => "medium".yellow(),
        Severity::Low => "low".dimmed(),
    }
}

fn print_summary(session: &MergeSession, snapshot: &UnifiedSnapshot) {
    println!(
        "{} Merged {} nodes in session {} ({})",
        "✓".green().bold(),
        session.node_status.len(),
        session.id.short_id().yellow(),
        session.strategy.cyan()
    );
    println!("  Digest: {}", snapshot.digest().dimmed());
    for failure in &session.node_failures {
        println!("  {} {}: {}", "!".yellow(), failure.platform.to_string().bold(), failure.reason);
    }

    if snapshot.conflicts().is_empty() {
        println!("\nNo conflicts.");
    } else {
        println!("\n{:<8} {:<22} {:<8} {:<24} {}", "ID", "KIND", "SEVERITY", "PATH", "OUTCOME");
        for (conflict, resolution) in snapshot.conflicts().iter().zip(snapshot.resolutions()) {
            let outcome = if resolution.success {
                resolution.explanation.green()
            } else {
                "manual".red()
            };
            println!(
                "{:<8} {:<22} {:<8} {:<24} {}",
                conflict.id,
                conflict.kind.as_str(),
                severity_label(conflict.severity),
                conflict.path(),
                outcome
            );
        }
    }

    println!("\nProvenance:");
    for (path, provenance) in snapshot.provenance() {
        println!("  {:<24} {}", path.bold(), provenance);
    }
    if !snapshot.is_fully_resolved() {
        println!(
            "\n{} {} field(s) need manual resolution",
            "!".yellow().bold(),
            snapshot.unresolved().len()
        );
    }
}

fn print_failure(session: &MergeSession, error: &SessionError) {
    eprintln!("{} {}", "✗".red().bold(), error);
    eprintln!("  Session: {}", session.id.to_string().yellow());
    if let Some(recovery) = &session.recovery {
        let resumed: Vec<&str> = recovery.resumed.iter().map(Platform::as_str).collect();
        eprintln!("  Recovered: {}", resumed.join(", ").green());
        for failure in &recovery.failed {
            eprintln!("  {} {}: {}", "Not recovered".red(), failure.platform, failure.reason);
        }
    }
}

fn cmd_config(config: &OrchestratorConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn cmd_strategies(config: &OrchestratorConfig, format: OutputFormat) -> anyhow::Result<()> {
    let resolver = ConflictResolver::with_builtin_strategies(&config.rules);
    let names = resolver.table().names();
    match format {
        OutputFormat::Json => {
            let listing: Vec<_> = names
                .iter()
                .map(|name| json!({"name": name, "description": describe(name)}))
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Text => {
            for name in names {
                let description = describe(name).unwrap_or("custom").dimmed();
                if name == config.strategy {
                    println!("* {:<20} {}", name.green().bold(), description);
                } else {
                    println!("  {name:<20} {description}");
                }
            }
        }
    }
    Ok(())
}

fn describe(name: &str) -> Option<&'static str> {
    name.parse::<StrategyKind>().ok().map(|kind| kind.description())
}
