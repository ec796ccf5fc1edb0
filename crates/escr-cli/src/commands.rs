use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use tracing::{debug, info};

use escr_events::EventLog;
use escr_graph::{ContentStreamRecord, WorkspaceRecord};
use escr_projection::{
    CacheFlushingHook, CatchUp, CatchUpReport, ContentGraphProjection, IntegrityReport,
    IntegrityViolationDetector, ProjectionConfig, TracingCacheFlusher,
};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = effective_config(cli.config.as_deref(), cli.db.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Setup => cmd_setup(&config),
        Command::Reset => cmd_reset(&config),
        Command::Replay(args) => cmd_replay(&config, args, format),
        Command::Status => cmd_status(&config, format),
        Command::Check => cmd_check(&config, format),
        Command::Config => cmd_config(&config),
    }
}

/// The configuration file if one was given, else the defaults; `--db` wins over both.
fn effective_config(path: Option<&Path>, db: Option<&Path>) -> anyhow::Result<ProjectionConfig> {
    let mut config = match path {
        Some(path) => ProjectionConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => ProjectionConfig::default(),
    };
    if let Some(db) = db {
        config.database_path = db.to_path_buf();
    }
    debug!(
        database = %config.database_path.display(),
        content_repository = %config.content_repository_id,
        "configuration resolved"
    );
    Ok(config)
}

fn open(config: &ProjectionConfig) -> anyhow::Result<ContentGraphProjection> {
    let projection = ContentGraphProjection::open(config)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    projection.setup()?;
    Ok(projection)
}

fn cmd_setup(config: &ProjectionConfig) -> anyhow::Result<()> {
    open(config)?;
    println!(
        "{} Projection tables ready in {}",
        "✓".green().bold(),
        config.database_path.display().to_string().bold()
    );
    println!("  Prefix: {}", config.table_names().prefix().cyan());
    Ok(())
}

fn cmd_reset(config: &ProjectionConfig) -> anyhow::Result<()> {
    let mut projection = open(config)?;
    projection.reset()?;
    println!("{} Projection reset, checkpoint cleared.", "✓".green().bold());
    Ok(())
}

// ---- replay ----

fn replay(
    config: &ProjectionConfig,
    events: &Path,
    cache_flushing: bool,
) -> anyhow::Result<CatchUpReport> {
    let envelopes =
        EventLog::read(events).with_context(|| format!("reading {}", events.display()))?;
    let mut projection = open(config)?;
    let mut catch_up = CatchUp::new(&mut projection).with_batch_size(config.batch_size);
    if cache_flushing {
        catch_up = catch_up.with_hook(CacheFlushingHook::new(TracingCacheFlusher));
    }
    let report = catch_up.run(&envelopes)?;
    info!(
        events = envelopes.len(),
        applied = report.applied,
        checkpoint = report.checkpoint,
        "replay finished"
    );
    Ok(report)
}

fn cmd_replay(config: &ProjectionConfig, args: ReplayArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    let report = replay(&config, &args.events, config.cache_flushing && !args.no_cache_flush)?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "applied": report.applied,
                "skipped": report.skipped,
                "cancelled": report.cancelled,
                "checkpoint": report.checkpoint,
            })
        ),
        OutputFormat::Text => {
            println!("{} Replay complete.", "✓".green().bold());
            println!("  Applied: {}", report.applied.to_string().bold());
            println!("  Skipped: {}", report.skipped);
            println!("  Checkpoint: {}", report.checkpoint.to_string().yellow());
        }
    }
    Ok(())
}

// ---- status ----

struct Status {
    checkpoint: u64,
    nodes: usize,
    content_streams: Vec<ContentStreamRecord>,
    workspaces: Vec<WorkspaceRecord>,
}

fn status(config: &ProjectionConfig) -> anyhow::Result<Status> {
    let projection = open(config)?;
    let graph = projection.graph();
    Ok(Status {
        checkpoint: projection.checkpoint()?,
        nodes: graph.count_node_records()?,
        content_streams: graph.find_content_streams()?,
        workspaces: graph.find_workspaces()?,
    })
}

fn cmd_status(config: &ProjectionConfig, format: OutputFormat) -> anyhow::Result<()> {
    let status = status(config)?;

    if format == OutputFormat::Json {
        let content_streams: Vec<_> = status
            .content_streams
            .iter()
            .map(|cs| {
                json!({
                    "id": cs.id.as_str(),
                    "version": cs.version,
                    "source": cs.source_content_stream_id.as_ref().map(|id| id.as_str()),
                    "status": cs.status.as_str(),
                    "removed": cs.removed,
                })
            })
            .collect();
        let workspaces: Vec<_> = status
            .workspaces
            .iter()
            .map(|ws| {
                json!({
                    "name": ws.name.as_str(),
                    "base": ws.base_workspace_name.as_ref().map(|name| name.as_str()),
                    "contentStream": ws.current_content_stream_id.as_str(),
                    "status": ws.status.as_str(),
                })
            })
            .collect();
        println!(
            "{}",
            json!({
                "checkpoint": status.checkpoint,
                "nodes": status.nodes,
                "contentStreams": content_streams,
                "workspaces": workspaces,
            })
        );
        return Ok(());
    }

    println!("Checkpoint: {}", status.checkpoint.to_string().yellow().bold());
    println!("Node records: {}", status.nodes.to_string().bold());
    println!("\nContent streams ({}):", status.content_streams.len());
    for cs in &status.content_streams {
        let source = cs
            .source_content_stream_id
            .as_ref()
            .map(|id| format!(" forked from {id}"))
            .unwrap_or_default();
        let removed = if cs.removed { " removed".red().to_string() } else { String::new() };
        println!(
            "  {} v{} {}{}{}",
            cs.id.as_str().cyan(),
            cs.version,
            cs.status.as_str().dimmed(),
            source,
            removed
        );
    }
    println!("\nWorkspaces ({}):", status.workspaces.len());
    for ws in &status.workspaces {
        let base = ws
            .base_workspace_name
            .as_ref()
            .map(|name| format!(" on {name}"))
            .unwrap_or_default();
        println!(
            "  {}{} -> {} {}",
            ws.name.as_str().yellow(),
            base,
            ws.current_content_stream_id.as_str().cyan(),
            ws.status.as_str().dimmed()
        );
    }
    Ok(())
}

// ---- check ----

fn check(config: &ProjectionConfig) -> anyhow::Result<IntegrityReport> {
    let projection = open(config)?;
    Ok(IntegrityViolationDetector::run(&projection.graph())?)
}

fn cmd_check(config: &ProjectionConfig, format: OutputFormat) -> anyhow::Result<()> {
    let report = check(config)?;

    match format {
        OutputFormat::Json => {
            let violations: Vec<_> = report
                .violations
                .iter()
                .map(|v| json!({ "kind": v.kind.as_str(), "description": v.description }))
                .collect();
            println!("{}", json!({ "valid": report.is_valid(), "violations": violations }));
        }
        OutputFormat::Text if report.is_valid() => {
            println!("{} No integrity violations.", "✓".green().bold());
        }
        OutputFormat::Text => {
            for violation in &report.violations {
                println!(
                    "  {} {}",
                    violation.kind.as_str().red().bold(),
                    violation.description
                );
            }
        }
    }

    if !report.is_valid() {
        bail!("{} integrity violation(s) found", report.violations.len());
    }
    Ok(())
}

fn cmd_config(config: &ProjectionConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use escr_events::{
        ContentRepositoryEvent, ContentStreamWasCreated, EventEnvelope,
        NodeAggregateWithNodeWasCreated, RootNodeAggregateWithNodeWasCreated,
        RootWorkspaceWasCreated,
    };
    use escr_types::{
        ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, InterdimensionalSiblings,
        NodeAggregateClassification, NodeAggregateId, NodeTypeName, WorkspaceName,
    };

    fn config_in(dir: &Path) -> ProjectionConfig {
        ProjectionConfig {
            database_path: dir.join("graph.sqlite3"),
            content_repository_id: "cli_test".into(),
            ..ProjectionConfig::default()
        }
    }

    fn write_site_log(path: &Path) {
        let cs = ContentStreamId::new("cs-live").unwrap();
        let en = DimensionSpacePoint::new([("language", "en")]);
        let coverage = DimensionSpacePointSet::single(en.clone());
        let sites = NodeAggregateId::new("sites").unwrap();
        let events = vec![
            ContentRepositoryEvent::ContentStreamWasCreated(ContentStreamWasCreated {
                content_stream_id: cs.clone(),
            }),
            ContentRepositoryEvent::RootWorkspaceWasCreated(RootWorkspaceWasCreated {
                workspace_name: WorkspaceName::live(),
                new_content_stream_id: cs.clone(),
            }),
            ContentRepositoryEvent::RootNodeAggregateWithNodeWasCreated(
                RootNodeAggregateWithNodeWasCreated {
                    content_stream_id: cs.clone(),
                    node_aggregate_id: sites.clone(),
                    node_type_name: NodeTypeName::new("Acme:Sites").unwrap(),
                    covered_dimension_space_points: coverage.clone(),
                    node_aggregate_classification: NodeAggregateClassification::Root,
                },
            ),
            ContentRepositoryEvent::NodeAggregateWithNodeWasCreated(
                NodeAggregateWithNodeWasCreated {
                    content_stream_id: cs,
                    node_aggregate_id: NodeAggregateId::new("home").unwrap(),
                    node_type_name: NodeTypeName::new("Acme:Page").unwrap(),
                    origin_dimension_space_point: en,
                    succeeding_siblings_for_coverage: InterdimensionalSiblings::append_in(
                        &coverage,
                    ),
                    parent_node_aggregate_id: sites,
                    node_name: None,
                    initial_property_values: Default::default(),
                    node_aggregate_classification: NodeAggregateClassification::Regular,
                },
            ),
        ];
        let envelopes: Vec<EventEnvelope> = events
            .into_iter()
            .zip(1u64..)
            .map(|(event, seq)| EventEnvelope::new(seq, seq, event))
            .collect();
        EventLog::append(path, &envelopes).unwrap();
    }

    #[test]
    fn db_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("escr.toml");
        std::fs::write(&file, "database_path = \"from-file.db\"\nbatch_size = 7\n").unwrap();

        let config = effective_config(Some(file.as_path()), None).unwrap();
        assert_eq!(config.database_path, Path::new("from-file.db"));
        assert_eq!(config.batch_size, 7);

        let config = effective_config(Some(file.as_path()), Some(Path::new("override.db"))).unwrap();
        assert_eq!(config.database_path, Path::new("override.db"));
        assert_eq!(config.batch_size, 7);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(effective_config(Some(dir.path().join("absent.toml").as_path()), None).is_err());
    }

    #[test]
    fn replay_then_status_and_check() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let log = dir.path().join("events.jsonl");
        write_site_log(&log);

        let report = replay(&config, &log, true).unwrap();
        assert_eq!(report.applied, 4);
        assert_eq!(report.checkpoint, 4);

        let status = status(&config).unwrap();
        assert_eq!(status.checkpoint, 4);
        assert_eq!(status.nodes, 2);
        assert_eq!(status.content_streams.len(), 1);
        assert_eq!(status.workspaces.len(), 1);
        assert_eq!(status.workspaces[0].name, WorkspaceName::live());

        assert!(check(&config).unwrap().is_valid());
    }

    #[test]
    fn second_replay_skips_applied_events() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let log = dir.path().join("events.jsonl");
        write_site_log(&log);

        replay(&config, &log, false).unwrap();
        let again = replay(&config, &log, false).unwrap();
        assert_eq!(again.applied, 0);
        assert_eq!(again.skipped, 4);
        assert_eq!(again.checkpoint, 4);
    }

    #[test]
    fn reset_clears_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let log = dir.path().join("events.jsonl");
        write_site_log(&log);
        replay(&config, &log, false).unwrap();

        cmd_reset(&config).unwrap();
        let status = status(&config).unwrap();
        assert_eq!(status.checkpoint, 0);
        assert_eq!(status.nodes, 0);
        assert!(status.content_streams.is_empty());
    }

    #[test]
    fn replay_of_missing_log_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        assert!(replay(&config, &dir.path().join("absent.jsonl"), false).is_err());
    }
}
