//! SnapWarden CLI - Main entry point.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use snapwarden::cli::{Cli, Commands};
use snapwarden::config::SchedulerConfig;
use snapwarden::history::{HistoryStore, JsonFileHistoryStore};
use snapwarden::provider::{Inventory, MemoryCloud};
use snapwarden::schedule::{parse_tag_values, WindowEvaluator};
use snapwarden::SnapshotScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::from_file(path)?,
        None => SchedulerConfig::default(),
    };
    cli.apply_overrides(&mut config);
    snapwarden::observability::init(&config.observability)?;

    match cli.command {
        Commands::Parse { tag } => {
            let policy = parse_tag_values(&tag, &config.policy.schedule_defaults());
            println!("{}", serde_json::to_string_pretty(&policy)?);
        }

        Commands::Check { tag, at } => {
            let now = parse_instant(at.as_deref())?;
            let policy = parse_tag_values(&tag, &config.policy.schedule_defaults());
            let evaluator = WindowEvaluator::from_interval(config.execution_interval)?;

            let window = evaluator.local_window(&policy, now)?;
            let due = evaluator.is_due(&policy, now)?;
            println!("{}", serde_json::to_string_pretty(&window)?);
            println!("Start time: {}", policy.start_time);
            println!("Days active: {}", policy.days_active);
            println!("Due: {}", if due { "yes" } else { "no" });
        }

        Commands::History { region } => {
            let store = JsonFileHistoryStore::new(config.history.path.clone());
            let mut records = store.scan().await?;
            records.retain(|r| region.as_deref().map_or(true, |want| r.region == want));
            records.sort_by(|a, b| a.start_time.cmp(&b.start_time));

            if records.is_empty() {
                println!("No snapshot history");
            }
            for record in &records {
                println!(
                    "{}  {:<12} {:<20} {:<22} {:>6} GiB  purge: {}",
                    record.snapshot_id,
                    record.region,
                    record.instance_id,
                    record.volume_id,
                    record.size,
                    record.purge_time
                );
            }
        }

        Commands::Simulate { inventory, at } => {
            let now = parse_instant(at.as_deref())?;
            let inventory = Inventory::from_file(&inventory)?;
            let cloud = Arc::new(MemoryCloud::from_inventory(&inventory).await);

            if let Some(dir) = config.history.path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let history = Arc::new(JsonFileHistoryStore::new(config.history.path.clone()));

            let scheduler = SnapshotScheduler::new(config, cloud, history)?;
            let report = scheduler.run(now).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("{}", serde_json::to_string_pretty(&report.metrics_payload())?);
        }

        Commands::Version => {
            println!("SnapWarden v{}", env!("CARGO_PKG_VERSION"));
            println!("Tag-driven volume snapshot scheduling");
        }
    }

    Ok(())
}

/// Parse an optional RFC 3339 instant, defaulting to now.
fn parse_instant(at: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}
