use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use dotenvy::dotenv;
use madrasa_config::{MediaConfig, ServerConfig, StorageConfig};
use madrasa_core::LocalObjectStorage;
use madrasa_db::{PgPool, PgSlotStore, init_db_pool};
use madrasa_media::{DueAsset, RetentionSweeper};
use madrasa_observability::init_tracing;

#[derive(Parser)]
#[command(name = "madrasa-cli")]
#[command(about = "Madrasa CLI - Media retention tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete old media whose retention window has elapsed
    Sweep {
        /// Treat this instant as "now" (RFC 3339), e.g. 2025-07-01T00:00:00Z
        #[arg(long, value_parser = parse_instant)]
        now: Option<DateTime<Utc>>,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// List old media whose retention window has elapsed
    Due {
        /// Maximum number of assets to list
        #[arg(short = 'l', long, default_value = "100")]
        limit: usize,
    },
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let _guard = init_tracing();

    let cli = Cli::parse();

    let pool = match init_db_pool(&ServerConfig::from_env()).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    let sweeper = build_sweeper(pool);

    match cli.command {
        Commands::Sweep { now, yes } => {
            handle_sweep(&sweeper, now.unwrap_or_else(Utc::now), yes).await
        }
        Commands::Due { limit } => handle_due(&sweeper, limit).await,
    }
}

fn build_sweeper(pool: PgPool) -> RetentionSweeper {
    let media = MediaConfig::from_env();
    let storage = StorageConfig::from_env();

    let store = Arc::new(PgSlotStore::new(pool));
    let storage = Arc::new(LocalObjectStorage::new(
        storage.root,
        storage.public_base_url,
        storage.bucket,
    ));

    RetentionSweeper::new(store, storage).with_batch_size(media.sweep_batch_size)
}

fn print_asset(asset: &DueAsset) {
    println!(
        "  {}  {:<24} {}  {}",
        asset.delete_pending_until.to_rfc3339(),
        asset.target.slot.to_string(),
        asset.target.entity_id,
        asset.asset.object_key
    );
}

async fn handle_due(sweeper: &RetentionSweeper, limit: usize) {
    match sweeper.due(Utc::now(), limit).await {
        Ok(assets) if assets.is_empty() => println!("✅ Nothing is due for deletion"),
        Ok(assets) => {
            println!("{} asset(s) due for deletion:", assets.len());
            for asset in &assets {
                print_asset(asset);
            }
        }
        Err(e) => {
            eprintln!("❌ Error listing due media: {}", e);
            std::process::exit(1);
        }
    }
}

async fn handle_sweep(sweeper: &RetentionSweeper, now: DateTime<Utc>, yes: bool) {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete old media due at or before {}?",
                now.to_rfc3339()
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmed {
            println!("Aborted");
            return;
        }
    }

    match sweeper.sweep(now).await {
        Ok(report) => {
            println!("✅ Reclaimed {} asset(s)", report.reclaimed);
            if report.skipped > 0 {
                println!("   {} skipped (changed since they were listed)", report.skipped);
            }
            if !report.failed.is_empty() {
                println!("⚠️  {} failed, will be retried on the next sweep:", report.failed.len());
                for asset in &report.failed {
                    print_asset(asset);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Error sweeping media: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sweep_parses_instant() {
        let cli = Cli::try_parse_from([
            "madrasa-cli",
            "sweep",
            "--now",
            "2025-07-01T00:00:00Z",
            "--yes",
        ])
        .unwrap();
        match cli.command {
            Commands::Sweep { now, yes } => {
                assert!(yes);
                assert_eq!(now.unwrap().to_rfc3339(), "2025-07-01T00:00:00+00:00");
            }
            Commands::Due { .. } => panic!("expected sweep"),
        }
    }

    #[test]
    fn test_sweep_rejects_bad_instant() {
        assert!(Cli::try_parse_from(["madrasa-cli", "sweep", "--now", "yesterday"]).is_err());
    }
}
