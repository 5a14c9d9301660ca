//! Migration CLI.
//!
//! Usage:
//!   cargo run --bin migrate -- status
//!   cargo run --bin migrate -- up [target_version]
//!   cargo run --bin migrate -- down <target_version>
//!   cargo run --bin migrate -- dry-run

use anyhow::{Context, Result};
use paygate::config::Config;
use paygate::db::Database;
use paygate::migration::{MigrationConfig, MigrationResult, Runner};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("status");

    let config = Config::load().context("configuration invalid")?;
    let db = Database::connect(&config.dsn())
        .await
        .context("database connection failed")?;

    let mut migration_config = MigrationConfig::cli();
    if command == "dry-run" {
        migration_config.dry_run = true;
        migration_config.require_down_files = false;
    }
    let runner = Runner::new(db.pool().clone(), migration_config);

    match command {
        "status" => {
            runner.initialize().await?;
            let status = runner.status().await?;
            println!("Migration status");
            println!("  current version : {}", status.current_version);
            println!("  total           : {}", status.total_count);
            println!("  applied         : {}", status.applied_count);
            println!("  pending         : {}", status.pending_count);
            println!("  health          : {:?}", status.system_health);
            if let Some(at) = status.last_applied_at {
                println!("  last applied at : {}", at.to_rfc3339());
            }
        }
        "up" | "dry-run" => {
            let target = args
                .get(2)
                .map(|v| v.parse::<i64>().context("target version must be a number"))
                .transpose()?
                .unwrap_or(0);

            let results = runner.run_up(target).await?;
            report(&results);
        }
        "down" => {
            let target = args
                .get(2)
                .context("usage: migrate down <target_version>")?
                .parse::<i64>()
                .context("target version must be a number")?;

            let results = runner.run_down(target).await?;
            report(&results);
        }
        other => {
            anyhow::bail!("unknown command '{other}'. Commands: status, up, down, dry-run");
        }
    }

    db.close().await;
    Ok(())
}

fn report(results: &[MigrationResult]) {
    if results.is_empty() {
        println!("Nothing to do.");
        return;
    }

    for result in results {
        if result.success {
            println!(
                "  OK   {} {} ({} statements, {} ms)",
                result.version, result.name, result.sql_statements, result.execution_time_ms
            );
        } else {
            println!(
                "  FAIL {} {} - {}",
                result.version,
                result.name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        println!("{failed} migration(s) failed.");
        std::process::exit(1);
    }
}
