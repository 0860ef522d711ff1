//! `larder sweep`: write off expired lots once, or periodically until
//! interrupted.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::info;

use larder_core::sweeper::{SweepReport, run_periodic_sweeper, sweep_expired_lots};

use crate::resolve::print_json;

pub async fn run_sweep(pool: &PgPool, actor: &str, every: Option<u64>, json: bool) -> Result<()> {
    match every {
        Some(secs) => run_every(pool, actor, secs).await,
        None => {
            let report = sweep_expired_lots(pool, actor).await?;
            if json {
                return print_json(&report);
            }
            print_report(&report);
            Ok(())
        }
    }
}

fn print_report(report: &SweepReport) {
    if report.lots_processed == 0 {
        println!("No expired lots.");
        return;
    }
    println!(
        "Swept {} expired lots, wrote off {}.",
        report.lots_processed, report.total_loss
    );
    for f in &report.forfeited_reservations {
        println!("  forfeited {} on lot {} held by item {}", f.quantity, f.lot_id, f.item_id);
    }
}

async fn run_every(pool: &PgPool, actor: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        anyhow::bail!("--every must be at least 1 second");
    }

    let cancel = CancellationToken::new();
    let sweeper = tokio::spawn(run_periodic_sweeper(
        pool.clone(),
        actor.to_string(),
        Duration::from_secs(secs),
        cancel.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("interrupt received, stopping sweeper");
    cancel.cancel();

    sweeper.await.context("sweeper task panicked")?;
    Ok(())
}
