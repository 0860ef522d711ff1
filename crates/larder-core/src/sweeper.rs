//! Expiry sweeper: retires lots past their expiry date.
//!
//! Holds on an expired lot are forfeited, not moved to another lot. The
//! affected items fall back to the general pool when they are executed.

use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use larder_db::models::MovementKind;
use larder_db::queries::movements::NewMovement;
use larder_db::queries::{lots as lot_db, reservations as reservation_db};

use crate::business_date;
use crate::error::EngineResult;
use crate::ledger::{self, REASON_EXPIRED};
use crate::quantity::is_significant;

/// A hold removed because its lot expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forfeiture {
    pub item_id: Uuid,
    pub lot_id: i64,
    pub quantity: Decimal,
}

/// Outcome of [`sweep_expired_lots`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub lots_processed: usize,
    pub total_loss: Decimal,
    pub forfeited_reservations: Vec<Forfeiture>,
}

pub async fn sweep_expired_lots(pool: &PgPool, actor: &str) -> EngineResult<SweepReport> {
    sweep_expired_lots_on(pool, actor, business_date()).await
}

/// Archive every lot that expired before `today`.
///
/// In one transaction, for each expired lot in ID order: delete its holds,
/// post a LOSS of its remaining quantity with reason `EXPIRED`, and archive
/// it. A second run on the same day finds nothing to do.
pub async fn sweep_expired_lots_on(
    pool: &PgPool,
    actor: &str,
    today: NaiveDate,
) -> EngineResult<SweepReport> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let expired = lot_db::lock_expired_lots(&mut tx, today).await?;
    let mut report = SweepReport::default();

    for lot in &expired {
        let removed = reservation_db::delete_for_lot(&mut tx, lot.id).await?;
        if !removed.is_empty() {
            let items: Vec<String> = removed
                .iter()
                .map(|r| r.meal_plan_item_id.to_string())
                .collect();
            warn!(
                lot_id = lot.id,
                expiry_date = %lot.expiry_date,
                items = ?items,
                "forfeiting holds on expired lot"
            );
        }
        report
            .forfeited_reservations
            .extend(removed.into_iter().map(|r| Forfeiture {
                item_id: r.meal_plan_item_id,
                lot_id: r.lot_id,
                quantity: r.reserved_qty,
            }));

        if is_significant(lot.quantity) {
            ledger::post_movement(
                &mut tx,
                &NewMovement {
                    kind: MovementKind::Loss,
                    quantity: lot.quantity,
                    lot_id: lot.id,
                    meal_plan_item_id: None,
                    actor,
                    reason: Some(REASON_EXPIRED),
                },
            )
            .await?;
            report.total_loss += lot.quantity;
        }

        lot_db::archive_lot(&mut tx, lot.id).await?;
        report.lots_processed += 1;
    }

    tx.commit().await.context("failed to commit expiry sweep")?;

    if report.lots_processed > 0 {
        info!(
            lots = report.lots_processed,
            total_loss = %report.total_loss,
            forfeited = report.forfeited_reservations.len(),
            "expired lots swept"
        );
    }

    Ok(report)
}

/// Sweep on a fixed interval until `cancel` fires.
///
/// The first sweep runs immediately. A failed sweep is logged and the loop
/// carries on with the next tick.
pub async fn run_periodic_sweeper(
    pool: PgPool,
    actor: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(interval_secs = interval.as_secs(), "periodic sweeper started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = sweep_expired_lots(&pool, &actor).await {
                    error!(error = %e, "expiry sweep failed");
                }
            }
        }
    }

    info!("periodic sweeper stopped");
}
