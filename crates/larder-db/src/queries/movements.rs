//! Database query functions for the `stock_movements` ledger.
//!
//! The ledger is insert-only. There is deliberately no update or delete
//! function here, and the schema rejects both with a trigger.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{MovementKind, StockMovement};

/// Parameters for appending a ledger entry.
#[derive(Debug, Clone)]
pub struct NewMovement<'a> {
    pub kind: MovementKind,
    /// Positive magnitude, or the signed delta for adjustments.
    pub quantity: Decimal,
    pub lot_id: i64,
    pub meal_plan_item_id: Option<Uuid>,
    pub actor: &'a str,
    pub reason: Option<&'a str>,
}

/// Filter for [`list_movements`].
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub lot_id: Option<i64>,
    pub meal_plan_item_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
}

/// Append a ledger entry. Callers post through the engine's ledger
/// primitive, which also updates the lot in the same transaction.
pub async fn insert_movement(
    conn: &mut PgConnection,
    new: &NewMovement<'_>,
) -> Result<StockMovement> {
    let movement = sqlx::query_as::<_, StockMovement>(
        "INSERT INTO stock_movements (kind, quantity, lot_id, meal_plan_item_id, actor, reason) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(new.kind)
    .bind(new.quantity)
    .bind(new.lot_id)
    .bind(new.meal_plan_item_id)
    .bind(new.actor)
    .bind(new.reason)
    .fetch_one(conn)
    .await
    .with_context(|| {
        format!(
            "failed to record {} movement of {} on lot {}",
            new.kind, new.quantity, new.lot_id
        )
    })?;

    Ok(movement)
}

/// List ledger entries in posting order.
pub async fn list_movements<'e>(
    db: impl PgExecutor<'e>,
    filter: &MovementFilter,
) -> Result<Vec<StockMovement>> {
    let movements = sqlx::query_as::<_, StockMovement>(
        "SELECT * FROM stock_movements \
         WHERE ($1::bigint IS NULL OR lot_id = $1) \
           AND ($2::uuid IS NULL OR meal_plan_item_id = $2) \
           AND ($3::text IS NULL OR kind = $3) \
         ORDER BY id ASC",
    )
    .bind(filter.lot_id)
    .bind(filter.meal_plan_item_id)
    .bind(filter.kind)
    .fetch_all(db)
    .await
    .context("failed to list stock movements")?;

    Ok(movements)
}

/// Net quantity the ledger accounts for on a lot:
/// `Σ in + Σ adjustment − Σ out − Σ loss`.
pub async fn ledger_balance<'e>(db: impl PgExecutor<'e>, lot_id: i64) -> Result<Decimal> {
    let balance: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(CASE kind \
                    WHEN 'in' THEN quantity \
                    WHEN 'adjustment' THEN quantity \
                    ELSE -quantity END), 0) \
         FROM stock_movements WHERE lot_id = $1",
    )
    .bind(lot_id)
    .fetch_one(db)
    .await
    .with_context(|| format!("failed to compute ledger balance for lot {lot_id}"))?;

    Ok(balance)
}

/// Number of ledger entries recorded against a lot.
pub async fn count_for_lot<'e>(db: impl PgExecutor<'e>, lot_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements WHERE lot_id = $1")
        .bind(lot_id)
        .fetch_one(db)
        .await
        .context("failed to count stock movements")?;

    Ok(count)
}
