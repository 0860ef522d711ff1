//! Database query functions for the `reservations` table.
//!
//! A reservation is a soft hold of stock against one lot for one meal plan
//! item. Rows are created at plan confirmation and removed at execution or
//! expiry.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::Reservation;

/// A hold joined with its lot's FEFO keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct HeldLot {
    pub reservation_id: i64,
    pub lot_id: i64,
    pub expiry_date: NaiveDate,
    pub reserved_qty: Decimal,
    pub lot_quantity: Decimal,
}

/// A removed hold, as reported by bulk deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RemovedHold {
    pub meal_plan_item_id: Uuid,
    pub lot_id: i64,
    pub reserved_qty: Decimal,
}

/// Insert a hold.
pub async fn insert_reservation<'e>(
    db: impl PgExecutor<'e>,
    item_id: Uuid,
    lot_id: i64,
    reserved_qty: Decimal,
) -> Result<Reservation> {
    let reservation = sqlx::query_as::<_, Reservation>(
        "INSERT INTO reservations (meal_plan_item_id, lot_id, reserved_qty) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(item_id)
    .bind(lot_id)
    .bind(reserved_qty)
    .fetch_one(db)
    .await
    .with_context(|| format!("failed to reserve {reserved_qty} on lot {lot_id}"))?;

    Ok(reservation)
}

/// List all holds of an item, by ID.
pub async fn list_for_item<'e>(db: impl PgExecutor<'e>, item_id: Uuid) -> Result<Vec<Reservation>> {
    let rows = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE meal_plan_item_id = $1 ORDER BY id",
    )
    .bind(item_id)
    .fetch_all(db)
    .await
    .context("failed to list reservations for item")?;

    Ok(rows)
}

/// Row-lock the holds an item has on usable lots of one product, in FEFO
/// order of their lots.
pub async fn lock_item_holds_for_product(
    conn: &mut PgConnection,
    item_id: Uuid,
    product_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<HeldLot>> {
    let rows = sqlx::query_as::<_, HeldLot>(
        "SELECT rv.id AS reservation_id, rv.lot_id, l.expiry_date, rv.reserved_qty, \
                l.quantity AS lot_quantity \
         FROM reservations rv \
         JOIN lots l ON l.id = rv.lot_id \
         WHERE rv.meal_plan_item_id = $1 \
           AND l.product_id = $2 \
           AND NOT l.archived \
           AND l.expiry_date >= $3 \
         ORDER BY l.expiry_date ASC, l.id ASC, rv.id ASC \
         FOR UPDATE OF rv",
    )
    .bind(item_id)
    .bind(product_id)
    .bind(today)
    .fetch_all(conn)
    .await
    .context("failed to lock item holds")?;

    Ok(rows)
}

/// Reduce a hold by `by`. The hold never drops below zero; returns the
/// remaining quantity or `None` if the hold is gone or too small.
pub async fn decrement_reservation(
    conn: &mut PgConnection,
    reservation_id: i64,
    by: Decimal,
) -> Result<Option<Decimal>> {
    let remaining: Option<Decimal> = sqlx::query_scalar(
        "UPDATE reservations SET reserved_qty = reserved_qty - $2 \
         WHERE id = $1 AND reserved_qty - $2 >= 0 \
         RETURNING reserved_qty",
    )
    .bind(reservation_id)
    .bind(by)
    .fetch_optional(conn)
    .await
    .context("failed to decrement reservation")?;

    Ok(remaining)
}

/// Delete every hold of an item. Returns the quantity released.
pub async fn delete_for_item(conn: &mut PgConnection, item_id: Uuid) -> Result<Decimal> {
    let released: Option<Decimal> = sqlx::query_scalar(
        "WITH gone AS ( \
             DELETE FROM reservations WHERE meal_plan_item_id = $1 RETURNING reserved_qty \
         ) \
         SELECT SUM(reserved_qty) FROM gone",
    )
    .bind(item_id)
    .fetch_one(conn)
    .await
    .context("failed to release item reservations")?;

    Ok(released.unwrap_or(Decimal::ZERO))
}

/// Delete the holds of an item that sit on expired or archived lots.
pub async fn delete_stale_for_item(
    conn: &mut PgConnection,
    item_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<RemovedHold>> {
    let rows = sqlx::query_as::<_, RemovedHold>(
        "DELETE FROM reservations rv \
         USING lots l \
         WHERE l.id = rv.lot_id \
           AND rv.meal_plan_item_id = $1 \
           AND (l.archived OR l.expiry_date < $2) \
         RETURNING rv.meal_plan_item_id, rv.lot_id, rv.reserved_qty",
    )
    .bind(item_id)
    .bind(today)
    .fetch_all(conn)
    .await
    .context("failed to drop stale reservations")?;

    Ok(rows)
}

/// Delete every hold on a lot, returning what was removed.
pub async fn delete_for_lot(conn: &mut PgConnection, lot_id: i64) -> Result<Vec<RemovedHold>> {
    let rows = sqlx::query_as::<_, RemovedHold>(
        "DELETE FROM reservations WHERE lot_id = $1 \
         RETURNING meal_plan_item_id, lot_id, reserved_qty",
    )
    .bind(lot_id)
    .fetch_all(conn)
    .await
    .with_context(|| format!("failed to forfeit reservations on lot {lot_id}"))?;

    Ok(rows)
}

/// Sum of all holds on a lot, regardless of plan state.
pub async fn total_for_lot<'e>(db: impl PgExecutor<'e>, lot_id: i64) -> Result<Decimal> {
    let total: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(reserved_qty), 0) FROM reservations WHERE lot_id = $1",
    )
    .bind(lot_id)
    .fetch_one(db)
    .await
    .context("failed to sum reservations for lot")?;

    Ok(total)
}

/// Number of holds on a lot, regardless of plan state.
pub async fn count_for_lot<'e>(db: impl PgExecutor<'e>, lot_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE lot_id = $1")
        .bind(lot_id)
        .fetch_one(db)
        .await
        .context("failed to count reservations for lot")?;

    Ok(count)
}
