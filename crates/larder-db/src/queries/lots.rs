//! Database query functions for the `lots` table, including the FEFO
//! availability views shared by reservation, execution and the read API.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::Lot;

/// Sum of holds per lot that still count against availability: the owning
/// plan is confirmed and the item has not been produced. Holds of the item
/// bound at `exclude_param` (a `$n` placeholder or `NULL`) are left out.
fn active_holds_sql(exclude_param: &str) -> String {
    format!(
        "SELECT rv.lot_id, SUM(rv.reserved_qty) AS reserved \
         FROM reservations rv \
         JOIN meal_plan_items mi ON mi.id = rv.meal_plan_item_id \
         JOIN meal_plans mp ON mp.id = mi.meal_plan_id \
         WHERE mp.status = 'confirmed' AND mi.produced_portions IS NULL \
           AND ({exclude_param}::uuid IS NULL OR rv.meal_plan_item_id <> {exclude_param}) \
         GROUP BY rv.lot_id"
    )
}

/// Availability of eligible lots. `$1`/`$2` select the lots, `$3` is the
/// excluded item.
fn eligible_lots_sql(lot_predicate: &str, order_by: &str) -> String {
    format!(
        "SELECT l.id AS lot_id, l.product_id, l.batch_number, l.expiry_date, l.quantity, \
                LEAST(l.quantity, COALESCE(res.reserved, 0)) AS reserved, \
                GREATEST(0, l.quantity - COALESCE(res.reserved, 0)) AS available \
         FROM lots l \
         LEFT JOIN ({holds}) res ON res.lot_id = l.id \
         WHERE {lot_predicate} \
           AND NOT l.archived \
           AND l.expiry_date >= $2 \
           AND l.quantity > 0 \
         ORDER BY {order_by}",
        holds = active_holds_sql("$3"),
    )
}

/// A lot annotated with the quantity still free for allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LotAvailability {
    pub lot_id: i64,
    pub product_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
}

/// Per-product stock totals over eligible lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ProductStockRow {
    pub product_id: Uuid,
    pub name: String,
    pub unit: String,
    pub alert_threshold: Decimal,
    pub on_hand: Decimal,
    pub available: Decimal,
    pub lot_count: i64,
    pub next_expiry: Option<NaiveDate>,
}

/// Filter for [`list_lots`].
#[derive(Debug, Clone, Default)]
pub struct LotFilter {
    pub product_id: Option<Uuid>,
    pub include_archived: bool,
}

/// Insert an empty lot. Stock enters it through an IN movement.
pub async fn insert_lot<'e>(
    db: impl PgExecutor<'e>,
    product_id: Uuid,
    batch_number: &str,
    expiry_date: NaiveDate,
) -> Result<Lot> {
    let lot = sqlx::query_as::<_, Lot>(
        "INSERT INTO lots (product_id, batch_number, expiry_date) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(product_id)
    .bind(batch_number)
    .bind(expiry_date)
    .fetch_one(db)
    .await
    .with_context(|| format!("failed to insert lot {batch_number:?}"))?;

    Ok(lot)
}

/// Fetch a lot by ID.
pub async fn get_lot<'e>(db: impl PgExecutor<'e>, id: i64) -> Result<Option<Lot>> {
    let lot = sqlx::query_as::<_, Lot>("SELECT * FROM lots WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("failed to fetch lot")?;

    Ok(lot)
}

/// Fetch and row-lock a lot by ID.
pub async fn lock_lot(conn: &mut PgConnection, id: i64) -> Result<Option<Lot>> {
    let lot = sqlx::query_as::<_, Lot>("SELECT * FROM lots WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("failed to lock lot")?;

    Ok(lot)
}

/// Find and row-lock the open lot matching a receipt, if any.
pub async fn lock_open_lot_for_receipt(
    conn: &mut PgConnection,
    product_id: Uuid,
    batch_number: &str,
    expiry_date: NaiveDate,
) -> Result<Option<Lot>> {
    let lot = sqlx::query_as::<_, Lot>(
        "SELECT * FROM lots \
         WHERE product_id = $1 AND batch_number = $2 AND expiry_date = $3 AND NOT archived \
         ORDER BY id \
         LIMIT 1 \
         FOR UPDATE",
    )
    .bind(product_id)
    .bind(batch_number)
    .bind(expiry_date)
    .fetch_optional(conn)
    .await
    .context("failed to look up lot for receipt")?;

    Ok(lot)
}

/// List lots in FEFO order.
pub async fn list_lots<'e>(db: impl PgExecutor<'e>, filter: &LotFilter) -> Result<Vec<Lot>> {
    let lots = sqlx::query_as::<_, Lot>(
        "SELECT * FROM lots \
         WHERE ($1::uuid IS NULL OR product_id = $1) \
           AND ($2 OR NOT archived) \
         ORDER BY expiry_date ASC, id ASC",
    )
    .bind(filter.product_id)
    .bind(filter.include_archived)
    .fetch_all(db)
    .await
    .context("failed to list lots")?;

    Ok(lots)
}

/// Row-lock every lot of `product_id` that can still be allocated on
/// `today`, in FEFO order. Returns the locked lot IDs.
///
/// Callers lock products in ascending product ID so that concurrent
/// transactions acquire lot locks in one global order.
pub async fn lock_eligible_lots(
    conn: &mut PgConnection,
    product_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT id FROM lots \
         WHERE product_id = $1 AND NOT archived AND expiry_date >= $2 \
         ORDER BY expiry_date ASC, id ASC \
         FOR UPDATE",
    )
    .bind(product_id)
    .bind(today)
    .fetch_all(conn)
    .await
    .with_context(|| format!("failed to lock lots for product {product_id}"))?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Eligible lots of a product (non-archived, unexpired on `today`, quantity
/// above zero) with their free quantity, in FEFO order.
///
/// Holds belonging to `exclude_item` are not subtracted.
pub async fn eligible_lots<'e>(
    db: impl PgExecutor<'e>,
    product_id: Uuid,
    today: NaiveDate,
    exclude_item: Option<Uuid>,
) -> Result<Vec<LotAvailability>> {
    let sql = eligible_lots_sql("l.product_id = $1", "l.expiry_date ASC, l.id ASC");
    let lots = sqlx::query_as::<_, LotAvailability>(&sql)
        .bind(product_id)
        .bind(today)
        .bind(exclude_item)
        .fetch_all(db)
        .await
        .with_context(|| format!("failed to read availability for product {product_id}"))?;

    Ok(lots)
}

/// Eligible lots for several products at once, grouped by product then FEFO.
pub async fn eligible_lots_for_products<'e>(
    db: impl PgExecutor<'e>,
    product_ids: &[Uuid],
    today: NaiveDate,
) -> Result<Vec<LotAvailability>> {
    let sql = eligible_lots_sql(
        "l.product_id = ANY($1)",
        "l.product_id, l.expiry_date ASC, l.id ASC",
    );
    let lots = sqlx::query_as::<_, LotAvailability>(&sql)
        .bind(product_ids)
        .bind(today)
        .bind(None::<Uuid>)
        .fetch_all(db)
        .await
        .context("failed to read availability for products")?;

    Ok(lots)
}

/// Stock totals for every active product, in one statement.
pub async fn stock_overview<'e>(
    db: impl PgExecutor<'e>,
    today: NaiveDate,
) -> Result<Vec<ProductStockRow>> {
    let sql = format!(
        "SELECT p.id AS product_id, p.name, p.unit, p.alert_threshold, \
                COALESCE(SUM(l.quantity), 0) AS on_hand, \
                COALESCE(SUM(GREATEST(0, l.quantity - COALESCE(res.reserved, 0))), 0) AS available, \
                COUNT(l.id) AS lot_count, \
                MIN(l.expiry_date) AS next_expiry \
         FROM products p \
         LEFT JOIN lots l \
           ON l.product_id = p.id \
          AND NOT l.archived \
          AND l.expiry_date >= $1 \
          AND l.quantity > 0 \
         LEFT JOIN ({holds}) res ON res.lot_id = l.id \
         WHERE p.active \
         GROUP BY p.id, p.name, p.unit, p.alert_threshold \
         ORDER BY p.name",
        holds = active_holds_sql("NULL"),
    );
    let rows = sqlx::query_as::<_, ProductStockRow>(&sql)
        .bind(today)
        .fetch_all(db)
        .await
        .context("failed to read stock overview")?;

    Ok(rows)
}

/// An eligible lot with free stock that expires soon, with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ExpiringLotRow {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub unit_cost: Decimal,
    pub lot_id: i64,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub available: Decimal,
}

/// Lots with free stock expiring between `today` and `today + within_days`
/// inclusive, earliest expiry first, then product name and lot ID.
pub async fn expiring_lots<'e>(
    db: impl PgExecutor<'e>,
    today: NaiveDate,
    within_days: i32,
) -> Result<Vec<ExpiringLotRow>> {
    let sql = format!(
        "SELECT p.id AS product_id, p.name AS product_name, p.unit, p.unit_cost, \
                l.id AS lot_id, l.batch_number, l.expiry_date, \
                GREATEST(0, l.quantity - COALESCE(res.reserved, 0)) AS available \
         FROM lots l \
         JOIN products p ON p.id = l.product_id \
         LEFT JOIN ({holds}) res ON res.lot_id = l.id \
         WHERE NOT l.archived \
           AND l.expiry_date >= $1 \
           AND l.expiry_date <= $1 + $2::int \
           AND l.quantity - COALESCE(res.reserved, 0) > 0 \
         ORDER BY l.expiry_date ASC, p.name ASC, l.id ASC",
        holds = active_holds_sql("NULL"),
    );
    let rows = sqlx::query_as::<_, ExpiringLotRow>(&sql)
        .bind(today)
        .bind(within_days)
        .fetch_all(db)
        .await
        .with_context(|| format!("failed to read lots expiring within {within_days} days"))?;

    Ok(rows)
}

/// Sum of holds that currently count against a lot.
pub async fn held_quantity<'e>(db: impl PgExecutor<'e>, lot_id: i64) -> Result<Decimal> {
    let held: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(rv.reserved_qty), 0) \
         FROM reservations rv \
         JOIN meal_plan_items mi ON mi.id = rv.meal_plan_item_id \
         JOIN meal_plans mp ON mp.id = mi.meal_plan_id \
         WHERE rv.lot_id = $1 \
           AND mp.status = 'confirmed' \
           AND mi.produced_portions IS NULL",
    )
    .bind(lot_id)
    .fetch_one(db)
    .await
    .context("failed to sum holds for lot")?;

    Ok(held)
}

/// Row-lock every non-archived lot that expired before `today`, by ID.
pub async fn lock_expired_lots(conn: &mut PgConnection, today: NaiveDate) -> Result<Vec<Lot>> {
    let lots = sqlx::query_as::<_, Lot>(
        "SELECT * FROM lots \
         WHERE NOT archived AND expiry_date < $1 \
         ORDER BY id ASC \
         FOR UPDATE",
    )
    .bind(today)
    .fetch_all(conn)
    .await
    .context("failed to lock expired lots")?;

    Ok(lots)
}

/// Row-lock the lots on which `item_id` still holds stock that can no longer
/// be used (archived, or expired on `today`), by ID.
pub async fn lock_stale_lots_for_item(
    conn: &mut PgConnection,
    item_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT l.id FROM lots l \
         WHERE l.id IN (SELECT rv.lot_id FROM reservations rv WHERE rv.meal_plan_item_id = $1) \
           AND (l.archived OR l.expiry_date < $2) \
         ORDER BY l.id ASC \
         FOR UPDATE",
    )
    .bind(item_id)
    .bind(today)
    .fetch_all(conn)
    .await
    .context("failed to lock stale lots for item")?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Apply a signed delta to a lot's quantity.
///
/// Returns the new quantity, or `None` when the lot does not exist or the
/// delta would take the quantity below zero (the row is left untouched).
/// Only the ledger posting path calls this.
pub async fn apply_quantity_delta(
    conn: &mut PgConnection,
    lot_id: i64,
    delta: Decimal,
) -> Result<Option<Decimal>> {
    let quantity: Option<Decimal> = sqlx::query_scalar(
        "UPDATE lots SET quantity = quantity + $2 \
         WHERE id = $1 AND quantity + $2 >= 0 \
         RETURNING quantity",
    )
    .bind(lot_id)
    .bind(delta)
    .fetch_optional(conn)
    .await
    .context("failed to update lot quantity")?;

    Ok(quantity)
}

/// Mark a lot archived so it is never allocated again.
pub async fn archive_lot(conn: &mut PgConnection, lot_id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE lots SET archived = TRUE WHERE id = $1")
        .bind(lot_id)
        .execute(conn)
        .await
        .context("failed to archive lot")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("lot {lot_id} not found");
    }

    Ok(())
}

/// Delete a lot outright. Only valid for lots without ledger history.
pub async fn delete_lot(conn: &mut PgConnection, lot_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM lots WHERE id = $1")
        .bind(lot_id)
        .execute(conn)
        .await
        .with_context(|| format!("failed to delete lot {lot_id}"))?;

    Ok(result.rows_affected())
}
