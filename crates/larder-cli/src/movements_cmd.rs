//! `larder movements`: read the stock ledger.

use anyhow::Result;
use sqlx::PgPool;

use larder_db::models::MovementKind;
use larder_db::queries::movements::{self as movement_db, MovementFilter};

use crate::resolve::{parse_id, print_json};

pub async fn run_movements(
    pool: &PgPool,
    lot: Option<i64>,
    item: Option<&str>,
    kind: Option<MovementKind>,
    json: bool,
) -> Result<()> {
    let meal_plan_item_id = item.map(|i| parse_id("item", i)).transpose()?;
    let movements = movement_db::list_movements(
        pool,
        &MovementFilter {
            lot_id: lot,
            meal_plan_item_id,
            kind,
        },
    )
    .await?;

    if json {
        return print_json(&movements);
    }
    if movements.is_empty() {
        println!("No movements.");
        return Ok(());
    }

    println!(
        "{:>8}  {:<16}  {:<10}  {:>8}  {:>12}  {:<12}  REASON",
        "ID", "AT", "KIND", "LOT", "QUANTITY", "ACTOR"
    );
    for m in &movements {
        println!(
            "{:>8}  {:<16}  {:<10}  {:>8}  {:>12}  {:<12}  {}",
            m.id,
            m.moved_at.format("%Y-%m-%d %H:%M").to_string(),
            m.kind.to_string(),
            m.lot_id,
            m.quantity,
            m.actor,
            m.reason.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}
