//! `larder execute`: record production of a plan item.

use anyhow::Result;
use sqlx::PgPool;

use larder_core::execution::{ConsumptionSource, execute_item};

use crate::resolve::{parse_id, print_json};

pub async fn run_execute(
    pool: &PgPool,
    item_id: &str,
    portions: i32,
    actor: &str,
    json: bool,
) -> Result<()> {
    let item_id = parse_id("item", item_id)?;
    let report = execute_item(pool, item_id, portions, actor).await?;
    if json {
        return print_json(&report);
    }

    println!(
        "Item {item_id}: {} portions produced, {} consumed.",
        report.produced_portions,
        report.total_consumed()
    );
    for line in &report.consumed {
        let source = match line.source {
            ConsumptionSource::Hold => "hold",
            ConsumptionSource::Pool => "pool",
        };
        println!("  lot {:>8}  {:>12}  from {source}", line.lot_id, line.quantity);
    }
    if !report.stale_released.is_zero() {
        println!("  dropped {} held on expired lots", report.stale_released);
    }
    if !report.released.is_zero() {
        println!("  released {} unused", report.released);
    }
    if report.plan_executed {
        println!("Plan {} is now executed.", report.plan_id);
    }
    Ok(())
}
