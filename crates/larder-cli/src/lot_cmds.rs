//! Handlers for `larder lot` subcommands: receipts, stock counts and
//! retirement.

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use larder_core::receiving::{self, Receipt, RetireOutcome};
use larder_db::queries::lots::{self as lot_db, LotFilter};

use crate::LotCommands;
use crate::resolve::{print_json, resolve_product};

pub async fn run_lot_command(
    command: LotCommands,
    pool: &PgPool,
    actor: &str,
    json: bool,
) -> Result<()> {
    match command {
        LotCommands::Receive {
            product,
            batch,
            expiry,
            quantity,
        } => cmd_receive(pool, &product, batch, expiry, quantity, actor, json).await,
        LotCommands::Adjust {
            lot_id,
            quantity,
            reason,
        } => cmd_adjust(pool, lot_id, quantity, reason.as_deref(), actor, json).await,
        LotCommands::Retire { lot_id } => cmd_retire(pool, lot_id).await,
        LotCommands::List { product, all } => cmd_list(pool, product.as_deref(), all, json).await,
    }
}

async fn cmd_receive(
    pool: &PgPool,
    product: &str,
    batch: String,
    expiry: NaiveDate,
    quantity: Decimal,
    actor: &str,
    json: bool,
) -> Result<()> {
    let product = resolve_product(pool, product).await?;
    let outcome = receiving::receive_lot(
        pool,
        &Receipt {
            product_id: product.id,
            batch_number: batch,
            expiry_date: expiry,
            quantity,
        },
        actor,
    )
    .await?;

    if json {
        return print_json(&outcome);
    }
    let verb = if outcome.merged { "Merged into" } else { "Created" };
    println!(
        "{verb} lot {} ({} {}, batch {}, expires {}); now {} {}.",
        outcome.lot.id,
        product.name,
        quantity,
        outcome.lot.batch_number,
        outcome.lot.expiry_date,
        outcome.lot.quantity,
        product.unit,
    );
    Ok(())
}

async fn cmd_adjust(
    pool: &PgPool,
    lot_id: i64,
    quantity: Decimal,
    reason: Option<&str>,
    actor: &str,
    json: bool,
) -> Result<()> {
    let outcome = receiving::adjust_lot(pool, lot_id, quantity, actor, reason).await?;
    if json {
        return print_json(&outcome);
    }
    if outcome.movement_id.is_none() {
        println!("Lot {lot_id} already holds {}; nothing posted.", outcome.lot.quantity);
    } else {
        println!(
            "Lot {lot_id} adjusted by {} to {}.",
            outcome.delta, outcome.lot.quantity
        );
    }
    Ok(())
}

async fn cmd_retire(pool: &PgPool, lot_id: i64) -> Result<()> {
    match receiving::retire_lot(pool, lot_id).await? {
        RetireOutcome::Archived => println!("Lot {lot_id} archived."),
        RetireOutcome::Deleted => println!("Lot {lot_id} deleted (it never moved)."),
    }
    Ok(())
}

async fn cmd_list(pool: &PgPool, product: Option<&str>, all: bool, json: bool) -> Result<()> {
    let product_id = match product {
        Some(p) => Some(resolve_product(pool, p).await?.id),
        None => None,
    };
    let lots = lot_db::list_lots(
        pool,
        &LotFilter {
            product_id,
            include_archived: all,
        },
    )
    .await?;

    if json {
        return print_json(&lots);
    }
    if lots.is_empty() {
        println!("No lots.");
        return Ok(());
    }

    let batch_w = lots.iter().map(|l| l.batch_number.len()).max().unwrap_or(5).max(5);
    println!(
        "{:>8}  {:<36}  {:<batch_w$}  {:<10}  {:>12}  STATE",
        "LOT", "PRODUCT", "BATCH", "EXPIRY", "QUANTITY"
    );
    for l in &lots {
        println!(
            "{:>8}  {:<36}  {:<batch_w$}  {:<10}  {:>12}  {}",
            l.id,
            l.product_id,
            l.batch_number,
            l.expiry_date,
            l.quantity,
            if l.archived { "archived" } else { "open" },
        );
    }
    Ok(())
}
