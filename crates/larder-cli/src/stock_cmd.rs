//! `larder stock`: free stock per product, per lot for one product, or the
//! stock about to expire.

use anyhow::Result;
use sqlx::PgPool;

use larder_core::stock;

use crate::resolve::{print_json, resolve_product};

pub async fn run_stock(
    pool: &PgPool,
    product: Option<&str>,
    expiring: Option<i32>,
    json: bool,
) -> Result<()> {
    match (product, expiring) {
        (_, Some(days)) => run_expiring(pool, days, json).await,
        (Some(p), None) => run_product_stock(pool, p, json).await,
        (None, None) => run_overview(pool, json).await,
    }
}

async fn run_expiring(pool: &PgPool, days: i32, json: bool) -> Result<()> {
    let report = stock::get_expiring_stock(pool, days).await?;
    if json {
        return print_json(&report);
    }
    if report.products.is_empty() {
        println!("No free stock expires within {days} days.");
        return Ok(());
    }

    let name_w = report
        .products
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(7)
        .max(7);
    println!(
        "{:<name_w$}  {:>12}  {:>10}  {:<10}  {:>4}",
        "PRODUCT", "AVAILABLE", "VALUE", "EXPIRES", "DAYS"
    );
    for p in &report.products {
        println!(
            "{:<name_w$}  {:>12}  {:>10}  {:<10}  {:>4}{}",
            p.name,
            format!("{} {}", p.total_available, p.unit),
            p.total_value,
            p.earliest_expiry,
            p.days_until_expiry,
            if p.days_until_expiry <= stock::CRITICAL_WITHIN_DAYS {
                "  CRITICAL"
            } else {
                ""
            },
        );
        for l in &p.lots {
            println!(
                "  lot {:<6} {:<12} {} ({} days)  {}",
                l.lot_id, l.batch_number, l.expiry_date, l.days_until_expiry, l.available
            );
        }
    }
    println!();
    println!(
        "{} product(s), {} critical, value at risk {}",
        report.products.len(),
        report.critical_count,
        report.total_value
    );
    Ok(())
}

async fn run_overview(pool: &PgPool, json: bool) -> Result<()> {
    let lines = stock::get_stock_overview(pool).await?;
    if json {
        return print_json(&lines);
    }
    if lines.is_empty() {
        println!("No active products.");
        return Ok(());
    }

    let name_w = lines.iter().map(|l| l.name.len()).max().unwrap_or(7).max(7);
    println!(
        "{:<name_w$}  {:>12}  {:>12}  {:>12}  {:>4}  {:<10}",
        "PRODUCT", "ON HAND", "RESERVED", "AVAILABLE", "LOTS", "NEXT EXP"
    );
    for l in &lines {
        let next = l
            .next_expiry
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<name_w$}  {:>12}  {:>12}  {:>12}  {:>4}  {:<10}{}",
            l.name,
            l.on_hand,
            l.reserved,
            l.available,
            l.lot_count,
            next,
            if l.low { "  LOW" } else { "" },
        );
    }
    Ok(())
}

async fn run_product_stock(pool: &PgPool, input: &str, json: bool) -> Result<()> {
    let product = resolve_product(pool, input).await?;
    let stock = stock::get_available_stock(pool, product.id).await?;
    if json {
        return print_json(&stock);
    }

    println!("{} ({})", product.name, product.unit);
    println!(
        "  on hand {}  reserved {}  available {}",
        stock.on_hand, stock.reserved, stock.available
    );
    if stock.lots.is_empty() {
        return Ok(());
    }
    println!();
    println!(
        "{:>8}  {:<12}  {:<10}  {:>12}  {:>12}",
        "LOT", "BATCH", "EXPIRY", "QUANTITY", "AVAILABLE"
    );
    for l in &stock.lots {
        println!(
            "{:>8}  {:<12}  {:<10}  {:>12}  {:>12}",
            l.lot_id, l.batch_number, l.expiry_date, l.quantity, l.available
        );
    }
    Ok(())
}
