//! Handlers for `larder product` subcommands.

use anyhow::{Result, bail};
use rust_decimal::Decimal;
use sqlx::PgPool;

use larder_db::queries::products::{self as product_db, NewProduct};

use crate::ProductCommands;
use crate::resolve::{print_json, resolve_product};

pub async fn run_product_command(command: ProductCommands, pool: &PgPool, json: bool) -> Result<()> {
    match command {
        ProductCommands::Add {
            name,
            unit,
            unit_cost,
            alert_threshold,
        } => cmd_add(pool, &name, &unit, unit_cost, alert_threshold, json).await,
        ProductCommands::List => cmd_list(pool, json).await,
        ProductCommands::Deactivate { product } => cmd_deactivate(pool, &product).await,
    }
}

async fn cmd_add(
    pool: &PgPool,
    name: &str,
    unit: &str,
    unit_cost: Decimal,
    alert_threshold: Decimal,
    json: bool,
) -> Result<()> {
    if name.trim().is_empty() || unit.trim().is_empty() {
        bail!("product name and unit must not be empty");
    }
    if unit_cost < Decimal::ZERO || alert_threshold < Decimal::ZERO {
        bail!("unit cost and alert threshold must not be negative");
    }

    let product = product_db::insert_product(
        pool,
        &NewProduct {
            name: name.trim(),
            unit: unit.trim(),
            unit_cost,
            alert_threshold,
        },
    )
    .await?;

    if json {
        return print_json(&product);
    }
    println!("Product created.");
    println!("  ID:    {}", product.id);
    println!("  Name:  {}", product.name);
    println!("  Unit:  {}", product.unit);
    Ok(())
}

async fn cmd_list(pool: &PgPool, json: bool) -> Result<()> {
    let products = product_db::list_products(pool).await?;
    if json {
        return print_json(&products);
    }
    if products.is_empty() {
        println!("No products. Use `larder product add` to create one.");
        return Ok(());
    }

    let name_w = products.iter().map(|p| p.name.len()).max().unwrap_or(4).max(4);
    println!(
        "{:<36}  {:<name_w$}  {:<6}  {:>10}  {:>10}  ACTIVE",
        "ID", "NAME", "UNIT", "COST", "ALERT"
    );
    for p in &products {
        println!(
            "{:<36}  {:<name_w$}  {:<6}  {:>10}  {:>10}  {}",
            p.id,
            p.name,
            p.unit,
            p.unit_cost,
            p.alert_threshold,
            if p.active { "yes" } else { "no" },
        );
    }
    Ok(())
}

async fn cmd_deactivate(pool: &PgPool, input: &str) -> Result<()> {
    let product = resolve_product(pool, input).await?;
    product_db::set_product_active(pool, product.id, false).await?;
    println!("Product {} deactivated.", product.name);
    Ok(())
}
