//! Database query functions for the `products` table.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Product;

/// Parameters for inserting a new product.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub unit: &'a str,
    pub unit_cost: Decimal,
    pub alert_threshold: Decimal,
}

/// Insert a new product. Returns the inserted row.
pub async fn insert_product<'e>(db: impl PgExecutor<'e>, new: &NewProduct<'_>) -> Result<Product> {
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (name, unit, unit_cost, alert_threshold) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(new.name)
    .bind(new.unit)
    .bind(new.unit_cost)
    .bind(new.alert_threshold)
    .fetch_one(db)
    .await
    .with_context(|| format!("failed to insert product {:?}", new.name))?;

    Ok(product)
}

/// Fetch a product by its ID.
pub async fn get_product<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("failed to fetch product")?;

    Ok(product)
}

/// Fetch a product by its unique name.
pub async fn get_product_by_name<'e>(
    db: impl PgExecutor<'e>,
    name: &str,
) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE name = $1")
        .bind(name)
        .fetch_optional(db)
        .await
        .with_context(|| format!("failed to fetch product {name:?}"))?;

    Ok(product)
}

/// List all products ordered by name.
pub async fn list_products<'e>(db: impl PgExecutor<'e>) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY name")
        .fetch_all(db)
        .await
        .context("failed to list products")?;

    Ok(products)
}

/// Activate or deactivate a product. Inactive products are hidden from the
/// stock overview but keep their history.
pub async fn set_product_active<'e>(db: impl PgExecutor<'e>, id: Uuid, active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE products SET active = $1 WHERE id = $2")
        .bind(active)
        .bind(id)
        .execute(db)
        .await
        .context("failed to update product")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("product {id} not found");
    }

    Ok(())
}
