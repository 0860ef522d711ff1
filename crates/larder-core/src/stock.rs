//! Read-only stock and availability queries.
//!
//! Nothing here takes row locks. Each figure comes from a single statement,
//! so a result reflects one consistent snapshot.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use larder_db::queries::{lots, products};

use crate::business_date;
use crate::error::{EngineError, EngineResult};
use crate::quantity::quantize;

/// Products whose earliest at-risk lot expires within this many days are
/// critical.
pub const CRITICAL_WITHIN_DAYS: i64 = 1;

/// Free quantity of one eligible lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotStock {
    pub lot_id: i64,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: Decimal,
    pub available: Decimal,
}

/// Availability of one product over its eligible lots, FEFO ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStock {
    pub product_id: Uuid,
    pub on_hand: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
    pub lots: Vec<LotStock>,
}

/// One row of the stock overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit: String,
    pub on_hand: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
    pub lot_count: i64,
    pub next_expiry: Option<NaiveDate>,
    /// Available stock has dropped below the product's alert threshold.
    pub low: bool,
}

/// Free stock of one lot that expires soon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringLot {
    pub lot_id: i64,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub days_until_expiry: i64,
    pub available: Decimal,
}

/// A product with free stock at risk of expiring, lots FEFO ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringProduct {
    pub product_id: Uuid,
    pub name: String,
    pub unit: String,
    pub total_available: Decimal,
    /// `total_available × unit_cost`, 2 decimals.
    pub total_value: Decimal,
    pub earliest_expiry: NaiveDate,
    pub days_until_expiry: i64,
    pub lots: Vec<ExpiringLot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringStock {
    pub within_days: i32,
    pub critical_count: usize,
    pub total_value: Decimal,
    /// Earliest expiry first.
    pub products: Vec<ExpiringProduct>,
}

pub async fn get_available_stock(pool: &PgPool, product_id: Uuid) -> EngineResult<ProductStock> {
    get_available_stock_on(pool, product_id, business_date()).await
}

/// Availability of `product_id` as of `today`.
///
/// Only non-archived lots with `expiry_date >= today` and a positive
/// quantity count. Holds of confirmed plans whose item has not been
/// produced are subtracted lot by lot.
pub async fn get_available_stock_on(
    pool: &PgPool,
    product_id: Uuid,
    today: NaiveDate,
) -> EngineResult<ProductStock> {
    let rows = lots::eligible_lots(pool, product_id, today, None).await?;

    if rows.is_empty() && products::get_product(pool, product_id).await?.is_none() {
        return Err(EngineError::not_found("product", product_id));
    }

    let on_hand: Decimal = rows.iter().map(|r| r.quantity).sum();
    let available: Decimal = rows.iter().map(|r| r.available).sum();

    Ok(ProductStock {
        product_id,
        on_hand,
        reserved: on_hand - available,
        available,
        lots: rows
            .into_iter()
            .map(|r| LotStock {
                lot_id: r.lot_id,
                batch_number: r.batch_number,
                expiry_date: r.expiry_date,
                quantity: r.quantity,
                available: r.available,
            })
            .collect(),
    })
}

pub async fn get_stock_overview(pool: &PgPool) -> EngineResult<Vec<StockLine>> {
    get_stock_overview_on(pool, business_date()).await
}

/// Stock totals for every active product, ordered by name.
pub async fn get_stock_overview_on(pool: &PgPool, today: NaiveDate) -> EngineResult<Vec<StockLine>> {
    let rows = lots::stock_overview(pool, today).await?;

    Ok(rows
        .into_iter()
        .map(|r| StockLine {
            low: r.available < r.alert_threshold,
            reserved: r.on_hand - r.available,
            product_id: r.product_id,
            name: r.name,
            unit: r.unit,
            on_hand: r.on_hand,
            available: r.available,
            lot_count: r.lot_count,
            next_expiry: r.next_expiry,
        })
        .collect())
}

pub async fn get_expiring_stock(pool: &PgPool, within_days: i32) -> EngineResult<ExpiringStock> {
    get_expiring_stock_on(pool, within_days, business_date()).await
}

/// Free stock expiring between `today` and `today + within_days`, grouped
/// by product.
pub async fn get_expiring_stock_on(
    pool: &PgPool,
    within_days: i32,
    today: NaiveDate,
) -> EngineResult<ExpiringStock> {
    if within_days < 0 {
        return Err(EngineError::InvalidInput(format!(
            "expiry horizon must not be negative (got {within_days} days)"
        )));
    }

    let rows = lots::expiring_lots(pool, today, within_days).await?;

    let mut products: Vec<ExpiringProduct> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for row in rows {
        let days = (row.expiry_date - today).num_days();
        let value = row.available * row.unit_cost;
        let at = *index.entry(row.product_id).or_insert_with(|| {
            products.push(ExpiringProduct {
                product_id: row.product_id,
                name: row.product_name.clone(),
                unit: row.unit.clone(),
                total_available: Decimal::ZERO,
                total_value: Decimal::ZERO,
                earliest_expiry: row.expiry_date,
                days_until_expiry: days,
                lots: Vec::new(),
            });
            products.len() - 1
        });

        let product = &mut products[at];
        product.total_available += row.available;
        product.total_value += value;
        product.lots.push(ExpiringLot {
            lot_id: row.lot_id,
            batch_number: row.batch_number,
            expiry_date: row.expiry_date,
            days_until_expiry: days,
            available: row.available,
        });
    }

    for product in &mut products {
        product.total_available = quantize(product.total_available);
        product.total_value = product
            .total_value
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    }

    Ok(ExpiringStock {
        within_days,
        critical_count: products
            .iter()
            .filter(|p| p.days_until_expiry <= CRITICAL_WITHIN_DAYS)
            .count(),
        total_value: products.iter().map(|p| p.total_value).sum(),
        products,
    })
}
