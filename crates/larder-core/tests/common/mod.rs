//! Fixtures shared by the engine integration tests.
#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use larder_core::plan::{self, NewItem, NewPlan, PlanDetail};
use larder_core::receiving::{self, Receipt};
use larder_db::queries::products::{self, NewProduct};
use larder_db::queries::{lots, movements, recipes, reservations};

pub const ACTOR: &str = "chef";

/// Fixed business date used by the `*_on` entry points.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
}

pub fn day(offset: i64) -> NaiveDate {
    today() + Duration::days(offset)
}

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal")
}

pub async fn product(pool: &PgPool, name: &str) -> Uuid {
    products::insert_product(
        pool,
        &NewProduct {
            name,
            unit: "kg",
            unit_cost: dec("2.40"),
            alert_threshold: dec("1"),
        },
    )
    .await
    .expect("insert product")
    .id
}

/// Receive `qty` into a new lot expiring `expires_in` days after [`today`].
pub async fn lot(pool: &PgPool, product_id: Uuid, batch: &str, expires_in: i64, qty: &str) -> i64 {
    receiving::receive_lot(
        pool,
        &Receipt {
            product_id,
            batch_number: batch.to_owned(),
            expiry_date: day(expires_in),
            quantity: dec(qty),
        },
        ACTOR,
    )
    .await
    .expect("receive lot")
    .lot
    .id
}

/// A one-portion recipe with the given `(product, qty_per_portion)` lines.
pub async fn recipe(pool: &PgPool, name: &str, waste_rate: &str, lines: &[(Uuid, &str)]) -> Uuid {
    let recipe = recipes::insert_recipe(pool, name, 1, dec(waste_rate))
        .await
        .expect("insert recipe");
    for (product_id, qty) in lines {
        recipes::insert_ingredient(pool, recipe.id, *product_id, dec(qty))
            .await
            .expect("insert ingredient");
    }
    recipe.id
}

/// A draft plan over the first week with the given `(recipe, portions)` items.
pub async fn draft_plan(pool: &PgPool, items: &[(Uuid, i32)]) -> PlanDetail {
    plan::create_plan(
        pool,
        &NewPlan {
            name: format!("plan-{}", Uuid::new_v4().simple()),
            period_start: today(),
            period_end: day(6),
            items: items
                .iter()
                .map(|&(recipe_id, planned_portions)| NewItem {
                    recipe_id,
                    planned_portions,
                })
                .collect(),
        },
    )
    .await
    .expect("create plan")
}

pub async fn lot_quantity(pool: &PgPool, lot_id: i64) -> Decimal {
    lots::get_lot(pool, lot_id)
        .await
        .unwrap()
        .expect("lot exists")
        .quantity
}

/// Sum of every hold on a lot.
pub async fn held(pool: &PgPool, lot_id: i64) -> Decimal {
    reservations::total_for_lot(pool, lot_id).await.unwrap()
}

/// Every lot's quantity equals the net of its movements, and no lot carries
/// more holds than stock.
pub async fn assert_ledger_consistent(pool: &PgPool) {
    let all = lots::list_lots(
        pool,
        &lots::LotFilter {
            product_id: None,
            include_archived: true,
        },
    )
    .await
    .unwrap();
    for lot in all {
        let balance = movements::ledger_balance(pool, lot.id).await.unwrap();
        assert_eq!(lot.quantity, balance, "lot {} drifted from its ledger", lot.id);
        let holds = reservations::total_for_lot(pool, lot.id).await.unwrap();
        assert!(holds <= lot.quantity, "lot {} over-reserved: {holds} > {}", lot.id, lot.quantity);
    }
}
