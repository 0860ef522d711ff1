//! Read-only what-if analysis: would a set of needs be covered by current
//! stock, which lots would FEFO draw from, and how urgent is that stock.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use larder_db::queries::lots as lot_db;

use crate::allocation::{Candidate, allocate_fefo};
use crate::business_date;
use larder_db::models::PlanStatus;

use crate::error::{EngineError, EngineResult};
use crate::need::{IngredientNeed, waste_factor};
use crate::quantity::{is_significant, quantize};
use crate::plan::get_plan_detail;
use crate::recipe::{get_recipe_detail, recipe_needs};

/// Lots expiring within this many days count as urgent.
pub const URGENT_WITHIN_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatedLot {
    pub lot_id: i64,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: Decimal,
    pub expiry_date: NaiveDate,
    pub days_until_expiry: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortage {
    pub product_id: Uuid,
    pub product_name: String,
    pub needed: Decimal,
    pub available: Decimal,
    pub deficit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Simulation {
    pub feasible: bool,
    pub lots_used: Vec<SimulatedLot>,
    /// Higher when the needs would use stock close to expiry; 2 decimals.
    pub urgency_score: Decimal,
    /// Ingredients drawing on at least one lot that expires within
    /// [`URGENT_WITHIN_DAYS`].
    pub urgent_ingredients: usize,
    pub shortages: Vec<Shortage>,
}

/// One draft item simulated on its own against current free stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSimulation {
    pub item_id: Uuid,
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub portions: i32,
    pub simulation: Simulation,
}

/// What-if of confirming a draft plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSimulation {
    pub plan_id: Uuid,
    /// Every item fits with all items drawing on the same stock.
    pub all_feasible: bool,
    pub items: Vec<ItemSimulation>,
    /// All items' needs summed per product.
    pub combined: Simulation,
}

/// How many portions of a recipe current stock allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaxPortions {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub max_portions: i64,
    pub limiting: Option<LimitingIngredient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitingIngredient {
    pub product_id: Uuid,
    pub product_name: String,
    pub available: Decimal,
    pub qty_per_portion: Decimal,
}

/// Score `needs` against candidate lots grouped by product.
///
/// Needs naming the same product are merged first, so stock is never
/// counted twice. Each covered ingredient contributes
/// `Σ (take / need) × 100 / (days_until_expiry + 1)` over its FEFO takes;
/// the total is averaged over all ingredients. Uncovered ingredients
/// contribute nothing and are reported as shortages.
pub fn score_needs(
    needs: &[IngredientNeed],
    lots_by_product: &HashMap<Uuid, Vec<Candidate>>,
    today: NaiveDate,
) -> Simulation {
    let mut lots_used = Vec::new();
    let mut shortages = Vec::new();
    let mut total = Decimal::ZERO;
    let mut urgent_ingredients = 0;

    let mut merged: BTreeMap<Uuid, IngredientNeed> = BTreeMap::new();
    for need in needs {
        merged
            .entry(need.product_id)
            .and_modify(|n| n.quantity += need.quantity)
            .or_insert_with(|| need.clone());
    }
    let needs: Vec<IngredientNeed> = merged
        .into_values()
        .map(|mut n| {
            n.quantity = quantize(n.quantity);
            n
        })
        .collect();

    for need in &needs {
        if !is_significant(need.quantity) {
            continue;
        }
        let candidates = lots_by_product
            .get(&need.product_id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let allocation = allocate_fefo(need.quantity, candidates);
        if !allocation.is_complete() {
            let available: Decimal = candidates.iter().map(|c| c.available).sum();
            shortages.push(Shortage {
                product_id: need.product_id,
                product_name: need.product_name.clone(),
                needed: need.quantity,
                available: quantize(available),
                deficit: quantize(need.quantity - available),
            });
            continue;
        }

        let mut urgent = false;
        for take in allocation.takes {
            let days = (take.expiry_date - today).num_days().max(0);
            total += take.quantity / need.quantity * Decimal::ONE_HUNDRED
                / Decimal::from(days + 1);
            urgent |= days <= URGENT_WITHIN_DAYS;
            lots_used.push(SimulatedLot {
                lot_id: take.lot_id,
                product_id: need.product_id,
                product_name: need.product_name.clone(),
                quantity: take.quantity,
                expiry_date: take.expiry_date,
                days_until_expiry: days,
            });
        }
        if urgent {
            urgent_ingredients += 1;
        }
    }

    let urgency_score = if needs.is_empty() {
        Decimal::ZERO
    } else {
        (total / Decimal::from(needs.len()))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    };

    Simulation {
        feasible: shortages.is_empty(),
        lots_used,
        urgency_score,
        urgent_ingredients,
        shortages,
    }
}

/// Largest `n` whose quantized need `quantize(per_portion × n)` fits in
/// `available`, matching the need confirmation would compute.
fn portions_covered(available: Decimal, per_portion: Decimal) -> i64 {
    let cap = i64::from(i32::MAX);
    let fits = |n: i64| quantize(per_portion * Decimal::from(n)) <= available;

    let mut n = (available / per_portion)
        .floor()
        .to_i64()
        .unwrap_or(cap)
        .clamp(0, cap);
    while n < cap && fits(n + 1) {
        n += 1;
    }
    while n > 0 && !fits(n) {
        n -= 1;
    }
    n
}

async fn candidates_by_product(
    pool: &PgPool,
    product_ids: &[Uuid],
    today: NaiveDate,
) -> EngineResult<HashMap<Uuid, Vec<Candidate>>> {
    let rows = lot_db::eligible_lots_for_products(pool, product_ids, today).await?;
    let mut by_product: HashMap<Uuid, Vec<Candidate>> = HashMap::new();
    for row in &rows {
        by_product
            .entry(row.product_id)
            .or_default()
            .push(Candidate::from(row));
    }
    Ok(by_product)
}

pub async fn simulate_fefo_consumption(
    pool: &PgPool,
    needs: &[IngredientNeed],
) -> EngineResult<Simulation> {
    simulate_fefo_consumption_on(pool, needs, business_date()).await
}

/// Simulate FEFO consumption of `needs` against current free stock without
/// writing anything.
pub async fn simulate_fefo_consumption_on(
    pool: &PgPool,
    needs: &[IngredientNeed],
    today: NaiveDate,
) -> EngineResult<Simulation> {
    let ids: Vec<Uuid> = needs.iter().map(|n| n.product_id).collect();
    let lots = candidates_by_product(pool, &ids, today).await?;
    Ok(score_needs(needs, &lots, today))
}

pub async fn simulate_recipe(pool: &PgPool, recipe_id: Uuid, portions: i32) -> EngineResult<Simulation> {
    simulate_recipe_on(pool, recipe_id, portions, business_date()).await
}

/// Simulate `portions` of a recipe as of `today`.
pub async fn simulate_recipe_on(
    pool: &PgPool,
    recipe_id: Uuid,
    portions: i32,
    today: NaiveDate,
) -> EngineResult<Simulation> {
    let needs = recipe_needs(pool, recipe_id, portions).await?;
    simulate_fefo_consumption_on(pool, &needs, today).await
}

pub async fn simulate_plan(pool: &PgPool, plan_id: Uuid) -> EngineResult<PlanSimulation> {
    simulate_plan_on(pool, plan_id, business_date()).await
}

/// Simulate every item of a draft plan, alone and combined, as of `today`.
///
/// Only drafts qualify: a confirmed plan's holds already take its stock
/// out of the free pool.
pub async fn simulate_plan_on(
    pool: &PgPool,
    plan_id: Uuid,
    today: NaiveDate,
) -> EngineResult<PlanSimulation> {
    let detail = get_plan_detail(pool, plan_id).await?;
    if detail.plan.status != PlanStatus::Draft {
        return Err(EngineError::invalid_transition(
            "meal plan",
            plan_id,
            detail.plan.status,
            PlanStatus::Draft,
        ));
    }
    if detail.items.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "meal plan {plan_id} has no items to simulate"
        )));
    }

    let mut per_item = Vec::with_capacity(detail.items.len());
    for entry in &detail.items {
        let needs = recipe_needs(pool, entry.item.recipe_id, entry.item.planned_portions).await?;
        per_item.push((entry, needs));
    }

    let all_needs: Vec<IngredientNeed> = per_item
        .iter()
        .flat_map(|(_, needs)| needs.iter().cloned())
        .collect();
    let ids: Vec<Uuid> = all_needs.iter().map(|n| n.product_id).collect();
    let lots = candidates_by_product(pool, &ids, today).await?;

    let items = per_item
        .into_iter()
        .map(|(entry, needs)| ItemSimulation {
            item_id: entry.item.id,
            recipe_id: entry.item.recipe_id,
            recipe_name: entry.recipe_name.clone(),
            portions: entry.item.planned_portions,
            simulation: score_needs(&needs, &lots, today),
        })
        .collect();
    let combined = score_needs(&all_needs, &lots, today);

    Ok(PlanSimulation {
        plan_id,
        all_feasible: combined.feasible,
        items,
        combined,
    })
}

pub async fn max_portions(pool: &PgPool, recipe_id: Uuid) -> EngineResult<MaxPortions> {
    max_portions_on(pool, recipe_id, business_date()).await
}

/// Largest whole number of portions of a recipe that free stock covers.
pub async fn max_portions_on(
    pool: &PgPool,
    recipe_id: Uuid,
    today: NaiveDate,
) -> EngineResult<MaxPortions> {
    let detail = get_recipe_detail(pool, recipe_id).await?;
    let factor = waste_factor(detail.recipe.waste_rate);

    let ids: Vec<Uuid> = detail.lines.iter().map(|l| l.product_id).collect();
    let lots = candidates_by_product(pool, &ids, today).await?;

    // Lines sharing a product draw on the same stock.
    let mut per_portion: Vec<(Uuid, String, Decimal)> = Vec::new();
    for line in &detail.lines {
        let gross = line.qty_per_portion * factor;
        match per_portion.iter_mut().find(|(id, _, _)| *id == line.product_id) {
            Some(entry) => entry.2 += gross,
            None => per_portion.push((line.product_id, line.product_name.clone(), gross)),
        }
    }

    let mut best: Option<(i64, LimitingIngredient)> = None;
    for (product_id, product_name, qty_per_portion) in per_portion {
        if qty_per_portion <= Decimal::ZERO {
            continue;
        }
        let available: Decimal = lots
            .get(&product_id)
            .map(|c| c.iter().map(|l| l.available).sum())
            .unwrap_or_default();
        let portions = portions_covered(available, qty_per_portion);

        if best.as_ref().is_none_or(|(p, _)| portions < *p) {
            best = Some((
                portions,
                LimitingIngredient {
                    product_id,
                    product_name,
                    available,
                    qty_per_portion: quantize(qty_per_portion),
                },
            ));
        }
    }

    let (max_portions, limiting) = match best {
        Some((p, l)) => (p, Some(l)),
        None => (0, None),
    };

    Ok(MaxPortions {
        recipe_id,
        recipe_name: detail.recipe.name,
        max_portions,
        limiting,
    })
}
