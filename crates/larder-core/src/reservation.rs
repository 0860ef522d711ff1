//! Reservation engine: turns a plan's production need into per-lot holds.
//!
//! Confirmation is all-or-nothing. Either every item of the plan gets holds
//! covering its full need and the plan becomes `confirmed`, or nothing is
//! written and the plan stays a draft.

use std::collections::BTreeSet;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use larder_db::models::{MealPlanItem, PlanStatus};
use larder_db::queries::{
    lots as lot_db, plans as plan_db, recipes as recipe_db, reservations as reservation_db,
};

use crate::allocation::{Candidate, Hold, allocate_fefo};
use crate::business_date;
use crate::error::{EngineError, EngineResult};
use crate::need::{IngredientNeed, compute_needs};
use crate::plan::MealPlanStateMachine;

/// Outcome of [`confirm_plan`].
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmReport {
    pub plan_id: Uuid,
    pub items: usize,
    pub holds: Vec<Hold>,
}

/// Planned need of an item, one entry per product in ascending product ID.
pub(crate) async fn load_item_needs(
    conn: &mut PgConnection,
    item: &MealPlanItem,
) -> EngineResult<Vec<IngredientNeed>> {
    let recipe = recipe_db::get_recipe(&mut *conn, item.recipe_id)
        .await?
        .ok_or_else(|| EngineError::not_found("recipe", item.recipe_id))?;
    let lines = recipe_db::ingredient_lines(&mut *conn, item.recipe_id).await?;
    Ok(compute_needs(&lines, item.planned_portions, recipe.waste_rate))
}

/// Place FEFO holds covering the full planned need of one item.
///
/// Runs on the caller's transaction. The owning plan must already be
/// `confirmed` within that transaction so that holds placed for earlier
/// items of the same plan count against availability, and the item must
/// not hold anything yet. Either violation is an
/// [`EngineError::InvalidTransition`].
///
/// Lots are locked per product in ascending product ID, then FEFO. Fails
/// with [`EngineError::InsufficientStock`] naming the first product whose
/// need cannot be covered; the caller's transaction must then be dropped.
pub async fn reserve_for_item(
    conn: &mut PgConnection,
    item_id: Uuid,
    today: NaiveDate,
) -> EngineResult<Vec<Hold>> {
    let item = plan_db::get_item(&mut *conn, item_id)
        .await?
        .ok_or_else(|| EngineError::not_found("meal plan item", item_id))?;
    if item.is_produced() {
        return Err(EngineError::invalid_transition(
            "meal plan item",
            item_id,
            "produced",
            "unproduced",
        ));
    }

    let plan = plan_db::lock_plan(conn, item.meal_plan_id)
        .await?
        .ok_or_else(|| EngineError::not_found("meal plan", item.meal_plan_id))?;
    if plan.status != PlanStatus::Confirmed {
        return Err(EngineError::invalid_transition(
            "meal plan",
            plan.id,
            plan.status,
            PlanStatus::Confirmed,
        ));
    }
    if !reservation_db::list_for_item(&mut *conn, item_id).await?.is_empty() {
        return Err(EngineError::invalid_transition(
            "meal plan item",
            item_id,
            "reserved",
            "unreserved",
        ));
    }

    let needs = load_item_needs(conn, &item).await?;
    let mut holds = Vec::new();

    for need in &needs {
        lot_db::lock_eligible_lots(conn, need.product_id, today).await?;
        let lots = lot_db::eligible_lots(&mut *conn, need.product_id, today, None).await?;
        let candidates: Vec<Candidate> = lots.iter().map(Candidate::from).collect();

        let allocation = allocate_fefo(need.quantity, &candidates);
        if !allocation.is_complete() {
            return Err(EngineError::InsufficientStock {
                product_id: need.product_id,
                product_name: need.product_name.clone(),
                shortfall: allocation.shortfall,
            });
        }

        for take in allocation.takes {
            let row =
                reservation_db::insert_reservation(&mut *conn, item_id, take.lot_id, take.quantity)
                    .await?;
            holds.push(Hold {
                reservation_id: row.id,
                item_id,
                product_id: need.product_id,
                lot_id: take.lot_id,
                quantity: row.reserved_qty,
            });
        }
    }

    debug!(item_id = %item_id, holds = holds.len(), "item reserved");
    Ok(holds)
}

pub async fn confirm_plan(pool: &PgPool, plan_id: Uuid) -> EngineResult<ConfirmReport> {
    confirm_plan_on(pool, plan_id, business_date()).await
}

/// Confirm a draft plan, reserving stock for every item.
///
/// One transaction: lock the plan, lock the eligible lots of every product
/// the plan needs (ascending product ID, then FEFO), move the plan to
/// `confirmed`, then reserve item by item. Any failure leaves the plan a
/// draft with no holds.
pub async fn confirm_plan_on(
    pool: &PgPool,
    plan_id: Uuid,
    today: NaiveDate,
) -> EngineResult<ConfirmReport> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let plan = plan_db::lock_plan(&mut tx, plan_id)
        .await?
        .ok_or_else(|| EngineError::not_found("meal plan", plan_id))?;
    if plan.status != PlanStatus::Draft {
        return Err(EngineError::invalid_transition(
            "meal plan",
            plan_id,
            plan.status,
            PlanStatus::Draft,
        ));
    }

    let items = plan_db::list_items_for_plan(&mut *tx, plan_id).await?;
    if items.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "meal plan {plan_id} has no items to confirm"
        )));
    }

    let mut products = BTreeSet::new();
    for item in &items {
        for line in recipe_db::ingredient_lines(&mut *tx, item.recipe_id).await? {
            products.insert(line.product_id);
        }
    }
    for product_id in &products {
        lot_db::lock_eligible_lots(&mut tx, *product_id, today).await?;
    }

    MealPlanStateMachine::transition(&mut tx, plan_id, PlanStatus::Draft, PlanStatus::Confirmed)
        .await?;

    let mut holds = Vec::new();
    for item in &items {
        holds.extend(reserve_for_item(&mut tx, item.id, today).await?);
    }

    tx.commit().await.context("failed to commit plan confirmation")?;

    info!(
        plan_id = %plan_id,
        items = items.len(),
        holds = holds.len(),
        "meal plan confirmed"
    );

    Ok(ConfirmReport {
        plan_id,
        items: items.len(),
        holds,
    })
}
