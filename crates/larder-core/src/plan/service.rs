//! Meal plan authoring: creating plans and editing their items while they
//! are still drafts.

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use larder_db::models::{MealPlan, MealPlanItem, PlanStatus, Reservation};
use larder_db::queries::{plans as plan_db, recipes as recipe_db, reservations as reservation_db};

use super::toml_format::PlanToml;
use crate::error::{EngineError, EngineResult};

/// Input for [`create_plan`].
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub items: Vec<NewItem>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewItem {
    pub recipe_id: Uuid,
    pub planned_portions: i32,
}

/// A plan with its items and their current holds.
#[derive(Debug, Clone, Serialize)]
pub struct PlanDetail {
    pub plan: MealPlan,
    pub items: Vec<ItemDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub item: MealPlanItem,
    pub recipe_name: String,
    pub holds: Vec<Reservation>,
}

fn check_portions(portions: i32) -> EngineResult<()> {
    if portions <= 0 {
        return Err(EngineError::InvalidInput(format!(
            "planned portions must be positive (got {portions})"
        )));
    }
    Ok(())
}

/// Lock a plan and require it to still be a draft.
async fn lock_draft(conn: &mut PgConnection, plan_id: Uuid) -> EngineResult<MealPlan> {
    let plan = plan_db::lock_plan(conn, plan_id)
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
    Ok(plan)
}

/// Create a draft plan and its items in one transaction.
pub async fn create_plan(pool: &PgPool, new: &NewPlan) -> EngineResult<PlanDetail> {
    if new.name.trim().is_empty() {
        return Err(EngineError::InvalidInput("plan name must not be empty".into()));
    }
    if new.period_start > new.period_end {
        return Err(EngineError::InvalidInput(format!(
            "plan period ends on {} before it starts on {}",
            new.period_end, new.period_start
        )));
    }
    for item in &new.items {
        check_portions(item.planned_portions)?;
    }

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let plan = plan_db::insert_plan(&mut *tx, &new.name, new.period_start, new.period_end).await?;
    for item in &new.items {
        if recipe_db::get_recipe(&mut *tx, item.recipe_id).await?.is_none() {
            return Err(EngineError::not_found("recipe", item.recipe_id));
        }
        plan_db::insert_item(&mut *tx, plan.id, item.recipe_id, item.planned_portions).await?;
    }

    tx.commit().await.context("failed to commit plan")?;

    info!(plan_id = %plan.id, name = %plan.name, items = new.items.len(), "meal plan created");
    get_plan_detail(pool, plan.id).await
}

/// Create a plan from a parsed file, resolving recipe names.
pub async fn create_plan_from_toml(pool: &PgPool, plan_toml: &PlanToml) -> EngineResult<PlanDetail> {
    let mut items = Vec::with_capacity(plan_toml.items.len());
    for item in &plan_toml.items {
        let recipe = recipe_db::get_recipe_by_name(pool, &item.recipe)
            .await?
            .ok_or_else(|| EngineError::not_found("recipe", &item.recipe))?;
        items.push(NewItem {
            recipe_id: recipe.id,
            planned_portions: item.portions,
        });
    }

    create_plan(
        pool,
        &NewPlan {
            name: plan_toml.plan.name.clone(),
            period_start: plan_toml.plan.period_start,
            period_end: plan_toml.plan.period_end,
            items,
        },
    )
    .await
}

/// Add an item to a draft plan.
pub async fn add_item(
    pool: &PgPool,
    plan_id: Uuid,
    recipe_id: Uuid,
    planned_portions: i32,
) -> EngineResult<MealPlanItem> {
    check_portions(planned_portions)?;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    lock_draft(&mut tx, plan_id).await?;

    if recipe_db::get_recipe(&mut *tx, recipe_id).await?.is_none() {
        return Err(EngineError::not_found("recipe", recipe_id));
    }
    let item = plan_db::insert_item(&mut *tx, plan_id, recipe_id, planned_portions).await?;

    tx.commit().await.context("failed to commit new item")?;

    info!(plan_id = %plan_id, item_id = %item.id, planned_portions, "item added");
    Ok(item)
}

/// Remove an item from a draft plan.
pub async fn remove_item(pool: &PgPool, plan_id: Uuid, item_id: Uuid) -> EngineResult<()> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    lock_draft(&mut tx, plan_id).await?;

    let item = plan_db::get_item(&mut *tx, item_id)
        .await?
        .ok_or_else(|| EngineError::not_found("meal plan item", item_id))?;
    if item.meal_plan_id != plan_id {
        return Err(EngineError::InvalidInput(format!(
            "item {item_id} does not belong to meal plan {plan_id}"
        )));
    }

    plan_db::delete_item(&mut *tx, plan_id, item_id).await?;
    tx.commit().await.context("failed to commit item removal")?;

    info!(plan_id = %plan_id, item_id = %item_id, "item removed");
    Ok(())
}

/// Fetch a plan with its items, recipe names and holds.
pub async fn get_plan_detail(pool: &PgPool, plan_id: Uuid) -> EngineResult<PlanDetail> {
    let plan = plan_db::get_plan(pool, plan_id)
        .await?
        .ok_or_else(|| EngineError::not_found("meal plan", plan_id))?;

    let mut items = Vec::new();
    for item in plan_db::list_items_for_plan(pool, plan_id).await? {
        let recipe_name = recipe_db::get_recipe(pool, item.recipe_id)
            .await?
            .map(|r| r.name)
            .unwrap_or_default();
        let holds = reservation_db::list_for_item(pool, item.id).await?;
        items.push(ItemDetail {
            item,
            recipe_name,
            holds,
        });
    }

    Ok(PlanDetail { plan, items })
}
