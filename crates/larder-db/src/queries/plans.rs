//! Database query functions for the `meal_plans` and `meal_plan_items`
//! tables.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::{MealPlan, MealPlanItem, PlanStatus};

/// Insert a new plan in `draft` status.
pub async fn insert_plan<'e>(
    db: impl PgExecutor<'e>,
    name: &str,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<MealPlan> {
    let plan = sqlx::query_as::<_, MealPlan>(
        "INSERT INTO meal_plans (name, period_start, period_end) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(name)
    .bind(period_start)
    .bind(period_end)
    .fetch_one(db)
    .await
    .with_context(|| format!("failed to insert meal plan {name:?}"))?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>("SELECT * FROM meal_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("failed to fetch meal plan")?;

    Ok(plan)
}

/// Fetch and row-lock a plan.
pub async fn lock_plan(conn: &mut PgConnection, id: Uuid) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>("SELECT * FROM meal_plans WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("failed to lock meal plan")?;

    Ok(plan)
}

/// List plans, newest period first, optionally filtered by status.
pub async fn list_plans<'e>(
    db: impl PgExecutor<'e>,
    status: Option<PlanStatus>,
) -> Result<Vec<MealPlan>> {
    let plans = sqlx::query_as::<_, MealPlan>(
        "SELECT * FROM meal_plans \
         WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY period_start DESC, created_at DESC",
    )
    .bind(status)
    .fetch_all(db)
    .await
    .context("failed to list meal plans")?;

    Ok(plans)
}

/// Conditionally move a plan from `from` to `to`, stamping the matching
/// timestamp column.
///
/// The WHERE clause includes `status = $from`, so the row is only updated
/// if the current status matches. Returns the number of rows affected
/// (0 means the status did not match or the plan does not exist).
pub async fn transition_plan_status<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    from: PlanStatus,
    to: PlanStatus,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE meal_plans \
         SET status = $1, \
             confirmed_at = CASE WHEN $1 = 'confirmed' THEN $2 ELSE confirmed_at END, \
             executed_at = CASE WHEN $1 = 'executed' THEN $2 ELSE executed_at END \
         WHERE id = $3 AND status = $4",
    )
    .bind(to)
    .bind(at)
    .bind(id)
    .bind(from)
    .execute(db)
    .await
    .context("failed to transition meal plan status")?;

    Ok(result.rows_affected())
}

/// Insert an item into a plan.
pub async fn insert_item<'e>(
    db: impl PgExecutor<'e>,
    plan_id: Uuid,
    recipe_id: Uuid,
    planned_portions: i32,
) -> Result<MealPlanItem> {
    let item = sqlx::query_as::<_, MealPlanItem>(
        "INSERT INTO meal_plan_items (meal_plan_id, recipe_id, planned_portions) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(plan_id)
    .bind(recipe_id)
    .bind(planned_portions)
    .fetch_one(db)
    .await
    .context("failed to insert meal plan item")?;

    Ok(item)
}

/// Fetch a single item by ID.
pub async fn get_item<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<MealPlanItem>> {
    let item = sqlx::query_as::<_, MealPlanItem>("SELECT * FROM meal_plan_items WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("failed to fetch meal plan item")?;

    Ok(item)
}

/// Fetch and row-lock a single item.
pub async fn lock_item(conn: &mut PgConnection, id: Uuid) -> Result<Option<MealPlanItem>> {
    let item = sqlx::query_as::<_, MealPlanItem>(
        "SELECT * FROM meal_plan_items WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
    .context("failed to lock meal plan item")?;

    Ok(item)
}

/// List all items of a plan, ordered by creation time.
pub async fn list_items_for_plan<'e>(
    db: impl PgExecutor<'e>,
    plan_id: Uuid,
) -> Result<Vec<MealPlanItem>> {
    let items = sqlx::query_as::<_, MealPlanItem>(
        "SELECT * FROM meal_plan_items WHERE meal_plan_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(plan_id)
    .fetch_all(db)
    .await
    .context("failed to list meal plan items")?;

    Ok(items)
}

/// Delete an item. Returns the number of rows removed.
pub async fn delete_item<'e>(db: impl PgExecutor<'e>, plan_id: Uuid, item_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM meal_plan_items WHERE id = $1 AND meal_plan_id = $2")
        .bind(item_id)
        .bind(plan_id)
        .execute(db)
        .await
        .context("failed to delete meal plan item")?;

    Ok(result.rows_affected())
}

/// Record production of an item. Only succeeds once: the WHERE clause
/// requires `produced_portions IS NULL`. Returns rows affected.
pub async fn mark_item_produced<'e>(
    db: impl PgExecutor<'e>,
    item_id: Uuid,
    produced_portions: i32,
    execution_date: NaiveDate,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE meal_plan_items \
         SET produced_portions = $1, execution_date = $2 \
         WHERE id = $3 AND produced_portions IS NULL",
    )
    .bind(produced_portions)
    .bind(execution_date)
    .bind(item_id)
    .execute(db)
    .await
    .context("failed to mark meal plan item produced")?;

    Ok(result.rows_affected())
}

/// Count items of a plan that have not been produced yet.
pub async fn count_unproduced_items<'e>(db: impl PgExecutor<'e>, plan_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM meal_plan_items \
         WHERE meal_plan_id = $1 AND produced_portions IS NULL",
    )
    .bind(plan_id)
    .fetch_one(db)
    .await
    .context("failed to count unproduced items")?;

    Ok(count)
}
