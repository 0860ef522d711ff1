//! Execution engine: consumes stock when an item is actually produced.
//!
//! The consumed quantity follows the production ratio
//! `produced / planned`. The item's own holds are drawn first; any
//! remainder comes from the general FEFO pool. Whatever the item still holds
//! afterwards is released.

use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use larder_db::models::{MovementKind, PlanStatus};
use larder_db::queries::movements::NewMovement;
use larder_db::queries::{lots as lot_db, plans as plan_db, reservations as reservation_db};

use crate::allocation::{Candidate, allocate_fefo};
use crate::business_date;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{self, REASON_PRODUCTION};
use crate::need::scale_need;
use crate::plan::MealPlanStateMachine;
use crate::quantity::{is_significant, quantize};
use crate::reservation::load_item_needs;

/// Where a consumed quantity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionSource {
    /// The item's own hold on the lot.
    Hold,
    /// Unreserved stock of the lot.
    Pool,
}

/// One OUT movement posted by an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumedLine {
    pub product_id: Uuid,
    pub lot_id: i64,
    pub movement_id: i64,
    pub quantity: Decimal,
    pub source: ConsumptionSource,
}

/// Outcome of [`execute_item`].
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub item_id: Uuid,
    pub plan_id: Uuid,
    pub produced_portions: i32,
    pub consumed: Vec<ConsumedLine>,
    /// Holds dropped because their lot expired or was archived.
    pub stale_released: Decimal,
    /// Unused hold quantity released after consumption.
    pub released: Decimal,
    /// The item was the plan's last unproduced item.
    pub plan_executed: bool,
}

impl ExecutionReport {
    pub fn total_consumed(&self) -> Decimal {
        self.consumed.iter().map(|c| c.quantity).sum()
    }
}

pub async fn execute_item(
    pool: &PgPool,
    item_id: Uuid,
    produced_portions: i32,
    actor: &str,
) -> EngineResult<ExecutionReport> {
    execute_item_on(pool, item_id, produced_portions, actor, business_date()).await
}

/// Record production of an item and consume the matching stock.
///
/// The plan must be `confirmed` and the item not yet produced. Everything
/// happens in one transaction that locks the plan, the item and the
/// eligible lots of the item's products in that order. An
/// [`EngineError::InsufficientStock`] rolls everything back.
pub async fn execute_item_on(
    pool: &PgPool,
    item_id: Uuid,
    produced_portions: i32,
    actor: &str,
    today: NaiveDate,
) -> EngineResult<ExecutionReport> {
    if produced_portions < 0 {
        return Err(EngineError::InvalidInput(format!(
            "produced portions must not be negative (got {produced_portions})"
        )));
    }

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let plan_id = plan_db::get_item(&mut *tx, item_id)
        .await?
        .ok_or_else(|| EngineError::not_found("meal plan item", item_id))?
        .meal_plan_id;

    let plan = plan_db::lock_plan(&mut tx, plan_id)
        .await?
        .ok_or_else(|| EngineError::not_found("meal plan", plan_id))?;
    if plan.status != PlanStatus::Confirmed {
        return Err(EngineError::invalid_transition(
            "meal plan",
            plan_id,
            plan.status,
            PlanStatus::Confirmed,
        ));
    }

    let item = plan_db::lock_item(&mut tx, item_id)
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

    let needs = load_item_needs(&mut tx, &item).await?;
    for need in &needs {
        lot_db::lock_eligible_lots(&mut tx, need.product_id, today).await?;
    }

    // Holds on lots that expired since confirmation are void.
    lot_db::lock_stale_lots_for_item(&mut tx, item_id, today).await?;
    let stale = reservation_db::delete_stale_for_item(&mut tx, item_id, today).await?;
    let mut stale_released = Decimal::ZERO;
    for hold in &stale {
        warn!(
            item_id = %item_id,
            lot_id = hold.lot_id,
            quantity = %hold.reserved_qty,
            "dropping hold on expired lot"
        );
        stale_released += hold.reserved_qty;
    }

    let mut consumed = Vec::new();
    for need in &needs {
        let mut remaining = scale_need(need.quantity, produced_portions, item.planned_portions);

        let own =
            reservation_db::lock_item_holds_for_product(&mut tx, item_id, need.product_id, today)
                .await?;
        for hold in own {
            if !is_significant(remaining) {
                break;
            }
            let take = quantize(remaining.min(hold.reserved_qty));
            if !is_significant(take) {
                continue;
            }

            let posted = ledger::post_movement(
                &mut tx,
                &NewMovement {
                    kind: MovementKind::Out,
                    quantity: take,
                    lot_id: hold.lot_id,
                    meal_plan_item_id: Some(item_id),
                    actor,
                    reason: Some(REASON_PRODUCTION),
                },
            )
            .await?;
            reservation_db::decrement_reservation(&mut tx, hold.reservation_id, take)
                .await?
                .ok_or_else(|| {
                    EngineError::consistency(format!(
                        "hold {} is smaller than the {take} consumed from it",
                        hold.reservation_id
                    ))
                })?;

            consumed.push(ConsumedLine {
                product_id: need.product_id,
                lot_id: hold.lot_id,
                movement_id: posted.movement.id,
                quantity: take,
                source: ConsumptionSource::Hold,
            });
            remaining = quantize(remaining - take);
        }

        if is_significant(remaining) {
            let lots =
                lot_db::eligible_lots(&mut *tx, need.product_id, today, Some(item_id)).await?;
            let candidates: Vec<Candidate> = lots.iter().map(Candidate::from).collect();
            let allocation = allocate_fefo(remaining, &candidates);
            if !allocation.is_complete() {
                return Err(EngineError::InsufficientStock {
                    product_id: need.product_id,
                    product_name: need.product_name.clone(),
                    shortfall: allocation.shortfall,
                });
            }

            for take in allocation.takes {
                let posted = ledger::post_movement(
                    &mut tx,
                    &NewMovement {
                        kind: MovementKind::Out,
                        quantity: take.quantity,
                        lot_id: take.lot_id,
                        meal_plan_item_id: Some(item_id),
                        actor,
                        reason: Some(REASON_PRODUCTION),
                    },
                )
                .await?;
                consumed.push(ConsumedLine {
                    product_id: need.product_id,
                    lot_id: take.lot_id,
                    movement_id: posted.movement.id,
                    quantity: take.quantity,
                    source: ConsumptionSource::Pool,
                });
            }
        }
    }

    let released = reservation_db::delete_for_item(&mut tx, item_id).await?;

    let marked =
        plan_db::mark_item_produced(&mut *tx, item_id, produced_portions, today).await?;
    if marked == 0 {
        return Err(EngineError::consistency(format!(
            "item {item_id} was produced concurrently despite its row lock"
        )));
    }

    let plan_executed = plan_db::count_unproduced_items(&mut *tx, plan_id).await? == 0;
    if plan_executed {
        MealPlanStateMachine::transition(
            &mut tx,
            plan_id,
            PlanStatus::Confirmed,
            PlanStatus::Executed,
        )
        .await?;
    }

    tx.commit().await.context("failed to commit item execution")?;

    let report = ExecutionReport {
        item_id,
        plan_id,
        produced_portions,
        consumed,
        stale_released,
        released,
        plan_executed,
    };

    info!(
        item_id = %item_id,
        plan_id = %plan_id,
        produced_portions,
        consumed = %report.total_consumed(),
        released = %released,
        plan_executed,
        "item executed"
    );

    Ok(report)
}
