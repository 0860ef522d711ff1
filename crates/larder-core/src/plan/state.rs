//! Meal plan state machine.

use chrono::Utc;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use larder_db::models::PlanStatus;
use larder_db::queries::plans as db;

use crate::error::{EngineError, EngineResult};

/// The meal plan state machine.
///
/// ```text
/// draft     -> confirmed
/// confirmed -> executed
/// ```
///
/// `executed` is terminal. There is no way back to `draft` and no
/// cancellation.
pub struct MealPlanStateMachine;

impl MealPlanStateMachine {
    /// Check whether `from -> to` is an edge of the graph.
    pub fn is_valid_transition(from: PlanStatus, to: PlanStatus) -> bool {
        matches!(
            (from, to),
            (PlanStatus::Draft, PlanStatus::Confirmed) | (PlanStatus::Confirmed, PlanStatus::Executed)
        )
    }

    /// Apply a transition with a conditional update.
    ///
    /// Stamps `confirmed_at` or `executed_at`. Fails with
    /// [`EngineError::NotFound`] when the plan is missing and with
    /// [`EngineError::InvalidTransition`] when its status is not `from`.
    pub async fn transition(
        conn: &mut PgConnection,
        plan_id: Uuid,
        from: PlanStatus,
        to: PlanStatus,
    ) -> EngineResult<()> {
        if !Self::is_valid_transition(from, to) {
            return Err(EngineError::InvalidInput(format!(
                "invalid meal plan transition: {from} -> {to}"
            )));
        }

        let rows = db::transition_plan_status(&mut *conn, plan_id, from, to, Utc::now()).await?;

        if rows == 0 {
            return match db::get_plan(&mut *conn, plan_id).await? {
                None => Err(EngineError::not_found("meal plan", plan_id)),
                Some(plan) => Err(EngineError::invalid_transition(
                    "meal plan",
                    plan_id,
                    plan.status,
                    from,
                )),
            };
        }

        debug!(plan_id = %plan_id, %from, %to, "meal plan transitioned");
        Ok(())
    }
}
