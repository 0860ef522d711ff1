//! Goods receipt, stock-count adjustments and lot retirement.

use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use larder_db::models::{Lot, MovementKind};
use larder_db::queries::movements::{self as movement_db, NewMovement};
use larder_db::queries::{
    lots as lot_db, products as product_db, reservations as reservation_db,
};

use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::quantity::{is_significant, quantize};

/// A delivery of one batch of a product.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub product_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptOutcome {
    pub lot: Lot,
    /// The receipt was added to an existing open lot with the same product,
    /// batch and expiry.
    pub merged: bool,
    pub movement_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentOutcome {
    pub lot: Lot,
    pub delta: Decimal,
    pub movement_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireOutcome {
    /// The lot has history and was archived.
    Archived,
    /// The lot never moved and was deleted.
    Deleted,
}

/// Receive stock into a lot, posting an IN movement.
///
/// Merges into the open lot with the same product, batch number and expiry
/// date if there is one. A zero receipt creates (or finds) the lot without
/// posting anything.
pub async fn receive_lot(
    pool: &PgPool,
    receipt: &Receipt,
    actor: &str,
) -> EngineResult<ReceiptOutcome> {
    let quantity = quantize(receipt.quantity);
    if quantity < Decimal::ZERO {
        return Err(EngineError::InvalidInput(format!(
            "received quantity must not be negative (got {quantity})"
        )));
    }
    if receipt.batch_number.trim().is_empty() {
        return Err(EngineError::InvalidInput("batch number must not be empty".into()));
    }

    let product = product_db::get_product(pool, receipt.product_id)
        .await?
        .ok_or_else(|| EngineError::not_found("product", receipt.product_id))?;
    if !product.active {
        return Err(EngineError::InvalidInput(format!(
            "product {} is inactive",
            product.name
        )));
    }

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let existing = lot_db::lock_open_lot_for_receipt(
        &mut tx,
        receipt.product_id,
        &receipt.batch_number,
        receipt.expiry_date,
    )
    .await?;
    let merged = existing.is_some();
    let lot_id = match existing {
        Some(lot) => lot.id,
        None => {
            lot_db::insert_lot(
                &mut *tx,
                receipt.product_id,
                &receipt.batch_number,
                receipt.expiry_date,
            )
            .await?
            .id
        }
    };

    let movement_id = if is_significant(quantity) {
        let posted = ledger::post_movement(
            &mut tx,
            &NewMovement {
                kind: MovementKind::In,
                quantity,
                lot_id,
                meal_plan_item_id: None,
                actor,
                reason: None,
            },
        )
        .await?;
        Some(posted.movement.id)
    } else {
        None
    };

    let lot = lot_db::get_lot(&mut *tx, lot_id)
        .await?
        .ok_or_else(|| EngineError::not_found("lot", lot_id))?;

    tx.commit().await.context("failed to commit receipt")?;

    info!(
        lot_id,
        product = %product.name,
        batch = %lot.batch_number,
        %quantity,
        merged,
        "stock received"
    );

    Ok(ReceiptOutcome {
        lot,
        merged,
        movement_id,
    })
}

/// Set a lot's quantity after a stock count, posting the signed difference
/// as an ADJUSTMENT.
///
/// Archived lots cannot be adjusted, and the new quantity may not drop
/// below what confirmed plans currently hold on the lot.
pub async fn adjust_lot(
    pool: &PgPool,
    lot_id: i64,
    new_quantity: Decimal,
    actor: &str,
    reason: Option<&str>,
) -> EngineResult<AdjustmentOutcome> {
    let new_quantity = quantize(new_quantity);
    if new_quantity < Decimal::ZERO {
        return Err(EngineError::InvalidInput(format!(
            "lot quantity must not be negative (got {new_quantity})"
        )));
    }

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let lot = lot_db::lock_lot(&mut tx, lot_id)
        .await?
        .ok_or_else(|| EngineError::not_found("lot", lot_id))?;
    if lot.archived {
        return Err(EngineError::invalid_transition("lot", lot_id, "archived", "open"));
    }

    let held = lot_db::held_quantity(&mut *tx, lot_id).await?;
    if new_quantity < held {
        return Err(EngineError::consistency(format!(
            "lot {lot_id} cannot drop to {new_quantity}: {held} is held by confirmed plans"
        )));
    }

    let delta = quantize(new_quantity - lot.quantity);
    let movement_id = if is_significant(delta.abs()) {
        let posted = ledger::post_movement(
            &mut tx,
            &NewMovement {
                kind: MovementKind::Adjustment,
                quantity: delta,
                lot_id,
                meal_plan_item_id: None,
                actor,
                reason,
            },
        )
        .await?;
        Some(posted.movement.id)
    } else {
        None
    };

    let lot = lot_db::get_lot(&mut *tx, lot_id)
        .await?
        .ok_or_else(|| EngineError::not_found("lot", lot_id))?;

    tx.commit().await.context("failed to commit adjustment")?;

    info!(lot_id, %delta, quantity = %lot.quantity, "lot adjusted");

    Ok(AdjustmentOutcome {
        lot,
        delta,
        movement_id,
    })
}

/// Take an empty lot out of service.
///
/// The lot must hold no stock and carry no holds. A lot with ledger history
/// is archived; one that never moved is deleted.
pub async fn retire_lot(pool: &PgPool, lot_id: i64) -> EngineResult<RetireOutcome> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let lot = lot_db::lock_lot(&mut tx, lot_id)
        .await?
        .ok_or_else(|| EngineError::not_found("lot", lot_id))?;
    if is_significant(lot.quantity) {
        return Err(EngineError::InvalidInput(format!(
            "lot {lot_id} still holds {}; adjust it to zero first",
            lot.quantity
        )));
    }
    if reservation_db::count_for_lot(&mut *tx, lot_id).await? > 0 {
        return Err(EngineError::InvalidInput(format!(
            "lot {lot_id} has reservations"
        )));
    }

    let outcome = if movement_db::count_for_lot(&mut *tx, lot_id).await? > 0 {
        lot_db::archive_lot(&mut tx, lot_id).await?;
        RetireOutcome::Archived
    } else {
        lot_db::delete_lot(&mut tx, lot_id).await?;
        RetireOutcome::Deleted
    };

    tx.commit().await.context("failed to commit lot retirement")?;

    info!(lot_id, outcome = ?outcome, "lot retired");
    Ok(outcome)
}
