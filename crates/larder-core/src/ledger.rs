//! The single write path for stock quantities.
//!
//! [`post_movement`] appends a ledger row and applies its signed effect to
//! the lot on the same connection, so a lot's quantity always equals the net
//! of its movements once the surrounding transaction commits.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::debug;

use larder_db::models::{MovementKind, StockMovement};
use larder_db::queries::lots;
use larder_db::queries::movements::{self, NewMovement};

use crate::error::{EngineError, EngineResult};
use crate::quantity::{is_significant, quantize};

/// Reason recorded on losses posted by the expiry sweeper.
pub const REASON_EXPIRED: &str = "EXPIRED";

/// Reason recorded on consumption posted by item execution.
pub const REASON_PRODUCTION: &str = "PRODUCTION";

/// A posted movement and the lot quantity it left behind.
#[derive(Debug, Clone)]
pub struct Posted {
    pub movement: StockMovement,
    pub lot_quantity: Decimal,
}

/// Append a movement and update the lot quantity.
///
/// The quantity is quantized first. `In`, `Out` and `Loss` must be
/// significant positive magnitudes and an adjustment must be a significant
/// delta in either direction. A movement that would take the lot below zero
/// is a [`EngineError::ConsistencyViolation`].
pub async fn post_movement(
    conn: &mut PgConnection,
    new: &NewMovement<'_>,
) -> EngineResult<Posted> {
    let quantity = quantize(new.quantity);
    let valid = match new.kind {
        MovementKind::Adjustment => is_significant(quantity.abs()),
        _ => is_significant(quantity),
    };
    if !valid {
        return Err(EngineError::InvalidInput(format!(
            "{} movement on lot {} has quantity {quantity}",
            new.kind, new.lot_id
        )));
    }

    let new = NewMovement {
        quantity,
        ..new.clone()
    };
    let movement = movements::insert_movement(conn, &new).await?;

    let delta = new.kind.signed_delta(quantity);
    let lot_quantity = lots::apply_quantity_delta(conn, new.lot_id, delta)
        .await?
        .ok_or_else(|| {
            EngineError::consistency(format!(
                "{} of {quantity} would leave lot {} negative or the lot is missing",
                new.kind, new.lot_id
            ))
        })?;

    debug!(
        lot_id = new.lot_id,
        kind = %new.kind,
        %quantity,
        %lot_quantity,
        "movement posted"
    );

    Ok(Posted {
        movement,
        lot_quantity,
    })
}
