//! Production need computation.
//!
//! A recipe line needs `qty_per_portion × portions × (1 + waste_rate / 100)`
//! of its product. Lines that share a product are summed, and the per-product
//! total is quantized once.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use larder_db::queries::recipes::IngredientLine;

use crate::quantity::quantize;

/// Quantity of one product required by an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientNeed {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub quantity: Decimal,
}

/// Multiplier applied to every line of a recipe with `waste_rate` percent loss.
pub fn waste_factor(waste_rate: Decimal) -> Decimal {
    Decimal::ONE + waste_rate / Decimal::ONE_HUNDRED
}

/// Needs for `portions` of a recipe, one entry per distinct product in
/// ascending product ID order.
///
/// The ordering doubles as the lock order for the product's lots.
pub fn compute_needs(
    lines: &[IngredientLine],
    portions: i32,
    waste_rate: Decimal,
) -> Vec<IngredientNeed> {
    let factor = waste_factor(waste_rate);
    let mut by_product: BTreeMap<Uuid, IngredientNeed> = BTreeMap::new();

    for line in lines {
        let raw = line.qty_per_portion * Decimal::from(portions) * factor;
        by_product
            .entry(line.product_id)
            .and_modify(|n| n.quantity += raw)
            .or_insert_with(|| IngredientNeed {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                unit: line.unit.clone(),
                quantity: raw,
            });
    }

    by_product
        .into_values()
        .map(|mut n| {
            n.quantity = quantize(n.quantity);
            n
        })
        .collect()
}

/// Scale a planned need to what was actually produced.
///
/// `planned` is always positive (enforced by the schema). Production above
/// plan scales the need up.
pub fn scale_need(need: Decimal, produced: i32, planned: i32) -> Decimal {
    if planned <= 0 {
        return Decimal::ZERO;
    }
    quantize(need * Decimal::from(produced) / Decimal::from(planned))
}
