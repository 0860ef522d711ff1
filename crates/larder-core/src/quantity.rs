//! Fixed-precision quantity arithmetic.
//!
//! Every stored quantity is `NUMERIC(12,3)`. Intermediate results are
//! brought back to three decimal places with [`quantize`], and comparisons
//! against zero go through [`is_significant`] so that rounding dust never
//! produces a zero-sized hold or movement.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for quantities.
pub const SCALE: u32 = 3;

/// Half of the smallest representable step (0.0005).
pub const EPSILON: Decimal = Decimal::from_parts(5, 0, 0, false, 4);

/// Round to [`SCALE`] decimal places, half away from zero.
pub fn quantize(x: Decimal) -> Decimal {
    x.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `true` when `x` is strictly greater than [`EPSILON`].
pub fn is_significant(x: Decimal) -> bool {
    x > EPSILON
}
