//! Pure FEFO allocation.
//!
//! Given candidate lots with their free quantity, take greedily from the
//! lot that expires first (lot ID breaks ties) until the need is covered.
//! Reservation, execution and simulation all allocate through
//! [`allocate_fefo`]; the database only supplies the candidates.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use uuid::Uuid;

use larder_db::queries::lots::LotAvailability;

use crate::quantity::{SCALE, is_significant, quantize};

/// A lot that can contribute to an allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub lot_id: i64,
    pub expiry_date: NaiveDate,
    pub available: Decimal,
}

impl From<&LotAvailability> for Candidate {
    fn from(lot: &LotAvailability) -> Self {
        Self {
            lot_id: lot.lot_id,
            expiry_date: lot.expiry_date,
            available: lot.available,
        }
    }
}

/// One lot's contribution to an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Take {
    pub lot_id: i64,
    pub expiry_date: NaiveDate,
    pub quantity: Decimal,
}

/// Result of [`allocate_fefo`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Allocation {
    pub takes: Vec<Take>,
    /// Quantity still uncovered; zero when the need was met.
    pub shortfall: Decimal,
}

impl Allocation {
    pub fn is_complete(&self) -> bool {
        !is_significant(self.shortfall)
    }

    pub fn allocated(&self) -> Decimal {
        self.takes.iter().map(|t| t.quantity).sum()
    }
}

/// A soft hold placed by the reservation phase and consumed or released by
/// execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hold {
    pub reservation_id: i64,
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub lot_id: i64,
    pub quantity: Decimal,
}

/// Allocate `need` across `candidates` in FEFO order.
///
/// Candidates need not be pre-sorted. Every take is quantized and
/// significant; a take never exceeds the lot's free quantity.
pub fn allocate_fefo(need: Decimal, candidates: &[Candidate]) -> Allocation {
    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| (c.expiry_date, c.lot_id));

    let mut remaining = quantize(need);
    let mut takes = Vec::new();

    for lot in ordered {
        if !is_significant(remaining) {
            break;
        }
        // Free quantity is rounded down so a take never exceeds it.
        let free = lot
            .available
            .round_dp_with_strategy(SCALE, RoundingStrategy::ToZero);
        let take = remaining.min(free);
        if !is_significant(take) {
            continue;
        }
        takes.push(Take {
            lot_id: lot.lot_id,
            expiry_date: lot.expiry_date,
            quantity: take,
        });
        remaining = quantize(remaining - take);
    }

    let shortfall = if is_significant(remaining) {
        remaining
    } else {
        Decimal::ZERO
    };

    Allocation { takes, shortfall }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn c(lot_id: i64, expiry: &str, available: &str) -> Candidate {
        Candidate {
            lot_id,
            expiry_date: expiry.parse().unwrap(),
            available: d(available),
        }
    }

    fn taken(a: &Allocation) -> Vec<(i64, Decimal)> {
        a.takes.iter().map(|t| (t.lot_id, t.quantity)).collect()
    }

    #[test]
    fn takes_earliest_expiry_first() {
        let lots = [c(2, "2030-01-11", "10"), c(1, "2030-01-03", "5")];
        let a = allocate_fefo(d("8"), &lots);
        assert!(a.is_complete());
        assert_eq!(taken(&a), vec![(1, d("5")), (2, d("3"))]);
        assert_eq!(a.allocated(), d("8"));
    }

    #[test]
    fn ties_broken_by_lot_id() {
        let lots = [c(9, "2030-01-03", "4"), c(4, "2030-01-03", "4")];
        let a = allocate_fefo(d("5"), &lots);
        assert_eq!(taken(&a), vec![(4, d("4")), (9, d("1"))]);
    }

    #[test]
    fn reports_shortfall() {
        let lots = [c(1, "2030-01-03", "5"), c(2, "2030-01-11", "10")];
        let a = allocate_fefo(d("20"), &lots);
        assert!(!a.is_complete());
        assert_eq!(a.shortfall, d("5"));
        assert_eq!(a.allocated(), d("15"));
    }

    #[test]
    fn skips_exhausted_lots() {
        let lots = [c(1, "2030-01-01", "0"), c(2, "2030-01-02", "0.0004"), c(3, "2030-01-05", "2")];
        let a = allocate_fefo(d("1.5"), &lots);
        assert_eq!(taken(&a), vec![(3, d("1.5"))]);
    }

    #[test]
    fn insignificant_need_takes_nothing() {
        let a = allocate_fefo(d("0.0004"), &[c(1, "2030-01-01", "3")]);
        assert!(a.takes.is_empty());
        assert!(a.is_complete());
    }

    #[test]
    fn quantizes_fractional_takes() {
        let lots = [c(1, "2030-01-01", "0.3335"), c(2, "2030-01-02", "5")];
        let a = allocate_fefo(d("1"), &lots);
        assert_eq!(taken(&a), vec![(1, d("0.333")), (2, d("0.667"))]);
    }
}
