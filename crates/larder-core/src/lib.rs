//! FEFO reservation, consumption and expiry engine for planned kitchen
//! production.
//!
//! Stock lives in lots with an expiry date. Confirming a meal plan places
//! holds on the lots that expire first; executing an item consumes those
//! holds (or free stock) in proportion to what was produced; the sweeper
//! writes off lots past their expiry date. Every quantity change goes
//! through the append-only movement ledger.

pub mod allocation;
pub mod error;
pub mod execution;
pub mod ledger;
pub mod need;
pub mod plan;
pub mod quantity;
pub mod receiving;
pub mod recipe;
pub mod reservation;
pub mod simulate;
pub mod stock;
pub mod sweeper;

use chrono::NaiveDate;

pub use error::{EngineError, EngineResult};

/// Today's date on the local calendar. Entry points without an explicit
/// `today` argument use this to decide what has expired.
pub fn business_date() -> NaiveDate {
    chrono::Local::now().date_naive()
}
