//! TOML format types for meal plan files.
//!
//! ```toml
//! [plan]
//! name = "Week 12"
//! period_start = "2030-03-16"
//! period_end = "2030-03-22"
//!
//! [[items]]
//! recipe = "Tomato soup"
//! portions = 40
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Top-level structure of a plan file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanToml {
    pub plan: PlanMeta,
    #[serde(default)]
    pub items: Vec<ItemToml>,
}

/// Plan-level metadata in `[plan]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanMeta {
    pub name: String,
    /// First production day, as a quoted `YYYY-MM-DD` string.
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// A single `[[items]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemToml {
    /// Recipe name, resolved against the `recipes` table.
    pub recipe: String,
    pub portions: i32,
}
