use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a meal plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Confirmed,
    Executed,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Executed => "executed",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = PlanStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "confirmed" => Ok(Self::Confirmed),
            "executed" => Ok(Self::Executed),
            other => Err(PlanStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanStatus`] string.
#[derive(Debug, Clone)]
pub struct PlanStatusParseError(pub String);

impl fmt::Display for PlanStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan status: {:?}", self.0)
    }
}

impl std::error::Error for PlanStatusParseError {}

// ---------------------------------------------------------------------------

/// Kind of a stock ledger entry.
///
/// `In`, `Out` and `Loss` carry positive magnitudes; `Adjustment` carries a
/// signed delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    In,
    Out,
    Adjustment,
    Loss,
}

impl MovementKind {
    /// Signed effect of a movement of this kind on the lot quantity.
    pub fn signed_delta(self, quantity: Decimal) -> Decimal {
        match self {
            Self::In | Self::Adjustment => quantity,
            Self::Out | Self::Loss => -quantity,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Adjustment => "adjustment",
            Self::Loss => "loss",
        };
        f.write_str(s)
    }
}

impl FromStr for MovementKind {
    type Err = MovementKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "adjustment" => Ok(Self::Adjustment),
            "loss" => Ok(Self::Loss),
            other => Err(MovementKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`MovementKind`] string.
#[derive(Debug, Clone)]
pub struct MovementKindParseError(pub String);

impl fmt::Display for MovementKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid movement kind: {:?}", self.0)
    }
}

impl std::error::Error for MovementKindParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A stocked product.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub unit_cost: Decimal,
    pub alert_threshold: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A physically distinct batch of a product.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lot {
    pub id: i64,
    pub product_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: Decimal,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

/// A recipe header.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub base_portions: i32,
    /// Extra percentage of every ingredient lost during preparation.
    pub waste_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One ingredient line of a recipe.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecipeIngredient {
    pub id: i64,
    pub recipe_id: Uuid,
    pub product_id: Uuid,
    pub qty_per_portion: Decimal,
}

/// A meal plan: a production period and its items.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealPlan {
    pub id: Uuid,
    pub name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
}

/// A recipe scheduled for production within a meal plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealPlanItem {
    pub id: Uuid,
    pub meal_plan_id: Uuid,
    pub recipe_id: Uuid,
    pub planned_portions: i32,
    pub produced_portions: Option<i32>,
    pub execution_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl MealPlanItem {
    pub fn is_produced(&self) -> bool {
        self.produced_portions.is_some()
    }
}

/// A soft hold of stock against one lot for one meal plan item.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: i64,
    pub meal_plan_item_id: Uuid,
    pub lot_id: i64,
    pub reserved_qty: Decimal,
    pub created_at: DateTime<Utc>,
}

/// An immutable stock ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockMovement {
    pub id: i64,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub lot_id: i64,
    pub meal_plan_item_id: Option<Uuid>,
    pub actor: String,
    pub reason: Option<String>,
    pub moved_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
