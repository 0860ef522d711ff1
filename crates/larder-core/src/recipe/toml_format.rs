//! TOML format types for recipe files.
//!
//! ```toml
//! [recipe]
//! name = "Tomato soup"
//! base_portions = 10
//! waste_rate = 5
//!
//! [[ingredients]]
//! product = "tomato"
//! qty_per_portion = 0.25
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeToml {
    pub recipe: RecipeMeta,
    #[serde(default)]
    pub ingredients: Vec<IngredientToml>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeMeta {
    pub name: String,
    #[serde(default = "default_base_portions")]
    pub base_portions: i32,
    /// Percentage added on top of every ingredient to cover preparation loss.
    #[serde(default)]
    pub waste_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientToml {
    /// Product name, resolved against the `products` table.
    pub product: String,
    pub qty_per_portion: Decimal,
}

fn default_base_portions() -> i32 {
    1
}
