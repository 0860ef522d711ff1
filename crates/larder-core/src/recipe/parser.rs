//! Recipe TOML parser with validation.

use std::collections::HashSet;

use rust_decimal::Decimal;
use thiserror::Error;

use super::toml_format::RecipeToml;
use crate::quantity::SCALE;

#[derive(Debug, Error)]
pub enum RecipeParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("recipe name must not be empty")]
    EmptyName,

    #[error("base portions must be positive (got {0})")]
    InvalidBasePortions(i32),

    #[error("waste rate must be between 0 and 999.99 (got {0})")]
    InvalidWasteRate(Decimal),

    #[error("recipe must list at least one ingredient")]
    NoIngredients,

    #[error("duplicate ingredient: {0:?}")]
    DuplicateIngredient(String),

    #[error("ingredient {product:?} needs a positive quantity per portion with at most 3 decimals (got {value})")]
    InvalidQuantity { product: String, value: Decimal },
}

/// Parse and validate a recipe file.
pub fn parse_recipe_toml(content: &str) -> Result<RecipeToml, RecipeParseError> {
    let recipe: RecipeToml = toml::from_str(content)?;
    validate(&recipe)?;
    Ok(recipe)
}

fn validate(recipe: &RecipeToml) -> Result<(), RecipeParseError> {
    let meta = &recipe.recipe;
    if meta.name.trim().is_empty() {
        return Err(RecipeParseError::EmptyName);
    }
    if meta.base_portions <= 0 {
        return Err(RecipeParseError::InvalidBasePortions(meta.base_portions));
    }
    // NUMERIC(5,2) upper bound.
    if meta.waste_rate.is_sign_negative() || meta.waste_rate >= Decimal::new(1000, 0) {
        return Err(RecipeParseError::InvalidWasteRate(meta.waste_rate));
    }
    if recipe.ingredients.is_empty() {
        return Err(RecipeParseError::NoIngredients);
    }

    let mut seen = HashSet::new();
    for line in &recipe.ingredients {
        if !seen.insert(line.product.as_str()) {
            return Err(RecipeParseError::DuplicateIngredient(line.product.clone()));
        }
        let qty = line.qty_per_portion;
        if qty <= Decimal::ZERO || qty.normalize().scale() > SCALE {
            return Err(RecipeParseError::InvalidQuantity {
                product: line.product.clone(),
                value: qty,
            });
        }
    }
    Ok(())
}
