//! Database query functions for the `recipes` and `recipe_ingredients`
//! tables.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{Recipe, RecipeIngredient};

/// An ingredient line joined with its product name, as used for need
/// computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct IngredientLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub qty_per_portion: Decimal,
}

/// Insert a recipe header.
pub async fn insert_recipe<'e>(
    db: impl PgExecutor<'e>,
    name: &str,
    base_portions: i32,
    waste_rate: Decimal,
) -> Result<Recipe> {
    let recipe = sqlx::query_as::<_, Recipe>(
        "INSERT INTO recipes (name, base_portions, waste_rate) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(name)
    .bind(base_portions)
    .bind(waste_rate)
    .fetch_one(db)
    .await
    .with_context(|| format!("failed to insert recipe {name:?}"))?;

    Ok(recipe)
}

/// Insert one ingredient line for a recipe.
pub async fn insert_ingredient<'e>(
    db: impl PgExecutor<'e>,
    recipe_id: Uuid,
    product_id: Uuid,
    qty_per_portion: Decimal,
) -> Result<RecipeIngredient> {
    let line = sqlx::query_as::<_, RecipeIngredient>(
        "INSERT INTO recipe_ingredients (recipe_id, product_id, qty_per_portion) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(recipe_id)
    .bind(product_id)
    .bind(qty_per_portion)
    .fetch_one(db)
    .await
    .context("failed to insert recipe ingredient")?;

    Ok(line)
}

/// Fetch a recipe by ID.
pub async fn get_recipe<'e>(db: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("failed to fetch recipe")?;

    Ok(recipe)
}

/// Fetch a recipe by its unique name.
pub async fn get_recipe_by_name<'e>(db: impl PgExecutor<'e>, name: &str) -> Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE name = $1")
        .bind(name)
        .fetch_optional(db)
        .await
        .with_context(|| format!("failed to fetch recipe {name:?}"))?;

    Ok(recipe)
}

/// List all recipes ordered by name.
pub async fn list_recipes<'e>(db: impl PgExecutor<'e>) -> Result<Vec<Recipe>> {
    let recipes = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes ORDER BY name")
        .fetch_all(db)
        .await
        .context("failed to list recipes")?;

    Ok(recipes)
}

/// Ingredient lines of a recipe with product names, in insertion order.
pub async fn ingredient_lines<'e>(
    db: impl PgExecutor<'e>,
    recipe_id: Uuid,
) -> Result<Vec<IngredientLine>> {
    let lines = sqlx::query_as::<_, IngredientLine>(
        "SELECT ri.product_id, p.name AS product_name, p.unit, ri.qty_per_portion \
         FROM recipe_ingredients ri \
         JOIN products p ON p.id = ri.product_id \
         WHERE ri.recipe_id = $1 \
         ORDER BY ri.id",
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("failed to list recipe ingredients")?;

    Ok(lines)
}
