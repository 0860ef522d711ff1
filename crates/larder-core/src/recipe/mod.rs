//! Recipes: file parsing, creation and need lookup.

pub mod parser;
pub mod toml_format;

use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use larder_db::models::Recipe;
use larder_db::queries::products as product_db;
use larder_db::queries::recipes::{self as recipe_db, IngredientLine};

use crate::error::{EngineError, EngineResult};
use crate::need::{IngredientNeed, compute_needs};

pub use parser::{RecipeParseError, parse_recipe_toml};
pub use toml_format::{IngredientToml, RecipeMeta, RecipeToml};

/// A recipe with its ingredient lines.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub lines: Vec<IngredientLine>,
}

/// Create a recipe from a parsed file in one transaction, resolving product
/// names.
pub async fn create_recipe_from_toml(pool: &PgPool, file: &RecipeToml) -> EngineResult<RecipeDetail> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let recipe = recipe_db::insert_recipe(
        &mut *tx,
        &file.recipe.name,
        file.recipe.base_portions,
        file.recipe.waste_rate,
    )
    .await?;

    for line in &file.ingredients {
        let product = product_db::get_product_by_name(&mut *tx, &line.product)
            .await?
            .ok_or_else(|| EngineError::not_found("product", &line.product))?;
        recipe_db::insert_ingredient(&mut *tx, recipe.id, product.id, line.qty_per_portion).await?;
    }

    tx.commit().await.context("failed to commit recipe")?;

    info!(recipe_id = %recipe.id, name = %recipe.name, lines = file.ingredients.len(), "recipe created");
    get_recipe_detail(pool, recipe.id).await
}

pub async fn get_recipe_detail(pool: &PgPool, recipe_id: Uuid) -> EngineResult<RecipeDetail> {
    let recipe = recipe_db::get_recipe(pool, recipe_id)
        .await?
        .ok_or_else(|| EngineError::not_found("recipe", recipe_id))?;
    let lines = recipe_db::ingredient_lines(pool, recipe_id).await?;
    Ok(RecipeDetail { recipe, lines })
}

/// Per-product needs for `portions` of a recipe.
pub async fn recipe_needs(
    pool: &PgPool,
    recipe_id: Uuid,
    portions: i32,
) -> EngineResult<Vec<IngredientNeed>> {
    if portions <= 0 {
        return Err(EngineError::InvalidInput(format!(
            "portions must be positive (got {portions})"
        )));
    }
    let detail = get_recipe_detail(pool, recipe_id).await?;
    Ok(compute_needs(&detail.lines, portions, detail.recipe.waste_rate))
}

