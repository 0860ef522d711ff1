//! Resolution of command-line references to stored entities.
//!
//! Products and recipes may be named either by UUID or by their unique
//! name. Plans and items are always given by UUID.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use larder_db::models::{Product, Recipe};
use larder_db::queries::{products as product_db, recipes as recipe_db};

/// Parse a UUID argument, naming what it was supposed to identify.
pub fn parse_id(what: &str, input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).with_context(|| format!("invalid {what} ID: {input:?}"))
}

/// Look up a product by UUID or name.
pub async fn resolve_product(pool: &PgPool, input: &str) -> Result<Product> {
    let found = match Uuid::parse_str(input) {
        Ok(id) => product_db::get_product(pool, id).await?,
        Err(_) => product_db::get_product_by_name(pool, input).await?,
    };
    found.with_context(|| format!("product {input:?} not found"))
}

/// Look up a recipe by UUID or name.
pub async fn resolve_recipe(pool: &PgPool, input: &str) -> Result<Recipe> {
    let found = match Uuid::parse_str(input) {
        Ok(id) => recipe_db::get_recipe(pool, id).await?,
        Err(_) => recipe_db::get_recipe_by_name(pool, input).await?,
    };
    found.with_context(|| format!("recipe {input:?} not found"))
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_padded_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id("plan", &format!(" {id} ")).unwrap(), id);
    }

    #[test]
    fn parse_id_names_the_entity() {
        let err = parse_id("meal plan item", "abc").unwrap_err();
        assert!(
            err.to_string().contains("invalid meal plan item ID"),
            "unexpected error: {err}"
        );
    }
}
