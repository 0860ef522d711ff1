//! Handlers for `larder recipe` subcommands.

use anyhow::{Context, Result};
use sqlx::PgPool;

use larder_core::recipe::{create_recipe_from_toml, get_recipe_detail, parse_recipe_toml};
use larder_core::simulate;
use larder_db::queries::recipes as recipe_db;

use crate::RecipeCommands;
use crate::resolve::{print_json, resolve_recipe};

pub async fn run_recipe_command(command: RecipeCommands, pool: &PgPool, json: bool) -> Result<()> {
    match command {
        RecipeCommands::Create { file } => cmd_create(pool, &file, json).await,
        RecipeCommands::Show { recipe } => match recipe {
            Some(r) => cmd_show_one(pool, &r, json).await,
            None => cmd_show_all(pool, json).await,
        },
        RecipeCommands::MaxPortions { recipe } => cmd_max_portions(pool, &recipe, json).await,
    }
}

/// Read a recipe file, resolve its product names and store it.
async fn cmd_create(pool: &PgPool, file_path: &str, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read recipe file: {file_path}"))?;
    let recipe_toml = parse_recipe_toml(&content)
        .with_context(|| format!("failed to parse recipe file: {file_path}"))?;

    let detail = create_recipe_from_toml(pool, &recipe_toml).await?;
    if json {
        return print_json(&detail);
    }

    println!("Recipe created.");
    println!();
    println!("  Recipe ID:   {}", detail.recipe.id);
    println!("  Name:        {}", detail.recipe.name);
    println!("  Waste rate:  {}%", detail.recipe.waste_rate);
    println!("  Ingredients: {}", detail.lines.len());
    Ok(())
}

async fn cmd_show_all(pool: &PgPool, json: bool) -> Result<()> {
    let recipes = recipe_db::list_recipes(pool).await?;
    if json {
        return print_json(&recipes);
    }
    if recipes.is_empty() {
        println!("No recipes. Use `larder recipe create <file>` to add one.");
        return Ok(());
    }

    let name_w = recipes.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);
    println!("{:<36}  {:<name_w$}  {:>8}  WASTE", "ID", "NAME", "PORTIONS");
    for r in &recipes {
        println!(
            "{:<36}  {:<name_w$}  {:>8}  {}%",
            r.id, r.name, r.base_portions, r.waste_rate
        );
    }
    Ok(())
}

async fn cmd_show_one(pool: &PgPool, input: &str, json: bool) -> Result<()> {
    let recipe = resolve_recipe(pool, input).await?;
    let detail = get_recipe_detail(pool, recipe.id).await?;
    if json {
        return print_json(&detail);
    }

    println!("Recipe: {} ({})", detail.recipe.name, detail.recipe.id);
    println!("Base portions: {}", detail.recipe.base_portions);
    println!("Waste rate: {}%", detail.recipe.waste_rate);
    println!();

    let name_w = detail
        .lines
        .iter()
        .map(|l| l.product_name.len())
        .max()
        .unwrap_or(7)
        .max(7);
    println!("{:<name_w$}  {:>12}  UNIT", "PRODUCT", "PER PORTION");
    for line in &detail.lines {
        println!(
            "{:<name_w$}  {:>12}  {}",
            line.product_name, line.qty_per_portion, line.unit
        );
    }
    Ok(())
}

async fn cmd_max_portions(pool: &PgPool, input: &str, json: bool) -> Result<()> {
    let recipe = resolve_recipe(pool, input).await?;
    let max = simulate::max_portions(pool, recipe.id).await?;
    if json {
        return print_json(&max);
    }

    println!("{}: at most {} portions from free stock", max.recipe_name, max.max_portions);
    if let Some(limit) = &max.limiting {
        println!(
            "  limited by {} ({} free, {} per portion)",
            limit.product_name, limit.available, limit.qty_per_portion
        );
    }
    Ok(())
}
