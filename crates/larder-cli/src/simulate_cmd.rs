//! `larder simulate`: what-if FEFO consumption for a recipe or a draft plan.

use anyhow::{Result, bail};
use sqlx::PgPool;

use larder_core::simulate::{self, Simulation, URGENT_WITHIN_DAYS};

use crate::resolve::{parse_id, print_json, resolve_recipe};

pub async fn run_simulate(
    pool: &PgPool,
    recipe: Option<&str>,
    portions: Option<i32>,
    plan: Option<&str>,
    json: bool,
) -> Result<()> {
    match (plan, recipe, portions) {
        (Some(plan), _, _) => run_plan(pool, plan, json).await,
        (None, Some(recipe), Some(portions)) => run_recipe(pool, recipe, portions, json).await,
        _ => bail!("give a recipe with --portions, or --plan"),
    }
}

async fn run_recipe(pool: &PgPool, input: &str, portions: i32, json: bool) -> Result<()> {
    let recipe = resolve_recipe(pool, input).await?;
    let sim = simulate::simulate_recipe(pool, recipe.id, portions).await?;
    if json {
        return print_json(&sim);
    }

    println!(
        "{} x {}: {}",
        portions,
        recipe.name,
        if sim.feasible { "feasible" } else { "NOT feasible" }
    );
    print_simulation(&sim);
    Ok(())
}

async fn run_plan(pool: &PgPool, input: &str, json: bool) -> Result<()> {
    let plan_id = parse_id("meal plan", input)?;
    let sim = simulate::simulate_plan(pool, plan_id).await?;
    if json {
        return print_json(&sim);
    }

    println!("Plan {plan_id}");
    for item in &sim.items {
        println!(
            "  {:>4} x {:<24} {}",
            item.portions,
            item.recipe_name,
            if item.simulation.feasible { "feasible alone" } else { "NOT feasible" }
        );
    }
    println!();
    println!(
        "All items together: {}",
        if sim.all_feasible { "feasible" } else { "NOT feasible" }
    );
    print_simulation(&sim.combined);
    Ok(())
}

fn print_simulation(sim: &Simulation) {
    println!("Urgency score: {}", sim.urgency_score);
    println!(
        "Ingredients using stock expiring within {URGENT_WITHIN_DAYS} days: {}",
        sim.urgent_ingredients
    );

    if !sim.lots_used.is_empty() {
        println!();
        let name_w = sim
            .lots_used
            .iter()
            .map(|l| l.product_name.len())
            .max()
            .unwrap_or(7)
            .max(7);
        println!(
            "{:<name_w$}  {:>8}  {:>12}  {:<10}  DAYS",
            "PRODUCT", "LOT", "QUANTITY", "EXPIRY"
        );
        for l in &sim.lots_used {
            println!(
                "{:<name_w$}  {:>8}  {:>12}  {:<10}  {}",
                l.product_name,
                l.lot_id,
                l.quantity,
                l.expiry_date.to_string(),
                l.days_until_expiry
            );
        }
    }

    if !sim.shortages.is_empty() {
        println!();
        println!("Shortages:");
        for s in &sim.shortages {
            println!(
                "  {}: need {}, {} free, short {}",
                s.product_name, s.needed, s.available, s.deficit
            );
        }
    }
}
