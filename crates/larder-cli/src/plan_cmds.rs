//! Handlers for `larder plan` subcommands.
//!
//! - `larder plan create <file>`                 -- create a draft plan from a TOML file
//! - `larder plan show <plan-id>`                -- items, portions and holds
//! - `larder plan list [--status s]`             -- all plans
//! - `larder plan add-item <plan-id> <recipe> <portions>`
//! - `larder plan remove-item <plan-id> <item-id>`
//! - `larder plan confirm <plan-id>`             -- reserve stock, draft -> confirmed

use anyhow::{Context, Result};
use sqlx::PgPool;

use larder_core::plan::{
    add_item, create_plan_from_toml, get_plan_detail, parse_plan_toml, remove_item,
};
use larder_core::reservation::confirm_plan;
use larder_db::models::PlanStatus;
use larder_db::queries::plans as plan_db;

use crate::PlanCommands;
use crate::resolve::{parse_id, print_json, resolve_recipe};

pub async fn run_plan_command(command: PlanCommands, pool: &PgPool, json: bool) -> Result<()> {
    match command {
        PlanCommands::Create { file } => cmd_create(pool, &file, json).await,
        PlanCommands::Show { plan_id } => cmd_show(pool, &plan_id, json).await,
        PlanCommands::List { status } => cmd_list(pool, status, json).await,
        PlanCommands::AddItem {
            plan_id,
            recipe,
            portions,
        } => cmd_add_item(pool, &plan_id, &recipe, portions).await,
        PlanCommands::RemoveItem { plan_id, item_id } => {
            let plan_id = parse_id("plan", &plan_id)?;
            let item_id = parse_id("item", &item_id)?;
            remove_item(pool, plan_id, item_id).await?;
            println!("Item {item_id} removed from plan {plan_id}.");
            Ok(())
        }
        PlanCommands::Confirm { plan_id } => cmd_confirm(pool, &plan_id, json).await,
    }
}

async fn cmd_create(pool: &PgPool, file_path: &str, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read plan file: {file_path}"))?;
    let plan_toml = parse_plan_toml(&content)
        .with_context(|| format!("failed to parse plan file: {file_path}"))?;

    let detail = create_plan_from_toml(pool, &plan_toml).await?;
    if json {
        return print_json(&detail);
    }

    println!("Plan created.");
    println!();
    println!("  Plan ID: {}", detail.plan.id);
    println!("  Name:    {}", detail.plan.name);
    println!("  Period:  {} .. {}", detail.plan.period_start, detail.plan.period_end);
    println!("  Status:  {}", detail.plan.status);
    println!("  Items:   {}", detail.items.len());
    println!();
    println!("Next: `larder plan confirm {}` to reserve stock.", detail.plan.id);
    Ok(())
}

async fn cmd_show(pool: &PgPool, plan_id: &str, json: bool) -> Result<()> {
    let plan_id = parse_id("plan", plan_id)?;
    let detail = get_plan_detail(pool, plan_id).await?;
    if json {
        return print_json(&detail);
    }

    let plan = &detail.plan;
    println!("Plan: {} ({})", plan.name, plan.id);
    println!("Period: {} .. {}", plan.period_start, plan.period_end);
    println!("Status: {}", plan.status);
    if let Some(at) = plan.confirmed_at {
        println!("Confirmed: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(at) = plan.executed_at {
        println!("Executed: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!();

    if detail.items.is_empty() {
        println!("No items. Use `larder plan add-item` to add one.");
        return Ok(());
    }

    let recipe_w = detail
        .items
        .iter()
        .map(|i| i.recipe_name.len())
        .max()
        .unwrap_or(6)
        .max(6);
    println!(
        "{:<36}  {:<recipe_w$}  {:>7}  {:>8}  HOLDS",
        "ITEM", "RECIPE", "PLANNED", "PRODUCED"
    );
    for item in &detail.items {
        let produced = item
            .item
            .produced_portions
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".into());
        let holds: Vec<String> = item
            .holds
            .iter()
            .map(|h| format!("lot {}: {}", h.lot_id, h.reserved_qty))
            .collect();
        println!(
            "{:<36}  {:<recipe_w$}  {:>7}  {:>8}  {}",
            item.item.id,
            item.recipe_name,
            item.item.planned_portions,
            produced,
            holds.join(", "),
        );
    }
    Ok(())
}

async fn cmd_list(pool: &PgPool, status: Option<PlanStatus>, json: bool) -> Result<()> {
    let plans = plan_db::list_plans(pool, status).await?;
    if json {
        return print_json(&plans);
    }
    if plans.is_empty() {
        println!("No plans found. Use `larder plan create <file>` to create one.");
        return Ok(());
    }

    let name_w = plans.iter().map(|p| p.name.len()).max().unwrap_or(4).max(4);
    println!(
        "{:<36}  {:<name_w$}  {:<9}  {:<10}  {:<10}",
        "ID", "NAME", "STATUS", "START", "END"
    );
    for p in &plans {
        println!(
            "{:<36}  {:<name_w$}  {:<9}  {:<10}  {:<10}",
            p.id,
            p.name,
            p.status.to_string(),
            p.period_start.to_string(),
            p.period_end.to_string(),
        );
    }
    Ok(())
}

async fn cmd_add_item(pool: &PgPool, plan_id: &str, recipe: &str, portions: i32) -> Result<()> {
    let plan_id = parse_id("plan", plan_id)?;
    let recipe = resolve_recipe(pool, recipe).await?;
    let item = add_item(pool, plan_id, recipe.id, portions).await?;
    println!(
        "Added item {} ({} x {}) to plan {plan_id}.",
        item.id, portions, recipe.name
    );
    Ok(())
}

async fn cmd_confirm(pool: &PgPool, plan_id: &str, json: bool) -> Result<()> {
    let plan_id = parse_id("plan", plan_id)?;
    let report = confirm_plan(pool, plan_id).await?;
    if json {
        return print_json(&report);
    }

    println!(
        "Plan {plan_id} confirmed: {} items, {} holds.",
        report.items,
        report.holds.len()
    );
    for hold in &report.holds {
        println!("  item {}  lot {:>8}  {}", hold.item_id, hold.lot_id, hold.quantity);
    }
    Ok(())
}
