mod config;
mod execute_cmd;
mod lot_cmds;
mod movements_cmd;
mod plan_cmds;
mod product_cmds;
mod recipe_cmds;
mod resolve;
mod simulate_cmd;
mod stock_cmd;
mod sweep_cmd;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;
use sqlx::PgPool;

use larder_db::models::{MovementKind, PlanStatus};
use larder_db::pool;

use config::LarderConfig;

#[derive(Parser)]
#[command(name = "larder", version, about = "FEFO stock reservation for planned kitchen production")]
struct Cli {
    /// Database URL (overrides LARDER_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Name recorded on ledger entries (overrides LARDER_ACTOR env var)
    #[arg(long, global = true)]
    actor: Option<String>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a larder config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/larder")]
        db_url: String,
        /// Operator name recorded on ledger entries
        #[arg(long)]
        operator: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the larder database and apply migrations
    DbInit,
    /// Product catalogue
    Product {
        #[command(subcommand)]
        command: ProductCommands,
    },
    /// Recipes and their ingredient lines
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Goods receipt, stock counts and lot retirement
    Lot {
        #[command(subcommand)]
        command: LotCommands,
    },
    /// Show free stock (all products, or per lot for one product)
    Stock {
        /// Product name or ID
        #[arg(conflicts_with = "expiring")]
        product: Option<String>,
        /// Only free stock expiring within this many days, by product
        #[arg(long, value_name = "DAYS")]
        expiring: Option<i32>,
    },
    /// Meal plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Record production of a plan item and consume its stock
    Execute {
        /// Meal plan item ID
        item_id: String,
        /// Portions actually produced
        portions: i32,
    },
    /// Write off expired lots and forfeit their holds
    Sweep {
        /// Keep sweeping every N seconds until interrupted
        #[arg(long)]
        every: Option<u64>,
    },
    /// Simulate FEFO consumption for a recipe or a draft plan without
    /// writing anything
    Simulate {
        /// Recipe name or ID
        #[arg(required_unless_present = "plan", conflicts_with = "plan")]
        recipe: Option<String>,
        /// Portions to simulate
        #[arg(long, requires = "recipe", required_unless_present = "plan")]
        portions: Option<i32>,
        /// Simulate every item of this draft plan instead
        #[arg(long)]
        plan: Option<String>,
    },
    /// List stock ledger entries
    Movements {
        /// Only entries for this lot
        #[arg(long)]
        lot: Option<i64>,
        /// Only entries for this meal plan item
        #[arg(long)]
        item: Option<String>,
        /// Only entries of this kind (in, out, adjustment, loss)
        #[arg(long)]
        kind: Option<MovementKind>,
    },
    /// Print a shell completion script
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ProductCommands {
    /// Add a product to the catalogue
    Add {
        name: String,
        /// Unit of measure (kg, l, pcs, ...)
        #[arg(long)]
        unit: String,
        #[arg(long, default_value = "0")]
        unit_cost: Decimal,
        /// Available stock below this is flagged as low
        #[arg(long, default_value = "0")]
        alert_threshold: Decimal,
    },
    /// List all products
    List,
    /// Stop accepting receipts for a product
    Deactivate {
        /// Product name or ID
        product: String,
    },
}

#[derive(Subcommand)]
pub enum RecipeCommands {
    /// Create a recipe from a TOML file
    Create {
        /// Path to the recipe TOML file
        file: String,
    },
    /// Show a recipe's ingredients (or list all recipes)
    Show {
        /// Recipe name or ID (omit to list all)
        recipe: Option<String>,
    },
    /// How many portions free stock allows
    MaxPortions {
        /// Recipe name or ID
        recipe: String,
    },
}

#[derive(Subcommand)]
pub enum LotCommands {
    /// Receive a delivery, merging into an open lot of the same batch
    Receive {
        /// Product name or ID
        product: String,
        #[arg(long)]
        batch: String,
        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: NaiveDate,
        #[arg(long)]
        quantity: Decimal,
    },
    /// Set a lot's quantity after a stock count
    Adjust {
        lot_id: i64,
        /// Counted quantity
        quantity: Decimal,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Archive or delete an empty lot
    Retire { lot_id: i64 },
    /// List lots
    List {
        /// Product name or ID
        #[arg(long)]
        product: Option<String>,
        /// Include archived lots
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a draft plan from a TOML file
    Create {
        /// Path to the plan TOML file
        file: String,
    },
    /// Show a plan with its items and holds
    Show { plan_id: String },
    /// List plans
    List {
        /// Only plans in this status (draft, confirmed, executed)
        #[arg(long)]
        status: Option<PlanStatus>,
    },
    /// Add an item to a draft plan
    AddItem {
        plan_id: String,
        /// Recipe name or ID
        recipe: String,
        portions: i32,
    },
    /// Remove an item from a draft plan
    RemoveItem { plan_id: String, item_id: String },
    /// Reserve stock for every item and confirm the plan
    Confirm { plan_id: String },
}

/// Execute the `larder init` command: write config file.
fn cmd_init(db_url: &str, operator: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
            max_connections: None,
        },
        operator: config::OperatorSection { name: operator },
    };
    config::save_config_to(&path, &cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if let Some(name) = &cfg.operator.name {
        println!("  operator.name = {name}");
    }
    println!();
    println!("Next: run `larder db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `larder db-init` command: create database and run migrations.
async fn cmd_db_init(resolved: &LarderConfig) -> anyhow::Result<()> {
    println!("Initializing larder database...");

    let created = pool::ensure_database_exists(&resolved.db_config).await?;
    if created {
        println!("Created database.");
    } else {
        println!("Database already exists.");
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("larder db-init complete.");
    Ok(())
}

async fn dispatch(command: Commands, pool: &PgPool, actor: &str, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Product { command } => product_cmds::run_product_command(command, pool, json).await,
        Commands::Recipe { command } => recipe_cmds::run_recipe_command(command, pool, json).await,
        Commands::Lot { command } => lot_cmds::run_lot_command(command, pool, actor, json).await,
        Commands::Stock { product, expiring } => {
            stock_cmd::run_stock(pool, product.as_deref(), expiring, json).await
        }
        Commands::Plan { command } => plan_cmds::run_plan_command(command, pool, json).await,
        Commands::Execute { item_id, portions } => {
            execute_cmd::run_execute(pool, &item_id, portions, actor, json).await
        }
        Commands::Sweep { every } => sweep_cmd::run_sweep(pool, actor, every, json).await,
        Commands::Simulate {
            recipe,
            portions,
            plan,
        } => {
            simulate_cmd::run_simulate(pool, recipe.as_deref(), portions, plan.as_deref(), json)
                .await
        }
        Commands::Movements { lot, item, kind } => {
            movements_cmd::run_movements(pool, lot, item.as_deref(), kind, json).await
        }
        Commands::Init { .. } | Commands::DbInit | Commands::Completions { .. } => {
            anyhow::bail!("this command does not run against an open database")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        database_url,
        actor,
        json,
        command,
    } = Cli::parse();

    match command {
        Commands::Init {
            db_url,
            operator,
            force,
        } => cmd_init(&db_url, operator, force),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "larder", &mut std::io::stdout());
            Ok(())
        }
        Commands::DbInit => {
            let resolved = LarderConfig::resolve(database_url.as_deref(), actor.as_deref())?;
            cmd_db_init(&resolved).await
        }
        command => {
            let resolved = LarderConfig::resolve(database_url.as_deref(), actor.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = dispatch(command, &db_pool, &resolved.actor, json).await;
            db_pool.close().await;
            result
        }
    }
}
