//! Meal plans: the state machine, plan files and draft editing.

pub mod parser;
pub mod service;
pub mod state;
pub mod toml_format;

pub use parser::{PlanParseError, parse_plan_toml};
pub use service::{
    ItemDetail, NewItem, NewPlan, PlanDetail, add_item, create_plan, create_plan_from_toml,
    get_plan_detail, remove_item,
};
pub use state::MealPlanStateMachine;
pub use toml_format::{ItemToml, PlanMeta, PlanToml};
