//! Plan TOML parser with validation.

use chrono::NaiveDate;
use thiserror::Error;

use super::toml_format::PlanToml;

/// Errors that can occur while parsing and validating a plan file.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("plan name must not be empty")]
    EmptyName,

    #[error("plan period ends on {end} before it starts on {start}")]
    InvertedPeriod { start: NaiveDate, end: NaiveDate },

    #[error("plan must contain at least one item")]
    NoItems,

    #[error("item for recipe {recipe:?} must plan at least one portion (got {portions})")]
    InvalidPortions { recipe: String, portions: i32 },
}

/// Parse and validate a plan file.
pub fn parse_plan_toml(content: &str) -> Result<PlanToml, PlanParseError> {
    let plan: PlanToml = toml::from_str(content)?;
    validate(&plan)?;
    Ok(plan)
}

fn validate(plan: &PlanToml) -> Result<(), PlanParseError> {
    if plan.plan.name.trim().is_empty() {
        return Err(PlanParseError::EmptyName);
    }
    if plan.plan.period_start > plan.plan.period_end {
        return Err(PlanParseError::InvertedPeriod {
            start: plan.plan.period_start,
            end: plan.plan.period_end,
        });
    }
    if plan.items.is_empty() {
        return Err(PlanParseError::NoItems);
    }
    for item in &plan.items {
        if item.portions <= 0 {
            return Err(PlanParseError::InvalidPortions {
                recipe: item.recipe.clone(),
                portions: item.portions,
            });
        }
    }
    Ok(())
}
