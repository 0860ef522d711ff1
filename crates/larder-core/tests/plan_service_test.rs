//! Integration tests for plan and recipe authoring.

mod common;

use larder_core::EngineError;
use larder_core::plan::{self, NewItem, NewPlan, parse_plan_toml};
use larder_core::recipe::{self, parse_recipe_toml};
use larder_core::reservation::confirm_plan_on;
use larder_db::models::PlanStatus;
use larder_db::queries::plans;
use larder_test_utils::{create_test_db, drop_test_db};

use common::*;

#[tokio::test]
async fn plans_are_validated_before_anything_is_written() {
    let (pool, db_name) = create_test_db().await;
    let milk = product(&pool, "milk").await;
    let custard = recipe(&pool, "custard", "0", &[(milk, "0.2")]).await;

    let base = NewPlan {
        name: "week".into(),
        period_start: today(),
        period_end: day(6),
        items: vec![NewItem {
            recipe_id: custard,
            planned_portions: 10,
        }],
    };

    let inverted = NewPlan {
        period_start: day(7),
        ..base.clone()
    };
    let err = plan::create_plan(&pool, &inverted).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let nameless = NewPlan {
        name: " ".into(),
        ..base.clone()
    };
    assert!(matches!(
        plan::create_plan(&pool, &nameless).await.unwrap_err(),
        EngineError::InvalidInput(_)
    ));

    let zero = NewPlan {
        items: vec![NewItem {
            recipe_id: custard,
            planned_portions: 0,
        }],
        ..base.clone()
    };
    assert!(matches!(
        plan::create_plan(&pool, &zero).await.unwrap_err(),
        EngineError::InvalidInput(_)
    ));

    let unknown = NewPlan {
        items: vec![NewItem {
            recipe_id: uuid::Uuid::new_v4(),
            planned_portions: 1,
        }],
        ..base.clone()
    };
    assert!(matches!(
        plan::create_plan(&pool, &unknown).await.unwrap_err(),
        EngineError::NotFound { entity: "recipe", .. }
    ));

    assert!(plans::list_plans(&pool, None).await.unwrap().is_empty());

    let created = plan::create_plan(&pool, &base).await.unwrap();
    assert_eq!(created.plan.status, PlanStatus::Draft);
    assert_eq!(created.items.len(), 1);
    assert_eq!(created.items[0].recipe_name, "custard");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn items_can_only_change_while_draft() {
    let (pool, db_name) = create_test_db().await;
    let flour = product(&pool, "flour").await;
    lot(&pool, flour, "F1", 30, "50").await;
    let bread = recipe(&pool, "bread", "0", &[(flour, "0.5")]).await;
    let rolls = recipe(&pool, "rolls", "0", &[(flour, "0.1")]).await;

    let draft = draft_plan(&pool, &[(bread, 10)]).await;
    let added = plan::add_item(&pool, draft.plan.id, rolls, 30).await.unwrap();
    let detail = plan::get_plan_detail(&pool, draft.plan.id).await.unwrap();
    assert_eq!(detail.items.len(), 2);

    let err = plan::add_item(&pool, draft.plan.id, rolls, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let other = draft_plan(&pool, &[(bread, 1)]).await;
    let err = plan::remove_item(&pool, other.plan.id, added.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    plan::remove_item(&pool, draft.plan.id, added.id).await.unwrap();
    let detail = plan::get_plan_detail(&pool, draft.plan.id).await.unwrap();
    assert_eq!(detail.items.len(), 1);

    confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap();

    let err = plan::add_item(&pool, draft.plan.id, rolls, 5).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }), "unexpected error: {err:?}");
    let item_id = draft.items[0].item.id;
    let err = plan::remove_item(&pool, draft.plan.id, item_id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn plans_and_recipes_load_from_files() {
    let (pool, db_name) = create_test_db().await;
    product(&pool, "tomato").await;
    product(&pool, "cream").await;

    let recipe_file = parse_recipe_toml(
        r#"
[recipe]
name = "Tomato soup"
waste_rate = 5

[[ingredients]]
product = "tomato"
qty_per_portion = 0.25

[[ingredients]]
product = "cream"
qty_per_portion = "0.05"
"#,
    )
    .unwrap();
    let soup = recipe::create_recipe_from_toml(&pool, &recipe_file).await.unwrap();
    assert_eq!(soup.lines.len(), 2);
    assert_eq!(soup.lines[0].product_name, "tomato");

    let needs = recipe::recipe_needs(&pool, soup.recipe.id, 40).await.unwrap();
    let mut quantities: Vec<_> = needs.iter().map(|n| (n.product_name.as_str(), n.quantity)).collect();
    quantities.sort();
    // 40 × 0.25 × 1.05 and 40 × 0.05 × 1.05
    assert_eq!(quantities, vec![("cream", dec("2.1")), ("tomato", dec("10.5"))]);

    let plan_file = parse_plan_toml(
        r#"
[plan]
name = "Week 12"
period_start = "2030-03-16"
period_end = "2030-03-22"

[[items]]
recipe = "Tomato soup"
portions = 40
"#,
    )
    .unwrap();
    let created = plan::create_plan_from_toml(&pool, &plan_file).await.unwrap();
    assert_eq!(created.plan.name, "Week 12");
    assert_eq!(created.items[0].item.planned_portions, 40);
    assert_eq!(created.items[0].recipe_name, "Tomato soup");

    let missing = parse_plan_toml(
        r#"
[plan]
name = "Week 13"
period_start = "2030-03-23"
period_end = "2030-03-29"

[[items]]
recipe = "Gazpacho"
portions = 10
"#,
    )
    .unwrap();
    let err = plan::create_plan_from_toml(&pool, &missing).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "recipe", .. }));

    let unknown_product = parse_recipe_toml(
        r#"
[recipe]
name = "Mystery"

[[ingredients]]
product = "unobtainium"
qty_per_portion = 1
"#,
    )
    .unwrap();
    let err = recipe::create_recipe_from_toml(&pool, &unknown_product).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "product", .. }));
    assert!(larder_db::queries::recipes::get_recipe_by_name(&pool, "Mystery")
        .await
        .unwrap()
        .is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}
