//! Integration tests for plan confirmation and FEFO holds.

mod common;

use rust_decimal::Decimal;

use larder_core::EngineError;
use larder_core::plan;
use larder_core::reservation::{confirm_plan_on, reserve_for_item};
use larder_core::stock::{get_available_stock_on, get_expiring_stock_on, get_stock_overview_on};
use larder_db::models::PlanStatus;
use larder_db::queries::reservations;
use larder_test_utils::{create_test_db, drop_test_db};

use common::*;

#[tokio::test]
async fn confirm_holds_earliest_expiry_first() {
    let (pool, db_name) = create_test_db().await;
    let milk = product(&pool, "milk").await;
    let l1 = lot(&pool, milk, "L1", 2, "5").await;
    let l2 = lot(&pool, milk, "L2", 10, "10").await;
    let bechamel = recipe(&pool, "bechamel", "0", &[(milk, "1")]).await;
    let draft = draft_plan(&pool, &[(bechamel, 8)]).await;

    let report = confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap();
    assert_eq!(report.items, 1);
    let holds: Vec<(i64, Decimal)> = report.holds.iter().map(|h| (h.lot_id, h.quantity)).collect();
    assert_eq!(holds, vec![(l1, dec("5")), (l2, dec("3"))]);

    let stock = get_available_stock_on(&pool, milk, today()).await.unwrap();
    assert_eq!(stock.on_hand, dec("15"));
    assert_eq!(stock.reserved, dec("8"));
    assert_eq!(stock.available, dec("7"));
    let per_lot: Vec<(i64, Decimal)> = stock.lots.iter().map(|l| (l.lot_id, l.available)).collect();
    assert_eq!(per_lot, vec![(l1, Decimal::ZERO), (l2, dec("7"))]);

    let detail = plan::get_plan_detail(&pool, draft.plan.id).await.unwrap();
    assert_eq!(detail.plan.status, PlanStatus::Confirmed);
    assert!(detail.plan.confirmed_at.is_some());
    assert_eq!(detail.items[0].holds.len(), 2);

    assert_ledger_consistent(&pool).await;
    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn insufficient_stock_leaves_plan_untouched() {
    let (pool, db_name) = create_test_db().await;
    let milk = product(&pool, "milk").await;
    let l1 = lot(&pool, milk, "L1", 2, "5").await;
    let l2 = lot(&pool, milk, "L2", 10, "10").await;
    let bechamel = recipe(&pool, "bechamel", "0", &[(milk, "1")]).await;
    let draft = draft_plan(&pool, &[(bechamel, 20)]).await;

    let err = confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap_err();
    match err {
        EngineError::InsufficientStock {
            product_id,
            shortfall,
            ..
        } => {
            assert_eq!(product_id, milk);
            assert_eq!(shortfall, dec("5"));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    let detail = plan::get_plan_detail(&pool, draft.plan.id).await.unwrap();
    assert_eq!(detail.plan.status, PlanStatus::Draft);
    assert!(detail.plan.confirmed_at.is_none());
    assert_eq!(held(&pool, l1).await, Decimal::ZERO);
    assert_eq!(held(&pool, l2).await, Decimal::ZERO);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn a_short_second_product_rolls_back_the_first() {
    let (pool, db_name) = create_test_db().await;
    let flour = product(&pool, "flour").await;
    let eggs = product(&pool, "eggs").await;
    let flour_lot = lot(&pool, flour, "F1", 30, "10").await;
    lot(&pool, eggs, "E1", 5, "1").await;

    let bread = recipe(&pool, "bread", "0", &[(flour, "1")]).await;
    let omelette = recipe(&pool, "omelette", "0", &[(eggs, "1")]).await;
    let draft = draft_plan(&pool, &[(bread, 4), (omelette, 3)]).await;

    let err = confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap_err();
    assert!(
        matches!(err, EngineError::InsufficientStock { product_id, .. } if product_id == eggs),
        "unexpected error: {err:?}"
    );

    assert_eq!(held(&pool, flour_lot).await, Decimal::ZERO);
    for item in &draft.items {
        let holds = reservations::list_for_item(&pool, item.item.id).await.unwrap();
        assert!(holds.is_empty());
    }
    let detail = plan::get_plan_detail(&pool, draft.plan.id).await.unwrap();
    assert_eq!(detail.plan.status, PlanStatus::Draft);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn items_of_one_plan_do_not_double_book() {
    let (pool, db_name) = create_test_db().await;
    let rice = product(&pool, "rice").await;
    let only = lot(&pool, rice, "R1", 20, "10").await;
    let risotto = recipe(&pool, "risotto", "0", &[(rice, "1")]).await;
    let pilaf = recipe(&pool, "pilaf", "0", &[(rice, "1")]).await;

    let too_much = draft_plan(&pool, &[(risotto, 6), (pilaf, 6)]).await;
    let err = confirm_plan_on(&pool, too_much.plan.id, today()).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { ref shortfall, .. } if *shortfall == dec("2")));
    assert_eq!(held(&pool, only).await, Decimal::ZERO);

    let exact = draft_plan(&pool, &[(risotto, 5), (pilaf, 5)]).await;
    let report = confirm_plan_on(&pool, exact.plan.id, today()).await.unwrap();
    assert_eq!(report.holds.len(), 2);
    assert_eq!(held(&pool, only).await, dec("10"));

    let stock = get_available_stock_on(&pool, rice, today()).await.unwrap();
    assert_eq!(stock.available, Decimal::ZERO);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn waste_rate_and_shared_products_are_summed() {
    let (pool, db_name) = create_test_db().await;
    let butter = product(&pool, "butter").await;
    let bl = lot(&pool, butter, "B1", 9, "10").await;
    // Two lines of the same product, 10% waste: (0.2 + 0.05) * 1.1 * 4 = 1.1
    let pastry = recipe(&pool, "pastry", "10", &[(butter, "0.2"), (butter, "0.05")]).await;
    let draft = draft_plan(&pool, &[(pastry, 4)]).await;

    let report = confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap();
    assert_eq!(report.holds.len(), 1);
    assert_eq!(report.holds[0].lot_id, bl);
    assert_eq!(report.holds[0].quantity, dec("1.1"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn expired_and_archived_lots_are_never_held() {
    let (pool, db_name) = create_test_db().await;
    let cream = product(&pool, "cream").await;
    let stale = lot(&pool, cream, "OLD", -1, "50").await;
    let fresh = lot(&pool, cream, "NEW", 0, "2").await;
    let dessert = recipe(&pool, "panna cotta", "0", &[(cream, "1")]).await;

    let draft = draft_plan(&pool, &[(dessert, 3)]).await;
    let err = confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { .. }));

    let smaller = draft_plan(&pool, &[(dessert, 2)]).await;
    let report = confirm_plan_on(&pool, smaller.plan.id, today()).await.unwrap();
    assert!(report.holds.iter().all(|h| h.lot_id == fresh));
    assert_eq!(held(&pool, stale).await, Decimal::ZERO);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn confirm_requires_a_draft_with_items() {
    let (pool, db_name) = create_test_db().await;
    let oil = product(&pool, "oil").await;
    lot(&pool, oil, "O1", 100, "5").await;
    let dressing = recipe(&pool, "dressing", "0", &[(oil, "0.1")]).await;

    let empty = draft_plan(&pool, &[]).await;
    let err = confirm_plan_on(&pool, empty.plan.id, today()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)), "unexpected error: {err:?}");

    let draft = draft_plan(&pool, &[(dressing, 10)]).await;
    confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap();
    let err = confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap_err();
    assert!(
        matches!(err, EngineError::InvalidTransition { ref status, .. } if status == "confirmed"),
        "unexpected error: {err:?}"
    );

    let err = confirm_plan_on(&pool, uuid::Uuid::new_v4(), today()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "meal plan", .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn reserve_for_item_requires_a_confirmed_unreserved_item() {
    let (pool, db_name) = create_test_db().await;
    let flour = product(&pool, "flour").await;
    let l1 = lot(&pool, flour, "F1", 5, "10").await;
    let bread = recipe(&pool, "bread", "0", &[(flour, "1")]).await;

    // A draft plan's item never gets holds.
    let draft = draft_plan(&pool, &[(bread, 2)]).await;
    let mut tx = pool.begin().await.unwrap();
    let err = reserve_for_item(&mut tx, draft.items[0].item.id, today())
        .await
        .unwrap_err();
    assert!(
        matches!(err, EngineError::InvalidTransition { ref status, .. } if status == "draft"),
        "unexpected error: {err:?}"
    );
    drop(tx);
    assert_eq!(held(&pool, l1).await, Decimal::ZERO);

    // A confirmed item is reserved once.
    let confirmed = draft_plan(&pool, &[(bread, 3)]).await;
    confirm_plan_on(&pool, confirmed.plan.id, today()).await.unwrap();
    let item_id = confirmed.items[0].item.id;
    let mut tx = pool.begin().await.unwrap();
    let err = reserve_for_item(&mut tx, item_id, today()).await.unwrap_err();
    assert!(
        matches!(err, EngineError::InvalidTransition { ref status, .. } if status == "reserved"),
        "unexpected error: {err:?}"
    );
    drop(tx);

    assert_eq!(held(&pool, l1).await, dec("3"));
    let holds = reservations::list_for_item(&pool, item_id).await.unwrap();
    assert_eq!(holds.len(), 1);
    assert_eq!(holds[0].reserved_qty, dec("3"));

    assert_ledger_consistent(&pool).await;
    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn overview_flags_low_products() {
    let (pool, db_name) = create_test_db().await;
    let salt = product(&pool, "salt").await;
    let sugar = product(&pool, "sugar").await;
    lot(&pool, salt, "S1", 300, "0.5").await;
    lot(&pool, sugar, "G1", 300, "4").await;

    let lines = get_stock_overview_on(&pool, today()).await.unwrap();
    let flags: Vec<(&str, bool)> = lines.iter().map(|l| (l.name.as_str(), l.low)).collect();
    // Fixture products alert below 1.
    assert_eq!(flags, vec![("salt", true), ("sugar", false)]);

    let err = get_available_stock_on(&pool, uuid::Uuid::new_v4(), today())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "product", .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn expiring_stock_groups_free_quantity_by_product() {
    let (pool, db_name) = create_test_db().await;
    let milk = product(&pool, "milk").await;
    let eggs = product(&pool, "eggs").await;
    let l1 = lot(&pool, milk, "L1", 1, "5").await;
    let l2 = lot(&pool, milk, "L2", 3, "2").await;
    lot(&pool, milk, "L3", 20, "10").await;
    let e1 = lot(&pool, eggs, "E1", 0, "3").await;

    let bechamel = recipe(&pool, "bechamel", "0", &[(milk, "1")]).await;
    let draft = draft_plan(&pool, &[(bechamel, 4)]).await;
    confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap();

    let report = get_expiring_stock_on(&pool, 3, today()).await.unwrap();
    assert_eq!(report.within_days, 3);
    let names: Vec<&str> = report.products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["eggs", "milk"]);

    let e = &report.products[0];
    assert_eq!(e.total_available, dec("3"));
    assert_eq!(e.total_value, dec("7.20"));
    assert_eq!(e.days_until_expiry, 0);
    assert_eq!(e.lots[0].lot_id, e1);

    // Four of L1's five units are held by the confirmed plan.
    let m = &report.products[1];
    assert_eq!(m.earliest_expiry, day(1));
    assert_eq!(m.days_until_expiry, 1);
    let lots: Vec<(i64, Decimal, i64)> = m
        .lots
        .iter()
        .map(|l| (l.lot_id, l.available, l.days_until_expiry))
        .collect();
    assert_eq!(lots, vec![(l1, dec("1"), 1), (l2, dec("2"), 3)]);
    assert_eq!(m.total_available, dec("3"));

    assert_eq!(report.critical_count, 2);
    assert_eq!(report.total_value, dec("14.40"));

    let err = get_expiring_stock_on(&pool, -1, today()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}
