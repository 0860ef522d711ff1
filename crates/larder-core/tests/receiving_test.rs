//! Integration tests for goods receipt, stock-count adjustments and lot
//! retirement.

mod common;

use rust_decimal::Decimal;

use larder_core::EngineError;
use larder_core::receiving::{Receipt, RetireOutcome, adjust_lot, receive_lot, retire_lot};
use larder_core::reservation::confirm_plan_on;
use larder_core::sweeper::sweep_expired_lots_on;
use larder_db::models::MovementKind;
use larder_db::queries::movements::{self, MovementFilter};
use larder_db::queries::{lots, products};
use larder_test_utils::{create_test_db, drop_test_db};

use common::*;

fn receipt(product_id: uuid::Uuid, batch: &str, expires_in: i64, qty: &str) -> Receipt {
    Receipt {
        product_id,
        batch_number: batch.into(),
        expiry_date: day(expires_in),
        quantity: dec(qty),
    }
}

#[tokio::test]
async fn receipts_of_the_same_batch_merge() {
    let (pool, db_name) = create_test_db().await;
    let beans = product(&pool, "beans").await;

    let first = receive_lot(&pool, &receipt(beans, "B7", 30, "2"), ACTOR).await.unwrap();
    assert!(!first.merged);
    assert!(first.movement_id.is_some());

    let second = receive_lot(&pool, &receipt(beans, "B7", 30, "3.25"), ACTOR).await.unwrap();
    assert!(second.merged);
    assert_eq!(second.lot.id, first.lot.id);
    assert_eq!(second.lot.quantity, dec("5.25"));

    // Same batch, different expiry: a separate lot.
    let other = receive_lot(&pool, &receipt(beans, "B7", 31, "1"), ACTOR).await.unwrap();
    assert!(!other.merged);
    assert_ne!(other.lot.id, first.lot.id);

    let ins = movements::list_movements(
        &pool,
        &MovementFilter {
            lot_id: Some(first.lot.id),
            kind: Some(MovementKind::In),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(ins.len(), 2);

    assert_ledger_consistent(&pool).await;
    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn archived_lots_are_not_merged_into() {
    let (pool, db_name) = create_test_db().await;
    let peas = product(&pool, "peas").await;
    let old = receive_lot(&pool, &receipt(peas, "P1", -1, "2"), ACTOR).await.unwrap();
    sweep_expired_lots_on(&pool, ACTOR, today()).await.unwrap();

    let again = receive_lot(&pool, &receipt(peas, "P1", -1, "2"), ACTOR).await.unwrap();
    assert!(!again.merged);
    assert_ne!(again.lot.id, old.lot.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn receipts_are_validated_and_rounded() {
    let (pool, db_name) = create_test_db().await;
    let corn = product(&pool, "corn").await;

    let err = receive_lot(&pool, &receipt(corn, "C1", 5, "-1"), ACTOR).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let err = receive_lot(&pool, &receipt(corn, "  ", 5, "1"), ACTOR).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let err = receive_lot(&pool, &receipt(uuid::Uuid::new_v4(), "C1", 5, "1"), ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "product", .. }));

    let rounded = receive_lot(&pool, &receipt(corn, "C1", 5, "1.23456"), ACTOR)
        .await
        .unwrap();
    assert_eq!(rounded.lot.quantity, dec("1.235"));

    products::set_product_active(&pool, corn, false).await.unwrap();
    let err = receive_lot(&pool, &receipt(corn, "C2", 5, "1"), ACTOR).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn adjustments_post_the_signed_difference() {
    let (pool, db_name) = create_test_db().await;
    let ham = product(&pool, "ham").await;
    let lot_id = lot(&pool, ham, "H1", 10, "10").await;

    let down = adjust_lot(&pool, lot_id, dec("7.5"), ACTOR, Some("count")).await.unwrap();
    assert_eq!(down.delta, dec("-2.5"));
    assert_eq!(down.lot.quantity, dec("7.5"));

    let up = adjust_lot(&pool, lot_id, dec("8"), ACTOR, None).await.unwrap();
    assert_eq!(up.delta, dec("0.5"));

    let same = adjust_lot(&pool, lot_id, dec("8"), ACTOR, None).await.unwrap();
    assert_eq!(same.delta, Decimal::ZERO);
    assert!(same.movement_id.is_none());

    let adjustments = movements::list_movements(
        &pool,
        &MovementFilter {
            lot_id: Some(lot_id),
            kind: Some(MovementKind::Adjustment),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let deltas: Vec<Decimal> = adjustments.iter().map(|m| m.quantity).collect();
    assert_eq!(deltas, vec![dec("-2.5"), dec("0.5")]);
    assert_eq!(adjustments[0].reason.as_deref(), Some("count"));

    let err = adjust_lot(&pool, lot_id, dec("-1"), ACTOR, None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    assert_ledger_consistent(&pool).await;
    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn adjustments_cannot_undercut_confirmed_holds() {
    let (pool, db_name) = create_test_db().await;
    let duck = product(&pool, "duck").await;
    let lot_id = lot(&pool, duck, "D1", 10, "10").await;
    let confit = recipe(&pool, "confit", "0", &[(duck, "1")]).await;
    let draft = draft_plan(&pool, &[(confit, 6)]).await;
    confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap();

    let err = adjust_lot(&pool, lot_id, dec("5.999"), ACTOR, None).await.unwrap_err();
    assert!(matches!(err, EngineError::ConsistencyViolation(_)), "unexpected error: {err:?}");
    assert_eq!(lot_quantity(&pool, lot_id).await, dec("10"));

    adjust_lot(&pool, lot_id, dec("6"), ACTOR, None).await.unwrap();
    assert_eq!(lot_quantity(&pool, lot_id).await, dec("6"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn archived_lots_cannot_be_adjusted() {
    let (pool, db_name) = create_test_db().await;
    let figs = product(&pool, "figs").await;
    let lot_id = lot(&pool, figs, "F1", -2, "3").await;
    sweep_expired_lots_on(&pool, ACTOR, today()).await.unwrap();

    let err = adjust_lot(&pool, lot_id, dec("1"), ACTOR, None).await.unwrap_err();
    assert!(
        matches!(err, EngineError::InvalidTransition { ref status, .. } if status == "archived"),
        "unexpected error: {err:?}"
    );

    let err = adjust_lot(&pool, 999_999, dec("1"), ACTOR, None).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "lot", .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn retiring_archives_or_deletes_empty_lots() {
    let (pool, db_name) = create_test_db().await;
    let kale = product(&pool, "kale").await;

    let stocked = lot(&pool, kale, "K1", 10, "2").await;
    let err = retire_lot(&pool, stocked).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    adjust_lot(&pool, stocked, Decimal::ZERO, ACTOR, Some("spoiled")).await.unwrap();
    assert_eq!(retire_lot(&pool, stocked).await.unwrap(), RetireOutcome::Archived);
    assert!(lots::get_lot(&pool, stocked).await.unwrap().unwrap().archived);

    let never_used = lot(&pool, kale, "K2", 10, "0").await;
    assert_eq!(retire_lot(&pool, never_used).await.unwrap(), RetireOutcome::Deleted);
    assert!(lots::get_lot(&pool, never_used).await.unwrap().is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}
