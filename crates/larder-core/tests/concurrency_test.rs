//! Concurrent confirmations, executions and sweeps must never over-reserve
//! or over-consume a lot.

mod common;

use futures::future::join_all;
use rust_decimal::Decimal;

use larder_core::EngineError;
use larder_core::execution::execute_item_on;
use larder_core::reservation::confirm_plan_on;
use larder_core::sweeper::sweep_expired_lots_on;
use larder_test_utils::{create_test_db, drop_test_db};

use common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_confirmations_cannot_overbook_a_lot() {
    let (pool, db_name) = create_test_db().await;
    let veal = product(&pool, "veal").await;
    let only = lot(&pool, veal, "V1", 10, "10").await;
    let roast = recipe(&pool, "roast", "0", &[(veal, "1")]).await;

    let a = draft_plan(&pool, &[(roast, 6)]).await;
    let b = draft_plan(&pool, &[(roast, 6)]).await;

    let (ra, rb) = tokio::join!(
        tokio::spawn({
            let pool = pool.clone();
            async move { confirm_plan_on(&pool, a.plan.id, today()).await }
        }),
        tokio::spawn({
            let pool = pool.clone();
            async move { confirm_plan_on(&pool, b.plan.id, today()).await }
        }),
    );
    let results = [ra.unwrap(), rb.unwrap()];

    let confirmed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(confirmed, 1, "exactly one plan fits: {results:?}");
    assert!(results.iter().any(|r| matches!(r, Err(EngineError::InsufficientStock { .. }))));
    assert_eq!(held(&pool, only).await, dec("6"));

    assert_ledger_consistent(&pool).await;
    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_small_confirmations_fill_a_lot_exactly() {
    let (pool, db_name) = create_test_db().await;
    let lamb = product(&pool, "lamb").await;
    let first = lot(&pool, lamb, "A", 5, "6").await;
    let second = lot(&pool, lamb, "B", 8, "6").await;
    let shank = recipe(&pool, "shank", "0", &[(lamb, "2")]).await;

    let mut plan_ids = Vec::new();
    for _ in 0..8 {
        plan_ids.push(draft_plan(&pool, &[(shank, 1)]).await.plan.id);
    }

    let tasks = plan_ids.into_iter().map(|id| {
        let pool = pool.clone();
        tokio::spawn(async move { confirm_plan_on(&pool, id, today()).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    // 12 in stock, 2 per plan: six fit.
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 6);
    assert_eq!(held(&pool, first).await, dec("6"));
    assert_eq!(held(&pool, second).await, dec("6"));

    assert_ledger_consistent(&pool).await;
    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_executions_of_one_item_consume_once() {
    let (pool, db_name) = create_test_db().await;
    let pork = product(&pool, "pork").await;
    let pl = lot(&pool, pork, "P1", 10, "10").await;
    let chops = recipe(&pool, "chops", "0", &[(pork, "1")]).await;
    let draft = draft_plan(&pool, &[(chops, 4)]).await;
    confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap();
    let item_id = draft.items[0].item.id;

    let tasks = (0..4).map(|_| {
        let pool = pool.clone();
        tokio::spawn(async move { execute_item_on(&pool, item_id, 4, ACTOR, today()).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, EngineError::InvalidTransition { .. })),
        "unexpected results: {results:?}"
    );
    assert_eq!(lot_quantity(&pool, pl).await, dec("6"));
    assert_eq!(held(&pool, pl).await, Decimal::ZERO);

    assert_ledger_consistent(&pool).await;
    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn execution_and_sweep_interleave_safely() {
    let (pool, db_name) = create_test_db().await;
    let tuna = product(&pool, "tuna").await;
    let expiring = lot(&pool, tuna, "T1", 1, "3").await;
    let fresh = lot(&pool, tuna, "T2", 9, "10").await;
    let tartare = recipe(&pool, "tartare", "0", &[(tuna, "1")]).await;
    let draft = draft_plan(&pool, &[(tartare, 5)]).await;
    confirm_plan_on(&pool, draft.plan.id, today()).await.unwrap();
    let item_id = draft.items[0].item.id;

    let (exec, sweep) = tokio::join!(
        tokio::spawn({
            let pool = pool.clone();
            async move { execute_item_on(&pool, item_id, 5, ACTOR, day(2)).await }
        }),
        tokio::spawn({
            let pool = pool.clone();
            async move { sweep_expired_lots_on(&pool, ACTOR, day(2)).await }
        }),
    );
    let exec = exec.unwrap().unwrap();
    let sweep = sweep.unwrap().unwrap();

    // Whichever ran first, the expired lot is written off and the item is
    // served entirely from the fresh one.
    assert_eq!(sweep.lots_processed, 1);
    assert_eq!(sweep.total_loss, dec("3"));
    assert!(exec.consumed.iter().all(|c| c.lot_id == fresh));
    assert_eq!(exec.total_consumed(), dec("5"));
    assert_eq!(lot_quantity(&pool, expiring).await, Decimal::ZERO);
    assert_eq!(lot_quantity(&pool, fresh).await, dec("5"));

    assert_ledger_consistent(&pool).await;
    pool.close().await;
    drop_test_db(&db_name).await;
}
