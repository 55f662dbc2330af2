mod common;

use chrono::Utc;
use common::*;
use ticketing_engine::AppError;
use ticketing_engine::models::{CheckoutItem, CheckoutRequest};
use ticketing_engine::services::InventoryLedger;

fn request(user_id: i64, event_id: i64, tier_id: i64, units: i32) -> CheckoutRequest {
    CheckoutRequest {
        user_id,
        event_id,
        items: vec![CheckoutItem { tier_id, units }],
        provider: "card".to_string(),
        promo_code: None,
    }
}

#[tokio::test]
async fn reserve_and_release_move_remaining_quantity() {
    let db = setup_db().await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier { quantity: 5, ..Default::default() }).await;

    let reserved = InventoryLedger::reserve(&db, tier.id, 3, Utc::now()).await.unwrap();
    assert_eq!(reserved.remaining_quantity, 2);
    assert_eq!(remaining(&db, tier.id).await, 2);

    let err = InventoryLedger::reserve(&db, tier.id, 3, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientInventory(_)));
    assert_eq!(err.to_string(), "Only 2 units remaining for General Admission");
    assert_eq!(remaining(&db, tier.id).await, 2);

    InventoryLedger::release(&db, tier.id, 3).await.unwrap();
    assert_eq!(remaining(&db, tier.id).await, 5);
}

#[tokio::test]
async fn release_never_exceeds_initial_quantity() {
    let db = setup_db().await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier { quantity: 5, ..Default::default() }).await;

    InventoryLedger::reserve(&db, tier.id, 1, Utc::now()).await.unwrap();
    InventoryLedger::release(&db, tier.id, 4).await.unwrap();
    assert_eq!(remaining(&db, tier.id).await, 5);
}

#[tokio::test]
async fn sold_out_tier_rejects_reservation() {
    let db = setup_db().await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier { quantity: 1, ..Default::default() }).await;

    InventoryLedger::reserve(&db, tier.id, 1, Utc::now()).await.unwrap();
    let err = InventoryLedger::reserve(&db, tier.id, 1, Utc::now()).await.unwrap_err();
    assert_eq!(err.to_string(), "General Admission is sold out");
    assert_eq!(remaining(&db, tier.id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_unit_goes_to_exactly_one_buyer() {
    let db = setup_db().await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier { quantity: 1, ..Default::default() }).await;
    let alice = seed_user(&db, "alice@example.com").await;
    let bob = seed_user(&db, "bob@example.com").await;

    let svc_a = checkout_service(&db);
    let svc_b = checkout_service(&db);
    let req_a = request(alice.id, event.id, tier.id, 1);
    let req_b = request(bob.id, event.id, tier.id, 1);
    let a = tokio::spawn(async move { svc_a.checkout(req_a).await });
    let b = tokio::spawn(async move { svc_b.checkout(req_b).await });
    let results = vec![a.await.unwrap(), b.await.unwrap()];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let shortages = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InsufficientInventory(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(shortages, 1);
    assert_eq!(remaining(&db, tier.id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_never_oversell() {
    let db = setup_db().await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier { quantity: 10, ..Default::default() }).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let user = seed_user(&db, &format!("buyer{i}@example.com")).await;
        let svc = checkout_service(&db);
        let req = request(user.id, event.id, tier.id, 1);
        handles.push(tokio::spawn(async move { svc.checkout(req).await }));
    }

    let mut sold = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(result) => {
                assert_eq!(result.tickets.len(), 1);
                sold += 1;
            }
            Err(err) => assert!(matches!(err, AppError::InsufficientInventory(_))),
        }
    }

    assert_eq!(sold, 10);
    assert_eq!(remaining(&db, tier.id).await, 0);
}
