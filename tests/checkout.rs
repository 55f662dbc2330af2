mod common;

use async_trait::async_trait;
use common::*;
use std::sync::Arc;
use ticketing_engine::entities::{PaymentStatus, PaymentType, TicketStatus, TicketType};
use ticketing_engine::external::{DiscountOutcome, DiscountValidator, NotificationService};
use ticketing_engine::models::{AdoptCheckoutRequest, CheckoutItem, CheckoutRequest};
use ticketing_engine::services::CheckoutService;
use ticketing_engine::{AppError, AppResult};

/// 固定折扣: "FREE" 全免，"TENOFF" 减 1000
struct FixedDiscounts;

#[async_trait]
impl DiscountValidator for FixedDiscounts {
    async fn validate(
        &self,
        code: &str,
        _user_id: i64,
        _event_id: i64,
        subtotal: i64,
        _product_ids: &[i64],
    ) -> AppResult<DiscountOutcome> {
        Ok(match code {
            "FREE" => DiscountOutcome::Valid {
                discount_amount: subtotal + 500,
                discount_id: 7,
            },
            "TENOFF" => DiscountOutcome::Valid {
                discount_amount: 1000,
                discount_id: 8,
            },
            _ => DiscountOutcome::Invalid {
                reason: format!("Promo code {code} has expired"),
            },
        })
    }
}

fn discounted_service(db: &sea_orm::DatabaseConnection) -> CheckoutService {
    CheckoutService::new(
        db.clone(),
        Arc::new(FixedDiscounts),
        NotificationService::disabled(),
    )
}

fn cart(user_id: i64, event_id: i64, items: &[(i64, i32)]) -> CheckoutRequest {
    CheckoutRequest {
        user_id,
        event_id,
        items: items
            .iter()
            .map(|&(tier_id, units)| CheckoutItem { tier_id, units })
            .collect(),
        provider: "card".to_string(),
        promo_code: None,
    }
}

#[tokio::test]
async fn group_tier_expands_units_into_tickets() {
    let db = setup_db().await;
    let user = seed_user(&db, "group@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let table = seed_tier(
        &db,
        event.id,
        NewTier {
            name: "Table of Four",
            price: 16000,
            tickets_per_unit: 4,
            quantity: 10,
            max_qty_per_order: 3,
        },
    )
    .await;

    let result = checkout_service(&db)
        .checkout(cart(user.id, event.id, &[(table.id, 2)]))
        .await
        .unwrap();

    assert_eq!(result.order.subtotal, 32000);
    assert_eq!(result.order.total_amount, 32000);
    assert_eq!(result.order.payment_status, PaymentStatus::Pending);
    assert_eq!(result.order.payment_type, PaymentType::Full);
    assert!(result.order.provider_ref.starts_with("ord_"));
    assert_eq!(result.tickets.len(), 8);
    assert!(result.tickets.iter().all(|t| t.status == TicketStatus::Pending));
    assert!(result.tickets.iter().all(|t| t.holder_id == Some(user.id)));
    assert_eq!(remaining(&db, table.id).await, 8);
}

#[tokio::test]
async fn failing_line_rolls_back_the_whole_cart() {
    let db = setup_db().await;
    let user = seed_user(&db, "cart@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let general = seed_tier(&db, event.id, NewTier::default()).await;
    let vip = seed_tier(
        &db,
        event.id,
        NewTier {
            name: "VIP",
            price: 20000,
            quantity: 1,
            ..Default::default()
        },
    )
    .await;

    let err = checkout_service(&db)
        .checkout(cart(user.id, event.id, &[(general.id, 2), (vip.id, 2)]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientInventory(_)));
    assert_eq!(remaining(&db, general.id).await, 100);
    assert_eq!(remaining(&db, vip.id).await, 1);
}

#[tokio::test]
async fn cart_lines_are_reserved_in_tier_order() {
    let db = setup_db().await;
    let user = seed_user(&db, "order@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let general = seed_tier(&db, event.id, NewTier::default()).await;
    let vip = seed_tier(
        &db,
        event.id,
        NewTier {
            name: "VIP",
            price: 20000,
            ..Default::default()
        },
    )
    .await;

    let result = checkout_service(&db)
        .checkout(cart(user.id, event.id, &[(vip.id, 1), (general.id, 2), (vip.id, 1)]))
        .await
        .unwrap();

    let tiers: Vec<i64> = result.tickets.iter().map(|t| t.tier_id).collect();
    assert_eq!(tiers, vec![general.id, general.id, vip.id, vip.id]);
    assert_eq!(result.order.subtotal, 2 * 5000 + 2 * 20000);
    assert_eq!(remaining(&db, general.id).await, 98);
    assert_eq!(remaining(&db, vip.id).await, 98);
}

#[tokio::test]
async fn repeated_lines_that_overflow_are_rejected() {
    let db = setup_db().await;
    let user = seed_user(&db, "huge@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier::default()).await;

    let err = checkout_service(&db)
        .checkout(cart(user.id, event.id, &[(tier.id, i32::MAX), (tier.id, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(remaining(&db, tier.id).await, 100);
}

#[tokio::test]
async fn per_order_limit_is_enforced() {
    let db = setup_db().await;
    let user = seed_user(&db, "limit@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier { max_qty_per_order: 4, ..Default::default() }).await;

    let err = checkout_service(&db)
        .checkout(cart(user.id, event.id, &[(tier.id, 3), (tier.id, 2)]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::TierUnavailable(_)));
    assert_eq!(remaining(&db, tier.id).await, 100);
}

#[tokio::test]
async fn tier_from_another_event_is_rejected() {
    let db = setup_db().await;
    let user = seed_user(&db, "mixup@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let other = seed_event(&db, EventOptions::default()).await;
    let foreign = seed_tier(&db, other.id, NewTier::default()).await;

    let err = checkout_service(&db)
        .checkout(cart(user.id, event.id, &[(foreign.id, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(remaining(&db, foreign.id).await, 100);
}

#[tokio::test]
async fn full_discount_settles_immediately() {
    let db = setup_db().await;
    let user = seed_user(&db, "free@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier::default()).await;

    let mut request = cart(user.id, event.id, &[(tier.id, 2)]);
    request.promo_code = Some("FREE".to_string());
    let result = discounted_service(&db).checkout(request).await.unwrap();

    assert_eq!(result.order.discount_amount, 10000);
    assert_eq!(result.order.discount_id, Some(7));
    assert_eq!(result.order.total_amount, 0);
    assert_eq!(result.order.payment_status, PaymentStatus::Paid);
    assert!(result.order.paid_at.is_some());
    assert!(result.tickets.iter().all(|t| t.status == TicketStatus::Issued));
}

#[tokio::test]
async fn partial_discount_reduces_total() {
    let db = setup_db().await;
    let user = seed_user(&db, "tenoff@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier::default()).await;

    let mut request = cart(user.id, event.id, &[(tier.id, 1)]);
    request.promo_code = Some("TENOFF".to_string());
    let result = discounted_service(&db).checkout(request).await.unwrap();

    assert_eq!(result.order.subtotal, 5000);
    assert_eq!(result.order.total_amount, 4000);
    assert_eq!(result.order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn invalid_promo_code_releases_reservation() {
    let db = setup_db().await;
    let user = seed_user(&db, "promo@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier::default()).await;

    let mut request = cart(user.id, event.id, &[(tier.id, 2)]);
    request.promo_code = Some("BOGUS".to_string());
    let err = discounted_service(&db).checkout(request).await.unwrap_err();

    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(err.to_string(), "Validation error: Promo code BOGUS has expired");
    assert_eq!(remaining(&db, tier.id).await, 100);
}

#[tokio::test]
async fn adoption_requires_lottery_event() {
    let db = setup_db().await;
    let user = seed_user(&db, "donor@example.com").await;
    let event = seed_event(&db, EventOptions::default()).await;
    let tier = seed_tier(&db, event.id, NewTier::default()).await;

    let err = checkout_service(&db)
        .adopt_checkout(AdoptCheckoutRequest {
            user_id: user.id,
            event_id: event.id,
            tier_id: tier.id,
            units: 1,
            provider: "card".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(remaining(&db, tier.id).await, 100);
}

#[tokio::test]
async fn adopted_tickets_have_no_holder() {
    let db = setup_db().await;
    let user = seed_user(&db, "donor@example.com").await;
    let event = seed_event(
        &db,
        EventOptions {
            lottery_enabled: true,
            ..Default::default()
        },
    )
    .await;
    let tier = seed_tier(&db, event.id, NewTier::default()).await;

    let result = checkout_service(&db)
        .adopt_checkout(AdoptCheckoutRequest {
            user_id: user.id,
            event_id: event.id,
            tier_id: tier.id,
            units: 3,
            provider: "card".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(result.tickets.len(), 3);
    for ticket in &result.tickets {
        assert_eq!(ticket.ticket_type, TicketType::Adopted);
        assert_eq!(ticket.status, TicketStatus::Pending);
        assert_eq!(ticket.holder_id, None);
        assert_eq!(ticket.purchaser_id, user.id);
    }
    assert_eq!(remaining(&db, tier.id).await, 97);
}
