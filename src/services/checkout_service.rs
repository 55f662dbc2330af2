use crate::entities::{
    PaymentStatus, PaymentType, TicketStatus, TicketType, event_entity as events,
    order_entity as orders, ticket_entity as tickets, ticket_tier_entity as tiers,
};
use crate::error::{AppError, AppResult};
use crate::external::{DiscountOutcome, DiscountValidator, NotificationService};
use crate::models::{
    AdoptCheckoutRequest, CheckoutItem, CheckoutRequest, CheckoutResult, normalize_items,
};
use crate::services::InventoryLedger;
use crate::utils::{generate_provider_ref, generate_qr_code_hash};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;

/// 已完成库存预留的一行
pub(crate) struct ReservedLine {
    pub tier: tiers::Model,
    pub units: i32,
}

/// 一次结账中全部行的预留结果
pub(crate) struct Reservation {
    pub lines: Vec<ReservedLine>,
    pub subtotal: i64,
}

/// 订单落库所需的字段
pub(crate) struct NewOrder {
    pub user_id: i64,
    pub event_id: i64,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub discount_id: Option<i64>,
    pub payment_type: PaymentType,
    pub layaway_deadline: Option<DateTime<Utc>>,
    pub provider: String,
}

#[derive(Clone)]
pub struct CheckoutService {
    pool: DatabaseConnection,
    discounts: Arc<dyn DiscountValidator>,
    notifier: NotificationService,
}

impl CheckoutService {
    pub fn new(
        pool: DatabaseConnection,
        discounts: Arc<dyn DiscountValidator>,
        notifier: NotificationService,
    ) -> Self {
        Self {
            pool,
            discounts,
            notifier,
        }
    }

    /// 普通 / 团体结账
    ///
    /// 逻辑:
    /// 1. 逐行锁定票档、校验并扣减库存，累计小计
    /// 2. 所有行成功后调用外部优惠引擎，折后金额最低为 0
    /// 3. 创建订单与 PENDING 门票 (units × tickets_per_unit 张)
    /// 4. 折后金额为 0 时直接标记 PAID 并出票
    ///
    /// 任一步失败整个事务回滚，不会留下部分预留。
    pub async fn checkout(&self, request: CheckoutRequest) -> AppResult<CheckoutResult> {
        let items = normalize_items(&request.items)?;
        let now = Utc::now();

        let txn = self.pool.begin().await?;

        load_event(&txn, request.event_id).await?;
        let reservation = reserve_items(&txn, request.event_id, &items, now).await?;

        let (discount_amount, discount_id) = match request.promo_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                let product_ids: Vec<i64> = reservation.lines.iter().map(|l| l.tier.id).collect();
                match self
                    .discounts
                    .validate(
                        code.trim(),
                        request.user_id,
                        request.event_id,
                        reservation.subtotal,
                        &product_ids,
                    )
                    .await?
                {
                    DiscountOutcome::Valid {
                        discount_amount,
                        discount_id,
                    } => (discount_amount.clamp(0, reservation.subtotal), Some(discount_id)),
                    DiscountOutcome::Invalid { reason } => {
                        return Err(AppError::ValidationError(reason));
                    }
                }
            }
            _ => (0, None),
        };

        let order = insert_order(
            &txn,
            NewOrder {
                user_id: request.user_id,
                event_id: request.event_id,
                subtotal: reservation.subtotal,
                discount_amount,
                discount_id,
                payment_type: PaymentType::Full,
                layaway_deadline: None,
                provider: request.provider,
            },
            now,
        )
        .await?;

        let tickets = create_tickets(
            &txn,
            &order,
            &reservation,
            TicketType::Standard,
            Some(request.user_id),
            now,
        )
        .await?;

        txn.commit().await?;

        log::info!(
            "Order {} created for user {} (event {}): {} tickets, total {}, status {}",
            order.id,
            order.user_id,
            order.event_id,
            tickets.len(),
            order.total_amount,
            order.payment_status
        );
        if order.payment_status == PaymentStatus::Paid {
            self.notifier.order_paid(&order);
        }

        Ok(CheckoutResult { order, tickets })
    }

    /// Adopt-a-ticket 结账：门票无持票人，付款后进入抽签池
    pub async fn adopt_checkout(&self, request: AdoptCheckoutRequest) -> AppResult<CheckoutResult> {
        let items = normalize_items(&[CheckoutItem {
            tier_id: request.tier_id,
            units: request.units,
        }])?;
        let now = Utc::now();

        let txn = self.pool.begin().await?;

        let event = load_event(&txn, request.event_id).await?;
        if !event.lottery_enabled {
            return Err(AppError::InvalidState(format!(
                "Ticket adoption is not enabled for {}",
                event.name
            )));
        }

        let reservation = reserve_items(&txn, request.event_id, &items, now).await?;

        let order = insert_order(
            &txn,
            NewOrder {
                user_id: request.user_id,
                event_id: request.event_id,
                subtotal: reservation.subtotal,
                discount_amount: 0,
                discount_id: None,
                payment_type: PaymentType::Full,
                layaway_deadline: None,
                provider: request.provider,
            },
            now,
        )
        .await?;

        let tickets =
            create_tickets(&txn, &order, &reservation, TicketType::Adopted, None, now).await?;

        txn.commit().await?;

        log::info!(
            "Adoption order {} created for user {} (event {}): {} tickets",
            order.id,
            order.user_id,
            order.event_id,
            tickets.len()
        );
        if order.payment_status == PaymentStatus::Paid {
            self.notifier.order_paid(&order);
        }

        Ok(CheckoutResult { order, tickets })
    }
}

pub(crate) async fn load_event<C: ConnectionTrait>(
    conn: &C,
    event_id: i64,
) -> AppResult<events::Model> {
    events::Entity::find_by_id(event_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))
}

/// 逐行锁定并扣减库存；票档必须属于该活动
/// items 须来自 `normalize_items`，按 tier_id 升序加锁
pub(crate) async fn reserve_items<C: ConnectionTrait>(
    conn: &C,
    event_id: i64,
    items: &[CheckoutItem],
    now: DateTime<Utc>,
) -> AppResult<Reservation> {
    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal: i64 = 0;

    for item in items {
        let tier = InventoryLedger::lock_tier(conn, item.tier_id).await?;
        if tier.event_id != event_id {
            return Err(AppError::ValidationError(format!(
                "Ticket tier {} does not belong to event {}",
                tier.id, event_id
            )));
        }
        let tier = InventoryLedger::reserve_locked(conn, tier, item.units, now).await?;
        subtotal += tier.price * i64::from(item.units);
        lines.push(ReservedLine {
            tier,
            units: item.units,
        });
    }

    Ok(Reservation { lines, subtotal })
}

/// 写入订单。折后金额 <= 0 的普通订单直接视为已付款。
pub(crate) async fn insert_order<C: ConnectionTrait>(
    conn: &C,
    new_order: NewOrder,
    now: DateTime<Utc>,
) -> AppResult<orders::Model> {
    let total = (new_order.subtotal - new_order.discount_amount).max(0);
    let settled = total == 0 && new_order.payment_type == PaymentType::Full;
    let status = if settled {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Pending
    };

    let order = orders::ActiveModel {
        user_id: Set(new_order.user_id),
        event_id: Set(new_order.event_id),
        subtotal: Set(new_order.subtotal),
        discount_amount: Set(new_order.discount_amount),
        discount_id: Set(new_order.discount_id),
        total_amount: Set(total),
        amount_paid: Set(0),
        payment_status: Set(status),
        payment_type: Set(new_order.payment_type),
        layaway_deadline: Set(new_order.layaway_deadline),
        payment_provider: Set(new_order.provider),
        provider_ref: Set(generate_provider_ref()),
        provider_transaction_id: Set(None),
        payment_metadata: Set(None),
        failure_reason: Set(None),
        paid_at: Set(settled.then_some(now)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(order)
}

/// 为每行生成 units × tickets_per_unit 张门票
pub(crate) async fn create_tickets<C: ConnectionTrait>(
    conn: &C,
    order: &orders::Model,
    reservation: &Reservation,
    ticket_type: TicketType,
    holder_id: Option<i64>,
    now: DateTime<Utc>,
) -> AppResult<Vec<tickets::Model>> {
    let status = if order.payment_status == PaymentStatus::Paid {
        TicketStatus::activated(ticket_type)
    } else {
        TicketStatus::Pending
    };

    let mut rows = Vec::new();
    for line in &reservation.lines {
        for _ in 0..line.tier.tickets_for_units(line.units) {
            rows.push(tickets::ActiveModel {
                event_id: Set(order.event_id),
                tier_id: Set(line.tier.id),
                order_id: Set(order.id),
                purchaser_id: Set(order.user_id),
                holder_id: Set(holder_id),
                ticket_type: Set(ticket_type),
                status: Set(status),
                qr_code_hash: Set(generate_qr_code_hash(line.tier.id, holder_id)),
                checked_in_at: Set(None),
                checked_in_by: Set(None),
                checked_in_gate: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            });
        }
    }

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    tickets::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await?;

    let created = tickets::Entity::find()
        .filter(tickets::Column::OrderId.eq(order.id))
        .order_by_asc(tickets::Column::Id)
        .all(conn)
        .await?;
    Ok(created)
}
