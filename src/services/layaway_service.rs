use crate::config::LayawayConfig;
use crate::entities::{
    PartialPaymentStatus, PaymentStatus, PaymentType, TicketType, order_entity as orders,
    partial_payment_entity as payments,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    LayawayCheckoutRequest, LayawayCheckoutResult, LayawayTopUpRequest, normalize_items,
};
use crate::services::checkout_service::{
    NewOrder, create_tickets, insert_order, load_event, reserve_items,
};
use crate::services::settlement_service::lock_order;
use crate::services::{InventoryLedger, SettlementService};
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};

/// 分期付款 (layaway)
///
/// 下单时与普通结账一样锁定库存并生成 PENDING 门票，首付交给结算发起；
/// 之后用户可多次补款，直到付清时门票才会出票。
#[derive(Clone)]
pub struct LayawayService {
    pool: DatabaseConnection,
    config: LayawayConfig,
}

impl LayawayService {
    pub fn new(pool: DatabaseConnection, config: LayawayConfig) -> Self {
        Self { pool, config }
    }

    pub async fn checkout_layaway(
        &self,
        request: LayawayCheckoutRequest,
    ) -> AppResult<LayawayCheckoutResult> {
        let items = normalize_items(&request.items)?;
        if request.initial_amount <= 0 {
            return Err(AppError::ValidationError(
                "Initial payment must be positive".into(),
            ));
        }
        let now = Utc::now();
        let deadline = match request.deadline {
            Some(deadline) if deadline <= now => {
                return Err(AppError::ValidationError(
                    "Layaway deadline must be in the future".into(),
                ));
            }
            Some(deadline) => deadline,
            None => now + Duration::days(self.config.default_deadline_days),
        };

        let txn = self.pool.begin().await?;

        let event = load_event(&txn, request.event_id).await?;
        if !event.allows_layaway {
            return Err(AppError::InvalidState(format!(
                "Layaway is not available for {}",
                event.name
            )));
        }

        let reservation = reserve_items(&txn, request.event_id, &items, now).await?;
        let total = reservation.subtotal;

        if request.initial_amount >= total {
            return Err(AppError::ValidationError(
                "Initial payment covers the full amount, use standard checkout instead".into(),
            ));
        }
        let minimum = minimum_initial_payment(total, &self.config);
        if request.initial_amount < minimum {
            return Err(AppError::ValidationError(format!(
                "Initial payment must be at least {minimum}"
            )));
        }

        let order = insert_order(
            &txn,
            NewOrder {
                user_id: request.user_id,
                event_id: request.event_id,
                subtotal: total,
                discount_amount: 0,
                discount_id: None,
                payment_type: PaymentType::Layaway,
                layaway_deadline: Some(deadline),
                provider: request.provider.clone(),
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

        let initial_payment = SettlementService::initiate_partial_payment(
            &txn,
            &order,
            request.initial_amount,
            &request.provider,
        )
        .await?;

        txn.commit().await?;

        log::info!(
            "Layaway order {} created for user {}: total {}, initial {}, deadline {}",
            order.id,
            order.user_id,
            order.total_amount,
            request.initial_amount,
            deadline
        );

        Ok(LayawayCheckoutResult {
            order,
            tickets,
            initial_payment,
        })
    }

    /// 补款：金额不得超过待付余额，且不少于 min(最低额, 余额)
    pub async fn top_up(&self, request: LayawayTopUpRequest) -> AppResult<payments::Model> {
        if request.amount <= 0 {
            return Err(AppError::ValidationError(
                "Payment amount must be positive".into(),
            ));
        }

        let txn = self.pool.begin().await?;
        let order = lock_order(&txn, request.order_id).await?;

        if !order.is_layaway() {
            return Err(AppError::InvalidState(format!(
                "Order {} is not a layaway order",
                order.id
            )));
        }
        match order.payment_status {
            PaymentStatus::Paid => {
                return Err(AppError::InvalidState(format!(
                    "Order {} is already fully paid",
                    order.id
                )));
            }
            PaymentStatus::Failed | PaymentStatus::Refunded => {
                return Err(AppError::InvalidState(format!(
                    "Order {} is {} and no longer accepts payments",
                    order.id, order.payment_status
                )));
            }
            PaymentStatus::Pending | PaymentStatus::Partial => {}
        }
        if let Some(deadline) = order.layaway_deadline.filter(|d| *d < Utc::now()) {
            // 过期分期不会自动处理，留给人工跟进
            log::warn!(
                "Top-up rejected for order {}: layaway deadline {deadline} passed with {} of {} paid, manual follow-up required",
                order.provider_ref,
                order.amount_paid,
                order.total_amount
            );
            return Err(AppError::InvalidState(format!(
                "Layaway deadline for order {} has passed",
                order.id
            )));
        }

        let balance = order.balance_due();
        if request.amount > balance {
            return Err(AppError::ValidationError(format!(
                "Payment of {} exceeds the balance due of {balance}",
                request.amount
            )));
        }
        let minimum = minimum_top_up(balance, &self.config);
        if request.amount < minimum {
            return Err(AppError::ValidationError(format!(
                "Payment must be at least {minimum}"
            )));
        }

        let payment =
            SettlementService::initiate_partial_payment(&txn, &order, request.amount, &request.provider)
                .await?;
        txn.commit().await?;
        Ok(payment)
    }

    /// 取消分期订单：取消未出票门票、归还库存、作废待处理付款
    ///
    /// 已付金额 > 0 时订单记为 REFUNDED (退款由外部执行)，否则记为 FAILED。
    pub async fn cancel_layaway(&self, order_id: i64, user_id: i64) -> AppResult<orders::Model> {
        let txn = self.pool.begin().await?;
        let order = lock_order(&txn, order_id).await?;

        if order.user_id != user_id {
            return Err(AppError::NotFound(format!("Order {order_id} not found")));
        }
        if !order.is_layaway() {
            return Err(AppError::InvalidState(format!(
                "Order {order_id} is not a layaway order"
            )));
        }
        match order.payment_status {
            PaymentStatus::Paid => {
                return Err(AppError::InvalidState(format!(
                    "Order {order_id} is fully paid and cannot be cancelled"
                )));
            }
            PaymentStatus::Failed | PaymentStatus::Refunded => {
                return Err(AppError::InvalidState(format!(
                    "Order {order_id} is already closed"
                )));
            }
            PaymentStatus::Pending | PaymentStatus::Partial => {}
        }

        let released = InventoryLedger::release_order_reservation(&txn, order.id).await?;

        payments::Entity::update_many()
            .col_expr(
                payments::Column::Status,
                Expr::value(PartialPaymentStatus::Failed),
            )
            .col_expr(
                payments::Column::FailureReason,
                Expr::value("Layaway cancelled"),
            )
            .filter(payments::Column::OrderId.eq(order.id))
            .filter(payments::Column::Status.eq(PartialPaymentStatus::Pending))
            .exec(&txn)
            .await?;

        let next_status = if order.amount_paid > 0 {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::Failed
        };
        let mut am = order.into_active_model();
        am.payment_status = Set(next_status);
        am.failure_reason = Set(Some("Layaway cancelled by customer".to_string()));
        am.updated_at = Set(Utc::now());
        let updated = am.update(&txn).await?;

        txn.commit().await?;

        log::info!(
            "Layaway order {} cancelled ({}), released {:?}",
            updated.id,
            updated.payment_status,
            released
        );
        Ok(updated)
    }
}

/// 首付下限: max(固定下限, total × 百分比)，百分比部分向上取整
pub fn minimum_initial_payment(total: i64, config: &LayawayConfig) -> i64 {
    let percent_part = (total * config.min_initial_percent + 99) / 100;
    config.min_payment_floor.max(percent_part)
}

/// 补款下限: min(固定下限, 待付余额)，保证最后一笔尾款总能付清
pub fn minimum_top_up(balance_due: i64, config: &LayawayConfig) -> i64 {
    config.min_payment_floor.min(balance_due)
}
