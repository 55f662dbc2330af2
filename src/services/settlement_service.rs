use crate::entities::{
    PartialPaymentStatus, PaymentStatus, TicketStatus, TicketType, order_entity as orders,
    partial_payment_entity as payments, ticket_entity as tickets,
};
use crate::error::{AppError, AppResult};
use crate::external::NotificationService;
use crate::utils::generate_payment_ref;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};

/// 支付结算
///
/// 网关回调可能重复、乱序到达，所有确认操作都是幂等的：
/// 已是 PAID / COMPLETED 时直接返回当前状态，不重复入账也不重复出票。
/// 付款失败只改支付状态，不动库存，用户可以在同一预留上重试；
/// 库存回收由过期扫描或显式取消负责。
#[derive(Clone)]
pub struct SettlementService {
    pool: DatabaseConnection,
    notifier: NotificationService,
}

impl SettlementService {
    pub fn new(pool: DatabaseConnection, notifier: NotificationService) -> Self {
        Self { pool, notifier }
    }

    /// 确认全额付款
    pub async fn confirm_full_payment(
        &self,
        order_ref: &str,
        provider_transaction_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> AppResult<orders::Model> {
        let txn = self.pool.begin().await?;

        let order = lock_order_by_ref(&txn, order_ref).await?;

        if order.payment_status == PaymentStatus::Paid {
            log::info!("Payment already processed for order {}", order.provider_ref);
            return Ok(order);
        }
        if order.is_layaway() {
            return Err(AppError::InvalidState(format!(
                "Order {} is a layaway order and is settled through partial payments",
                order.provider_ref
            )));
        }
        if !order.payment_status.can_transition_to(PaymentStatus::Paid) {
            return Err(AppError::InvalidState(format!(
                "Order {} is {} and cannot be paid",
                order.provider_ref, order.payment_status
            )));
        }
        if order.payment_status == PaymentStatus::Failed
            && count_pending_tickets(&txn, order.id).await? == 0
        {
            log::warn!(
                "Late payment {provider_transaction_id} for expired order {}, manual refund required",
                order.provider_ref
            );
            return Err(AppError::InvalidState(format!(
                "Reservation for order {} has expired",
                order.provider_ref
            )));
        }

        let now = Utc::now();
        let total = order.total_amount;
        let mut am = order.into_active_model();
        am.payment_status = Set(PaymentStatus::Paid);
        am.amount_paid = Set(total);
        am.paid_at = Set(Some(now));
        am.provider_transaction_id = Set(Some(provider_transaction_id.to_string()));
        am.payment_metadata = Set(metadata.map(|m| m.to_string()));
        am.failure_reason = Set(None);
        am.updated_at = Set(now);
        let updated = am.update(&txn).await?;

        let activated = activate_tickets(&txn, updated.id, now).await?;

        txn.commit().await?;

        log::info!(
            "Order {} paid via {} ({}), {} tickets activated",
            updated.provider_ref,
            updated.payment_provider,
            provider_transaction_id,
            activated
        );
        self.notifier.order_paid(&updated);

        Ok(updated)
    }

    /// 确认一笔分期付款
    pub async fn confirm_partial_payment(&self, partial_payment_id: i64) -> AppResult<orders::Model> {
        let txn = self.pool.begin().await?;

        // 先锁订单再锁付款记录，与取消分期的加锁顺序一致
        let order_id = payments::Entity::find_by_id(partial_payment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Partial payment {partial_payment_id} not found"))
            })?
            .order_id;
        let order = lock_order(&txn, order_id).await?;
        let payment = payments::Entity::find_by_id(partial_payment_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Partial payment {partial_payment_id} not found"))
            })?;

        match payment.status {
            PartialPaymentStatus::Completed => {
                log::info!("Partial payment {} already completed", payment.transaction_ref);
                return Ok(order);
            }
            PartialPaymentStatus::Failed => {
                return Err(AppError::InvalidState(format!(
                    "Partial payment {} has failed and cannot be completed",
                    payment.transaction_ref
                )));
            }
            PartialPaymentStatus::Pending => {}
        }
        if matches!(
            order.payment_status,
            PaymentStatus::Failed | PaymentStatus::Refunded
        ) {
            return Err(AppError::InvalidState(format!(
                "Order {} is {} and cannot accept payments",
                order.provider_ref, order.payment_status
            )));
        }

        let next_paid = order.amount_paid + payment.amount;
        let next_status = if next_paid >= order.total_amount {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };
        if !order.payment_status.can_transition_to(next_status) {
            return Err(AppError::InvalidState(format!(
                "Order {} is {} and cannot accept payments",
                order.provider_ref, order.payment_status
            )));
        }
        if next_paid > order.total_amount {
            log::warn!(
                "Partial payment {} of {} would overpay order {} (paid {}, total {})",
                payment.transaction_ref,
                payment.amount,
                order.provider_ref,
                order.amount_paid,
                order.total_amount
            );
            return Err(AppError::InvalidState(format!(
                "Payment of {} exceeds the balance due of {}",
                payment.amount,
                order.balance_due()
            )));
        }

        let now = Utc::now();
        let mut pam = payment.into_active_model();
        pam.status = Set(PartialPaymentStatus::Completed);
        pam.completed_at = Set(Some(now));
        pam.update(&txn).await?;

        let mut am = order.into_active_model();
        am.amount_paid = Set(next_paid);
        am.payment_status = Set(next_status);
        am.updated_at = Set(now);
        if next_status == PaymentStatus::Paid {
            am.paid_at = Set(Some(now));
        }
        let updated = am.update(&txn).await?;

        if next_status == PaymentStatus::Paid {
            activate_tickets(&txn, updated.id, now).await?;
        }

        txn.commit().await?;

        log::info!(
            "Order {} received partial payment: paid {} of {}, status {}",
            updated.provider_ref,
            updated.amount_paid,
            updated.total_amount,
            updated.payment_status
        );
        if updated.payment_status == PaymentStatus::Paid {
            self.notifier.order_paid(&updated);
        }

        Ok(updated)
    }

    /// 网关通知付款失败 / 拒付：订单标记 FAILED，预留与门票保持不变
    pub async fn fail_payment(&self, order_ref: &str, reason: &str) -> AppResult<orders::Model> {
        let txn = self.pool.begin().await?;
        let order = lock_order_by_ref(&txn, order_ref).await?;

        match order.payment_status {
            PaymentStatus::Failed => return Ok(order),
            PaymentStatus::Paid | PaymentStatus::Refunded => {
                log::warn!(
                    "Ignoring payment failure for settled order {}: {reason}",
                    order.provider_ref
                );
                return Ok(order);
            }
            _ => {}
        }
        if order.is_layaway() {
            return Err(AppError::InvalidState(format!(
                "Order {} is a layaway order; fail the partial payment instead",
                order.provider_ref
            )));
        }

        let mut am = order.into_active_model();
        am.payment_status = Set(PaymentStatus::Failed);
        am.failure_reason = Set(Some(truncate_reason(reason)));
        am.updated_at = Set(Utc::now());
        let updated = am.update(&txn).await?;
        txn.commit().await?;

        log::info!("Order {} payment failed: {reason}", updated.provider_ref);
        Ok(updated)
    }

    /// 分期付款失败：只标记该笔记录
    pub async fn fail_partial_payment(
        &self,
        partial_payment_id: i64,
        reason: &str,
    ) -> AppResult<payments::Model> {
        let txn = self.pool.begin().await?;
        let payment = payments::Entity::find_by_id(partial_payment_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Partial payment {partial_payment_id} not found"))
            })?;

        match payment.status {
            PartialPaymentStatus::Failed => return Ok(payment),
            PartialPaymentStatus::Completed => {
                return Err(AppError::InvalidState(format!(
                    "Partial payment {} is already completed",
                    payment.transaction_ref
                )));
            }
            PartialPaymentStatus::Pending => {}
        }

        let mut am = payment.into_active_model();
        am.status = Set(PartialPaymentStatus::Failed);
        am.failure_reason = Set(Some(truncate_reason(reason)));
        let updated = am.update(&txn).await?;
        txn.commit().await?;

        log::info!("Partial payment {} failed: {reason}", updated.transaction_ref);
        Ok(updated)
    }

    /// 发起一笔分期付款 (PENDING)，由网关据 transaction_ref 扣款后回调确认
    pub async fn initiate_partial_payment<C: ConnectionTrait>(
        conn: &C,
        order: &orders::Model,
        amount: i64,
        provider: &str,
    ) -> AppResult<payments::Model> {
        let payment = payments::ActiveModel {
            order_id: Set(order.id),
            amount: Set(amount),
            status: Set(PartialPaymentStatus::Pending),
            provider: Set(provider.to_string()),
            transaction_ref: Set(generate_payment_ref()),
            provider_transaction_id: Set(None),
            failure_reason: Set(None),
            completed_at: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        log::info!(
            "Partial payment {} of {} initiated for order {}",
            payment.transaction_ref,
            amount,
            order.provider_ref
        );
        Ok(payment)
    }
}

pub(crate) async fn lock_order<C: ConnectionTrait>(conn: &C, order_id: i64) -> AppResult<orders::Model> {
    orders::Entity::find_by_id(order_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))
}

async fn lock_order_by_ref<C: ConnectionTrait>(conn: &C, order_ref: &str) -> AppResult<orders::Model> {
    orders::Entity::find()
        .filter(orders::Column::ProviderRef.eq(order_ref))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_ref} not found")))
}

async fn count_pending_tickets<C: ConnectionTrait>(conn: &C, order_id: i64) -> AppResult<u64> {
    let count = tickets::Entity::find()
        .filter(tickets::Column::OrderId.eq(order_id))
        .filter(tickets::Column::Status.eq(TicketStatus::Pending))
        .count(conn)
        .await?;
    Ok(count)
}

/// 订单付清后激活门票：普通票 -> ISSUED，捐赠票 -> POOL
pub(crate) async fn activate_tickets<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    let mut activated = 0;
    for ticket_type in [TicketType::Standard, TicketType::Adopted] {
        let result = tickets::Entity::update_many()
            .col_expr(
                tickets::Column::Status,
                Expr::value(TicketStatus::activated(ticket_type)),
            )
            .col_expr(tickets::Column::UpdatedAt, Expr::value(now))
            .filter(tickets::Column::OrderId.eq(order_id))
            .filter(tickets::Column::TicketType.eq(ticket_type))
            .filter(tickets::Column::Status.eq(TicketStatus::Pending))
            .exec(conn)
            .await?;
        activated += result.rows_affected;
    }
    Ok(activated)
}

fn truncate_reason(reason: &str) -> String {
    reason.chars().take(255).collect()
}
