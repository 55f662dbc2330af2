use crate::config::ReservationConfig;
use crate::entities::{
    PartialPaymentStatus, PaymentStatus, TicketStatus, order_entity as orders,
    partial_payment_entity as payments, ticket_entity as tickets,
};
use crate::error::AppResult;
use crate::services::InventoryLedger;
use crate::services::settlement_service::lock_order;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};

const EXPIRED_REASON: &str = "Payment timeout: reservation expired";

/// 单次扫描结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_orders: usize,
    pub released_units: i64,
    pub failed_orders: usize,
}

/// 回收长时间未付款的预留
#[derive(Clone)]
pub struct ExpiryService {
    pool: DatabaseConnection,
    expiry: Duration,
}

impl ExpiryService {
    pub fn new(pool: DatabaseConnection, config: &ReservationConfig) -> Self {
        Self {
            pool,
            expiry: Duration::minutes(config.expiry_minutes),
        }
    }

    pub async fn sweep(&self) -> AppResult<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// 处理所有 created_at 早于 (now - expiry) 的未结算预留：
    /// - PENDING 订单
    /// - 付款被拒 (FAILED) 但仍持有 PENDING 门票、一直未重试的订单
    ///
    /// 每个订单独立事务，单个失败只记录日志，不影响其余订单。
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let cutoff = now - self.expiry;

        let mut expired_ids: Vec<i64> = orders::Entity::find()
            .select_only()
            .column(orders::Column::Id)
            .filter(orders::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .filter(orders::Column::CreatedAt.lt(cutoff))
            .into_tuple()
            .all(&self.pool)
            .await?;

        let declined_ids: Vec<i64> = tickets::Entity::find()
            .select_only()
            .column(tickets::Column::OrderId)
            .distinct()
            .filter(tickets::Column::Status.eq(TicketStatus::Pending))
            .filter(
                tickets::Column::OrderId.in_subquery(
                    Query::select()
                        .column(orders::Column::Id)
                        .from(orders::Entity)
                        .and_where(orders::Column::PaymentStatus.eq(PaymentStatus::Failed))
                        .and_where(orders::Column::CreatedAt.lt(cutoff))
                        .to_owned(),
                ),
            )
            .into_tuple()
            .all(&self.pool)
            .await?;

        expired_ids.extend(declined_ids);
        expired_ids.sort_unstable();
        expired_ids.dedup();

        let mut report = SweepReport::default();
        for order_id in expired_ids {
            match self.expire_order(order_id, cutoff).await {
                Ok(Some(units)) => {
                    report.expired_orders += 1;
                    report.released_units += units;
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed_orders += 1;
                    log::error!("Failed to expire order {order_id}: {e:?}");
                }
            }
        }

        if report.expired_orders > 0 || report.failed_orders > 0 {
            log::info!(
                "Reservation sweep: {} orders expired, {} units released, {} failures",
                report.expired_orders,
                report.released_units,
                report.failed_orders
            );
        }
        Ok(report)
    }

    /// 过期单个订单。订单在扫描与加锁之间已被结算 (或已释放) 时返回 None。
    async fn expire_order(&self, order_id: i64, cutoff: DateTime<Utc>) -> AppResult<Option<i64>> {
        let txn = self.pool.begin().await?;
        let order = lock_order(&txn, order_id).await?;

        if order.created_at >= cutoff {
            return Ok(None);
        }
        let declined = match order.payment_status {
            PaymentStatus::Pending => {
                let mut am = order.into_active_model();
                am.payment_status = Set(PaymentStatus::Failed);
                am.failure_reason = Set(Some(EXPIRED_REASON.to_string()));
                am.updated_at = Set(Utc::now());
                am.update(&txn).await?;
                false
            }
            // 付款被拒后未重试：保留原失败原因，只回收库存
            PaymentStatus::Failed => true,
            _ => return Ok(None),
        };

        let released = InventoryLedger::release_order_reservation(&txn, order_id).await?;

        // 分期订单首付未到账: 作废待处理付款
        payments::Entity::update_many()
            .col_expr(
                payments::Column::Status,
                Expr::value(PartialPaymentStatus::Failed),
            )
            .col_expr(payments::Column::FailureReason, Expr::value(EXPIRED_REASON))
            .filter(payments::Column::OrderId.eq(order_id))
            .filter(payments::Column::Status.eq(PartialPaymentStatus::Pending))
            .exec(&txn)
            .await?;

        if declined && released.is_empty() {
            return Ok(None);
        }
        txn.commit().await?;

        let units: i64 = released.iter().map(|(_, units)| i64::from(*units)).sum();
        log::info!("Order {order_id} expired, released {released:?}");
        Ok(Some(units))
    }
}
