//! Inventory ledger: the only code allowed to move `ticket_tiers.remaining_quantity`.
//!
//! `reserve` locks the tier row (`SELECT … FOR UPDATE`) for the whole check-then-decrement
//! and the decrement itself is a conditional `UPDATE … WHERE remaining_quantity >= units`,
//! so two buyers racing for the last unit can never both succeed, even on a backend
//! without row locks. `release` is a bounded increment.

use crate::entities::{TicketStatus, ticket_entity as tickets, ticket_tier_entity as tiers};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use std::collections::BTreeMap;

pub struct InventoryLedger;

impl InventoryLedger {
    /// 锁定票档行 (FOR UPDATE)，事务结束前其它预留会在此等待
    ///
    /// 一个事务锁定多个票档时必须按 tier_id 升序加锁 (见 `normalize_items`)，
    /// 否则两个交叉的购物车可能互相等待而死锁。
    pub async fn lock_tier<C: ConnectionTrait>(conn: &C, tier_id: i64) -> AppResult<tiers::Model> {
        tiers::Entity::find_by_id(tier_id)
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket tier {tier_id} not found")))
    }

    /// Lock, validate and decrement in one step.
    pub async fn reserve<C: ConnectionTrait>(
        conn: &C,
        tier_id: i64,
        units: i32,
        now: DateTime<Utc>,
    ) -> AppResult<tiers::Model> {
        let tier = Self::lock_tier(conn, tier_id).await?;
        Self::reserve_locked(conn, tier, units, now).await
    }

    /// 对已锁定的票档扣减库存，返回扣减后的票档
    pub async fn reserve_locked<C: ConnectionTrait>(
        conn: &C,
        tier: tiers::Model,
        units: i32,
        now: DateTime<Utc>,
    ) -> AppResult<tiers::Model> {
        check_reservable(&tier, units, now)?;

        let result = tiers::Entity::update_many()
            .col_expr(
                tiers::Column::RemainingQuantity,
                Expr::col(tiers::Column::RemainingQuantity).sub(units),
            )
            .col_expr(tiers::Column::UpdatedAt, Expr::value(now))
            .filter(tiers::Column::Id.eq(tier.id))
            .filter(tiers::Column::RemainingQuantity.gte(units))
            .exec(conn)
            .await?;

        if result.rows_affected != 1 {
            // 锁之外有并发扣减 (无行锁的存储)；按库存不足处理
            return Err(AppError::InsufficientInventory(format!(
                "Not enough tickets remaining for {}",
                tier.name
            )));
        }

        Ok(tiers::Model {
            remaining_quantity: tier.remaining_quantity - units,
            updated_at: now,
            ..tier
        })
    }

    /// 归还库存，结果不会超过 initial_quantity
    pub async fn release<C: ConnectionTrait>(conn: &C, tier_id: i64, units: i32) -> AppResult<()> {
        if units <= 0 {
            return Ok(());
        }

        let result = tiers::Entity::update_many()
            .col_expr(
                tiers::Column::RemainingQuantity,
                Expr::col(tiers::Column::RemainingQuantity).add(units),
            )
            .col_expr(tiers::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tiers::Column::Id.eq(tier_id))
            .filter(
                Expr::expr(Expr::col(tiers::Column::RemainingQuantity).add(units))
                    .lte(Expr::col(tiers::Column::InitialQuantity)),
            )
            .exec(conn)
            .await?;

        if result.rows_affected == 1 {
            return Ok(());
        }

        // 超出上限：钳制到 initial_quantity
        let clamped = tiers::Entity::update_many()
            .col_expr(
                tiers::Column::RemainingQuantity,
                Expr::col(tiers::Column::InitialQuantity).into(),
            )
            .col_expr(tiers::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tiers::Column::Id.eq(tier_id))
            .exec(conn)
            .await?;

        if clamped.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Ticket tier {tier_id} not found")));
        }
        log::warn!("Release of {units} units on tier {tier_id} clamped to initial quantity");
        Ok(())
    }

    /// 取消订单下所有 PENDING 门票并归还库存。
    ///
    /// 每个票档归还 ceil(取消票数 / tickets_per_unit) 个单位，与预留时的
    /// 单位 -> 门票展开互逆。返回 (tier_id, 归还单位数) 列表。
    pub async fn release_order_reservation<C: ConnectionTrait>(
        conn: &C,
        order_id: i64,
    ) -> AppResult<Vec<(i64, i32)>> {
        let pending = tickets::Entity::find()
            .filter(tickets::Column::OrderId.eq(order_id))
            .filter(tickets::Column::Status.eq(TicketStatus::Pending))
            .lock_exclusive()
            .all(conn)
            .await?;

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut per_tier: BTreeMap<i64, i32> = BTreeMap::new();
        for ticket in &pending {
            *per_tier.entry(ticket.tier_id).or_default() += 1;
        }

        tickets::Entity::update_many()
            .col_expr(tickets::Column::Status, Expr::value(TicketStatus::Cancelled))
            .col_expr(tickets::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tickets::Column::OrderId.eq(order_id))
            .filter(tickets::Column::Status.eq(TicketStatus::Pending))
            .exec(conn)
            .await?;

        let mut released = Vec::with_capacity(per_tier.len());
        for (tier_id, cancelled) in per_tier {
            let tier = tiers::Entity::find_by_id(tier_id)
                .one(conn)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Ticket tier {tier_id} not found")))?;
            let units = tier.units_for_tickets(cancelled);
            Self::release(conn, tier_id, units).await?;
            released.push((tier_id, units));
        }

        Ok(released)
    }
}

/// 预留前置校验：上架状态、销售窗口、单笔上限、剩余库存
pub fn check_reservable(tier: &tiers::Model, units: i32, now: DateTime<Utc>) -> AppResult<()> {
    if units <= 0 {
        return Err(AppError::ValidationError(format!(
            "Quantity for {} must be positive",
            tier.name
        )));
    }
    if !tier.is_active {
        return Err(AppError::TierUnavailable(format!(
            "{} is not available for sale",
            tier.name
        )));
    }
    if !tier.is_on_sale(now) {
        let reason = match tier.sales_start {
            Some(start) if now < start => format!("Sales for {} have not started yet", tier.name),
            _ => format!("Sales for {} have ended", tier.name),
        };
        return Err(AppError::TierUnavailable(reason));
    }
    if units > tier.max_qty_per_order {
        return Err(AppError::TierUnavailable(format!(
            "At most {} units of {} can be purchased per order",
            tier.max_qty_per_order, tier.name
        )));
    }
    if tier.remaining_quantity < units {
        let reason = if tier.remaining_quantity <= 0 {
            format!("{} is sold out", tier.name)
        } else {
            format!(
                "Only {} units remaining for {}",
                tier.remaining_quantity, tier.name
            )
        };
        return Err(AppError::InsufficientInventory(reason));
    }
    Ok(())
}
