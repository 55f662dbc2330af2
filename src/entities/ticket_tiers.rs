use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 票档实体
/// 说明:
/// - price: 每个购买单位的价格 (美分)
/// - tickets_per_unit: 一个购买单位对应的实体票数量 (如 10 人桌 = 10)
/// - remaining_quantity: 剩余可售单位数，只能通过 InventoryLedger 的 reserve / release 修改
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_tiers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub price: i64,
    pub tickets_per_unit: i32,
    pub initial_quantity: i32,
    pub remaining_quantity: i32,
    pub max_qty_per_order: i32,
    pub sales_start: Option<DateTime<Utc>>,
    pub sales_end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Whether `now` falls inside the optional `[sales_start, sales_end]` window.
    pub fn is_on_sale(&self, now: DateTime<Utc>) -> bool {
        let started = self.sales_start.is_none_or(|start| now >= start);
        let not_ended = self.sales_end.is_none_or(|end| now <= end);
        started && not_ended
    }

    /// Physical tickets produced by `units` purchased units.
    pub fn tickets_for_units(&self, units: i32) -> i32 {
        units * self.tickets_per_unit.max(1)
    }

    /// Units to hand back when `ticket_count` tickets of this tier are cancelled.
    pub fn units_for_tickets(&self, ticket_count: i32) -> i32 {
        let per_unit = self.tickets_per_unit.max(1);
        (ticket_count + per_unit - 1) / per_unit
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tier(tickets_per_unit: i32) -> Model {
        let now = Utc::now();
        Model {
            id: 1,
            event_id: 1,
            name: "Table".into(),
            price: 1000,
            tickets_per_unit,
            initial_quantity: 10,
            remaining_quantity: 10,
            max_qty_per_order: 4,
            sales_start: None,
            sales_end: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn units_round_up_partial_tables() {
        let t = tier(10);
        assert_eq!(t.tickets_for_units(2), 20);
        assert_eq!(t.units_for_tickets(20), 2);
        assert_eq!(t.units_for_tickets(11), 2);
        assert_eq!(t.units_for_tickets(1), 1);
        assert_eq!(t.units_for_tickets(0), 0);
    }

    #[test]
    fn sales_window_is_inclusive() {
        let now = Utc::now();
        let mut t = tier(1);
        assert!(t.is_on_sale(now));

        t.sales_start = Some(now + Duration::hours(1));
        assert!(!t.is_on_sale(now));

        t.sales_start = Some(now - Duration::hours(1));
        t.sales_end = Some(now - Duration::minutes(1));
        assert!(!t.is_on_sale(now));

        t.sales_end = Some(now);
        assert!(t.is_on_sale(now));
    }
}
