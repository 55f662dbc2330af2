use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    #[sea_orm(string_value = "STANDARD")]
    Standard,
    /// 捐赠票，付款后进入抽签池
    #[sea_orm(string_value = "ADOPTED")]
    Adopted,
}

impl std::fmt::Display for TicketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketType::Standard => write!(f, "STANDARD"),
            TicketType::Adopted => write!(f, "ADOPTED"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "ISSUED")]
    Issued,
    #[sea_orm(string_value = "POOL")]
    Pool,
    #[sea_orm(string_value = "WON")]
    Won,
    #[sea_orm(string_value = "REDEEMED")]
    Redeemed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl TicketStatus {
    /// 门票状态流转规则
    /// - PENDING -> ISSUED (普通票付款) / POOL (捐赠票付款) / CANCELLED (过期或取消)
    /// - POOL -> WON (抽中)
    /// - ISSUED / WON -> REDEEMED (检票)
    /// - ISSUED -> CANCELLED
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Pending, Issued)
                | (Pending, Pool)
                | (Pending, Cancelled)
                | (Pool, Won)
                | (Issued, Redeemed)
                | (Won, Redeemed)
                | (Issued, Cancelled)
        )
    }

    /// Status a PENDING ticket of `ticket_type` takes once its order is paid.
    pub fn activated(ticket_type: TicketType) -> TicketStatus {
        match ticket_type {
            TicketType::Standard => TicketStatus::Issued,
            TicketType::Adopted => TicketStatus::Pool,
        }
    }

    /// Tickets that grant admission to the bearer.
    pub fn is_admissible(self) -> bool {
        matches!(self, TicketStatus::Issued | TicketStatus::Won)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Pending => write!(f, "PENDING"),
            TicketStatus::Issued => write!(f, "ISSUED"),
            TicketStatus::Pool => write!(f, "POOL"),
            TicketStatus::Won => write!(f, "WON"),
            TicketStatus::Redeemed => write!(f, "REDEEMED"),
            TicketStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// 门票实体
/// 说明:
/// - purchaser_id: 付款 / 捐赠人
/// - holder_id: 当前持票人 (抽中或转让后可能与 purchaser 不同；池中捐赠票为空)
/// - qr_code_hash: 全局唯一，持票人变更时重新生成使旧凭证失效
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub tier_id: i64,
    pub order_id: i64,
    pub purchaser_id: i64,
    pub holder_id: Option<i64>,
    pub ticket_type: TicketType,
    pub status: TicketStatus,
    #[sea_orm(unique)]
    pub qr_code_hash: String,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<i64>,
    pub checked_in_gate: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::TicketStatus::*;
    use super::*;

    #[test]
    fn activation_depends_on_type() {
        assert_eq!(TicketStatus::activated(TicketType::Standard), Issued);
        assert_eq!(TicketStatus::activated(TicketType::Adopted), Pool);
    }

    #[test]
    fn pool_tickets_only_leave_by_winning() {
        assert!(Pool.can_transition_to(Won));
        assert!(!Pool.can_transition_to(Issued));
        assert!(!Pool.can_transition_to(Cancelled));
        assert!(!Won.can_transition_to(Pool));
    }

    #[test]
    fn terminal_states_stay_put() {
        for next in [Pending, Issued, Pool, Won, Redeemed, Cancelled] {
            assert!(!Redeemed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn only_issued_and_won_are_admissible() {
        assert!(Issued.is_admissible());
        assert!(Won.is_admissible());
        assert!(!Pool.is_admissible());
        assert!(!Pending.is_admissible());
    }
}
