use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "PARTIAL")]
    Partial,
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "FAILED")]
    Failed,
    #[sea_orm(string_value = "REFUNDED")]
    Refunded,
}

impl PaymentStatus {
    /// 订单支付状态流转规则
    /// - PENDING -> PARTIAL / PAID / FAILED
    /// - PARTIAL -> PARTIAL (继续分期) / PAID / REFUNDED (取消分期)
    /// - FAILED -> PAID (同一预留上重试支付成功)
    /// - PAID -> REFUNDED
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Partial)
                | (Pending, Paid)
                | (Pending, Failed)
                | (Partial, Partial)
                | (Partial, Paid)
                | (Partial, Refunded)
                | (Failed, Paid)
                | (Paid, Refunded)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Partial => write!(f, "PARTIAL"),
            PaymentStatus::Paid => write!(f, "PAID"),
            PaymentStatus::Failed => write!(f, "FAILED"),
            PaymentStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    #[sea_orm(string_value = "FULL")]
    Full,
    #[sea_orm(string_value = "LAYAWAY")]
    Layaway,
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentType::Full => write!(f, "FULL"),
            PaymentType::Layaway => write!(f, "LAYAWAY"),
        }
    }
}

/// 订单实体
/// 不变量:
/// - amount_paid <= total_amount
/// - payment_status = PAID => amount_paid = total_amount
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub discount_id: Option<i64>,
    pub total_amount: i64,
    pub amount_paid: i64,
    pub payment_status: PaymentStatus,
    pub payment_type: PaymentType,
    pub layaway_deadline: Option<DateTime<Utc>>,
    pub payment_provider: String,
    /// 商户侧订单引用，支付网关回调时据此查找订单
    #[sea_orm(unique)]
    pub provider_ref: String,
    pub provider_transaction_id: Option<String>,
    /// 网关回调附带的元数据 (JSON 文本)
    pub payment_metadata: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn balance_due(&self) -> i64 {
        (self.total_amount - self.amount_paid).max(0)
    }

    pub fn is_layaway(&self) -> bool {
        self.payment_type == PaymentType::Layaway
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
