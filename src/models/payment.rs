use serde::{Deserialize, Serialize};

/// 支付网关回调事件类型 (各网关适配层统一转换为此格式)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEventType {
    #[serde(rename = "payment.succeeded")]
    PaymentSucceeded,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
    #[serde(rename = "partial_payment.succeeded")]
    PartialPaymentSucceeded,
    #[serde(rename = "partial_payment.failed")]
    PartialPaymentFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWebhookPayload {
    #[serde(rename = "type")]
    pub event_type: PaymentEventType,
    #[serde(default)]
    pub order_ref: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub partial_payment_id: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}
