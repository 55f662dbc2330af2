use crate::config::PaymentsConfig;
use crate::error::{AppError, AppResult};
use crate::models::{PaymentEventType, PaymentWebhookPayload};
use crate::services::SettlementService;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use log::{error, info, warn};

pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

/// 支付网关 webhook 处理器
///
/// 密钥按常量时间比较，不对返回 401，报文无法解析返回 400；
/// 业务处理失败仍返回 200 避免网关无限重试，错误写入日志。
/// 结算操作本身是幂等的，重复投递不会重复入账。
pub async fn payment_webhook(
    req: HttpRequest,
    body: web::Bytes,
    settlement: web::Data<SettlementService>,
    payments: web::Data<PaymentsConfig>,
) -> Result<HttpResponse> {
    let secret = req
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if payments.webhook_secret.is_empty()
        || !constant_time_eq::constant_time_eq(
            secret.as_bytes(),
            payments.webhook_secret.as_bytes(),
        )
    {
        warn!("Rejected payment webhook with missing or invalid secret");
        return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid webhook secret"
        })));
    }

    let payload: PaymentWebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Invalid payment webhook payload: {e}");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid payload"
            })));
        }
    };

    info!("Received payment webhook event: {:?}", payload.event_type);

    match handle_payment_event(payload, &settlement).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "received": true
        }))),
        Err(e) => {
            error!("Failed to process payment webhook event: {e}");
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "received": true,
                "error": format!("Processing failed: {}", e)
            })))
        }
    }
}

async fn handle_payment_event(
    payload: PaymentWebhookPayload,
    settlement: &SettlementService,
) -> AppResult<()> {
    match payload.event_type {
        PaymentEventType::PaymentSucceeded => {
            let order_ref = require(payload.order_ref.as_deref(), "order_ref")?;
            let transaction_id = require(payload.transaction_id.as_deref(), "transaction_id")?;
            settlement
                .confirm_full_payment(order_ref, transaction_id, payload.metadata)
                .await?;
        }
        PaymentEventType::PaymentFailed => {
            let order_ref = require(payload.order_ref.as_deref(), "order_ref")?;
            let reason = payload.reason.as_deref().unwrap_or("Payment failed");
            settlement.fail_payment(order_ref, reason).await?;
        }
        PaymentEventType::PartialPaymentSucceeded => {
            let id = payload.partial_payment_id.ok_or_else(|| missing("partial_payment_id"))?;
            settlement.confirm_partial_payment(id).await?;
        }
        PaymentEventType::PartialPaymentFailed => {
            let id = payload.partial_payment_id.ok_or_else(|| missing("partial_payment_id"))?;
            let reason = payload.reason.as_deref().unwrap_or("Payment failed");
            settlement.fail_partial_payment(id, reason).await?;
        }
    }
    Ok(())
}

fn require<'a>(value: Option<&'a str>, field: &str) -> AppResult<&'a str> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| missing(field))
}

fn missing(field: &str) -> AppError {
    AppError::ValidationError(format!("Missing {field} in webhook payload"))
}

/// 配置webhook路由
pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhooks").route("/payments", web::post().to(payment_webhook)));
}
