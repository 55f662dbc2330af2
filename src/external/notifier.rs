use crate::config::NotificationsConfig;
use crate::entities::order_entity;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct OrderPaidNotification<'a> {
    event: &'a str,
    order_id: i64,
    user_id: i64,
    event_id: i64,
    total_amount: i64,
    provider_ref: &'a str,
}

/// 付款成功通知 (邮件 / 推送由下游服务处理)
///
/// 通知是 fire-and-forget：调用方在事务提交之后调用，失败只记录日志。
#[derive(Clone)]
pub struct NotificationService {
    client: Client,
    config: NotificationsConfig,
}

impl NotificationService {
    pub fn new(config: NotificationsConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// 仅记录日志的通知器
    pub fn disabled() -> Self {
        Self::new(NotificationsConfig::default())
    }

    pub fn order_paid(&self, order: &order_entity::Model) {
        let Some(url) = self.config.webhook_url.clone() else {
            log::info!(
                "Order {} paid (user {}, total {}), no notification webhook configured",
                order.id,
                order.user_id,
                order.total_amount
            );
            return;
        };

        let client = self.client.clone();
        let order = order.clone();
        tokio::spawn(async move {
            if let Err(e) = send_order_paid(&client, &url, &order).await {
                log::error!("Failed to send paid notification for order {}: {e}", order.id);
            }
        });
    }
}

async fn send_order_paid(client: &Client, url: &str, order: &order_entity::Model) -> AppResult<()> {
    let payload = OrderPaidNotification {
        event: "order.paid",
        order_id: order.id,
        user_id: order.user_id,
        event_id: order.event_id,
        total_amount: order.total_amount,
        provider_ref: &order.provider_ref,
    };

    let response = client.post(url).json(&payload).send().await?;
    if response.status().is_success() {
        log::info!("Paid notification sent for order {}", order.id);
        Ok(())
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(AppError::ExternalApiError(format!(
            "Notification webhook rejected: {error_text}"
        )))
    }
}
