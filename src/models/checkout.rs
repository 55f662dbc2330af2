use crate::entities::{order_entity, partial_payment_entity, ticket_entity};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub tier_id: i64,
    /// 购买单位数 (非实体票数)
    pub units: i32,
}

/// 普通 / 团体结账
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: i64,
    pub event_id: i64,
    pub items: Vec<CheckoutItem>,
    pub provider: String,
    #[serde(default)]
    pub promo_code: Option<String>,
}

/// Adopt-a-ticket：捐赠票，付款后进入抽签池
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptCheckoutRequest {
    pub user_id: i64,
    pub event_id: i64,
    pub tier_id: i64,
    pub units: i32,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayawayCheckoutRequest {
    pub user_id: i64,
    pub event_id: i64,
    pub items: Vec<CheckoutItem>,
    /// 首付金额 (美分)
    pub initial_amount: i64,
    pub provider: String,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayawayTopUpRequest {
    pub order_id: i64,
    pub amount: i64,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub order: order_entity::Model,
    pub tickets: Vec<ticket_entity::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayawayCheckoutResult {
    pub order: order_entity::Model,
    pub tickets: Vec<ticket_entity::Model>,
    /// 首付记录，交由支付网关发起扣款
    pub initial_payment: partial_payment_entity::Model,
}

/// 合并同一票档的多行并校验数量，结果按 tier_id 升序
///
/// 预留按此顺序锁定票档行，所有结账路径的加锁顺序一致。
pub fn normalize_items(items: &[CheckoutItem]) -> AppResult<Vec<CheckoutItem>> {
    if items.is_empty() {
        return Err(AppError::ValidationError(
            "At least one ticket tier must be selected".into(),
        ));
    }

    let mut merged: Vec<CheckoutItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.units <= 0 {
            return Err(AppError::ValidationError(format!(
                "Quantity for tier {} must be positive",
                item.tier_id
            )));
        }
        match merged.iter_mut().find(|m| m.tier_id == item.tier_id) {
            Some(existing) => {
                existing.units = existing.units.checked_add(item.units).ok_or_else(|| {
                    AppError::ValidationError(format!(
                        "Quantity for tier {} is too large",
                        item.tier_id
                    ))
                })?;
            }
            None => merged.push(*item),
        }
    }
    merged.sort_by_key(|item| item.tier_id);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_tiers_are_merged_and_sorted_by_tier() {
        let items = vec![
            CheckoutItem { tier_id: 2, units: 1 },
            CheckoutItem { tier_id: 1, units: 2 },
            CheckoutItem { tier_id: 2, units: 3 },
        ];
        let merged = normalize_items(&items).unwrap();
        assert_eq!(
            merged,
            vec![
                CheckoutItem { tier_id: 1, units: 2 },
                CheckoutItem { tier_id: 2, units: 4 },
            ]
        );
    }

    #[test]
    fn merged_quantity_overflow_is_rejected() {
        let items = vec![
            CheckoutItem { tier_id: 1, units: i32::MAX },
            CheckoutItem { tier_id: 1, units: 1 },
        ];
        assert!(matches!(
            normalize_items(&items),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn empty_and_non_positive_quantities_are_rejected() {
        assert!(matches!(
            normalize_items(&[]),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            normalize_items(&[CheckoutItem { tier_id: 1, units: 0 }]),
            Err(AppError::ValidationError(_))
        ));
    }
}
