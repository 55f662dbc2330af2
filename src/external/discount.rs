use crate::error::AppResult;
use async_trait::async_trait;

/// 优惠码校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountOutcome {
    Valid {
        discount_amount: i64,
        discount_id: i64,
    },
    Invalid {
        reason: String,
    },
}

/// 外部优惠引擎。结账流程只消费其返回的折扣金额，不参与计算。
#[async_trait]
pub trait DiscountValidator: Send + Sync {
    async fn validate(
        &self,
        code: &str,
        user_id: i64,
        event_id: i64,
        subtotal: i64,
        product_ids: &[i64],
    ) -> AppResult<DiscountOutcome>;
}

/// 未接入优惠引擎时使用：任何优惠码均无效
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscounts;

#[async_trait]
impl DiscountValidator for NoDiscounts {
    async fn validate(
        &self,
        code: &str,
        _user_id: i64,
        _event_id: i64,
        _subtotal: i64,
        _product_ids: &[i64],
    ) -> AppResult<DiscountOutcome> {
        Ok(DiscountOutcome::Invalid {
            reason: format!("Promo code {code} is not valid"),
        })
    }
}
