pub mod discount;
pub mod notifier;

pub use discount::{DiscountOutcome, DiscountValidator, NoDiscounts};
pub use notifier::NotificationService;
