pub mod checkout_service;
pub mod expiry_service;
pub mod inventory_service;
pub mod layaway_service;
pub mod lottery_service;
pub mod settlement_service;
pub mod ticket_service;

pub use checkout_service::CheckoutService;
pub use expiry_service::{ExpiryService, SweepReport};
pub use inventory_service::InventoryLedger;
pub use layaway_service::LayawayService;
pub use lottery_service::LotteryService;
pub use settlement_service::SettlementService;
pub use ticket_service::TicketService;
