pub mod events;
pub mod lottery_entries;
pub mod orders;
pub mod partial_payments;
pub mod ticket_tiers;
pub mod tickets;
pub mod users;

pub use events as event_entity;
pub use lottery_entries as lottery_entry_entity;
pub use orders as order_entity;
pub use partial_payments as partial_payment_entity;
pub use ticket_tiers as ticket_tier_entity;
pub use tickets as ticket_entity;
pub use users as user_entity;

pub use orders::{PaymentStatus, PaymentType};
pub use partial_payments::PartialPaymentStatus;
pub use tickets::{TicketStatus, TicketType};
