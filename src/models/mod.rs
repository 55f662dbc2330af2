pub mod checkout;
pub mod lottery;
pub mod payment;

pub use checkout::*;
pub use lottery::*;
pub use payment::*;
