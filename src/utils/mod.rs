pub mod code_generator;
pub mod shuffle;

pub use code_generator::{generate_payment_ref, generate_provider_ref, generate_qr_code_hash};
pub use shuffle::fisher_yates_shuffle;
