//! Opaque entity id generation.

use uuid::Uuid;

pub const PAYMENT_PREFIX: &str = "pay";
pub const REFUND_PREFIX: &str = "rfnd";

/// Generates an id of the form `prefix_` + 16 hex characters.
pub fn generate_id(prefix: &str) -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &raw[..16])
}

pub fn payment_id() -> String {
    generate_id(PAYMENT_PREFIX)
}

pub fn refund_id() -> String {
    generate_id(REFUND_PREFIX)
}
