mod settlement_signature;

pub use settlement_signature::{new_order_id, settlement_signature, verify_settlement_signature};
