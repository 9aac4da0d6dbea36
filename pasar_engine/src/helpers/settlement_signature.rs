//! Settlement callback authentication.
//!
//! The payment processor signs every callback with a SHA-512 hex digest over the concatenation
//! `order_id + status_code + gross_amount + server_key`, where `server_key` is the shared secret issued with the
//! merchant account. A callback whose `signature_key` does not match the recomputation is discarded without
//! touching any state.
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha512};

use crate::db_types::SettlementNotice;

pub fn settlement_signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_settlement_signature(notice: &SettlementNotice, server_key: &str) -> bool {
    let expected =
        settlement_signature(notice.order_id.as_str(), &notice.status_code, &notice.gross_amount, server_key);
    expected.eq_ignore_ascii_case(&notice.signature_key)
}

/// A fresh public order id: `PSR-` followed by twelve random alphanumerics.
pub fn new_order_id() -> String {
    let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(char::from).collect();
    format!("PSR-{}", suffix.to_uppercase())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::OrderId;

    fn notice(server_key: &str) -> SettlementNotice {
        let signature_key = settlement_signature("PSR-TEST0001", "200", "25000", server_key);
        SettlementNotice {
            order_id: OrderId::from("PSR-TEST0001"),
            transaction_status: "settlement".to_string(),
            status_code: "200".to_string(),
            gross_amount: "25000".to_string(),
            signature_key,
            fraud_status: None,
        }
    }

    #[test]
    fn valid_signature_verifies() {
        let n = notice("sekrit");
        assert!(verify_settlement_signature(&n, "sekrit"));
        // Processors differ in hex casing.
        let mut upper = n.clone();
        upper.signature_key = upper.signature_key.to_uppercase();
        assert!(verify_settlement_signature(&upper, "sekrit"));
    }

    #[test]
    fn tampering_breaks_the_signature() {
        let mut n = notice("sekrit");
        n.gross_amount = "2500000".to_string();
        assert!(!verify_settlement_signature(&n, "sekrit"));
        let n = notice("sekrit");
        assert!(!verify_settlement_signature(&n, "not-the-key"));
    }

    #[test]
    fn order_ids_are_unique_enough() {
        let a = new_order_id();
        let b = new_order_id();
        assert!(a.starts_with("PSR-"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
