//! HMAC signature helpers shared by the payment and webhook verifiers.

use ring::hmac;

/// Hex-encoded HMAC-SHA256 of `message` under `secret`.
pub fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, message);
    tag.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

/// The signature the payment provider computes for a captured payment:
/// HMAC-SHA256 over "orderId|paymentId" with the key secret.
pub fn payment_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    hmac_sha256_hex(secret, format!("{order_id}|{payment_id}").as_bytes())
}

/// Constant-time comparison of a client-supplied hex signature against the
/// expected one.
pub fn verify_signature(expected_hex: &str, provided_hex: &str) -> bool {
    ring::constant_time::verify_slices_are_equal(expected_hex.as_bytes(), provided_hex.as_bytes())
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_signature_is_deterministic() {
        let a = payment_signature("secret", "order_1", "pay_1");
        let b = payment_signature("secret", "order_1", "pay_1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn payment_signature_depends_on_all_inputs() {
        let base = payment_signature("secret", "order_1", "pay_1");
        assert_ne!(base, payment_signature("other", "order_1", "pay_1"));
        assert_ne!(base, payment_signature("secret", "order_2", "pay_1"));
        assert_ne!(base, payment_signature("secret", "order_1", "pay_2"));
    }

    #[test]
    fn verify_rejects_tampering() {
        let sig = payment_signature("secret", "order_1", "pay_1");
        assert!(verify_signature(&sig, &sig));

        let mut tampered = sig.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        assert!(!verify_signature(&sig, &tampered));
        assert!(!verify_signature(&sig, ""));
    }
}
