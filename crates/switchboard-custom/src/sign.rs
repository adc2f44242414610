// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `X-Switchboard-Sign` body signatures: hex HMAC-SHA256 with the shared
//! secret.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGN_HEADER: &str = "X-Switchboard-Sign";

type HmacSha256 = Hmac<Sha256>;

pub fn sign(body: &[u8], secret: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a presented hex signature.
pub fn verify(body: &[u8], secret: &str, signature: &str) -> bool {
    let Ok(presented) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&presented).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2.
        assert_eq!(
            sign(b"what do ya want for nothing?", "Jefe").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verify_accepts_own_signature_only() {
        let body = br#"{"close":{"chatId":"42"}}"#;
        let signature = sign(body, "s3cret").unwrap();
        assert!(verify(body, "s3cret", &signature));
        assert!(verify(body, "s3cret", &signature.to_uppercase()));
        assert!(!verify(body, "other", &signature));
        assert!(!verify(b"tampered", "s3cret", &signature));
        assert!(!verify(body, "s3cret", "not-hex"));
        assert!(!verify(body, "s3cret", ""));
    }
}
