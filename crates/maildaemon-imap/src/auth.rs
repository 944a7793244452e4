//! SASL initial responses.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Builds the XOAUTH2 initial response for `user` and a bearer token.
///
/// The payload is `user=<user>^Aauth=Bearer <token>^A^A`, base64-encoded.
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    STANDARD.encode(format!("user={user}\x01auth=Bearer {token}\x01\x01"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_xoauth2_response() {
        let encoded = xoauth2_response(
            "someuser@example.com",
            "ya29.vF9dft4qmTc2Nvb3RlckBhdHRhdmlzdGEuY29tCg",
        );
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(
            decoded,
            b"user=someuser@example.com\x01auth=Bearer ya29.vF9dft4qmTc2Nvb3RlckBhdHRhdmlzdGEuY29tCg\x01\x01"
        );
    }
}
