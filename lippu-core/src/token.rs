//! Opaque order tokens.
//!
//! Orders are addressed externally (customer links, payment callback URLs)
//! by a signed token instead of the raw UUID, so a notification for one
//! order cannot be redirected to another by editing the URL. The wire
//! format is:
//!
//! ```text
//! {base32(order_uuid)}.{base32(hmac_sha256(order_uuid, key))}
//! ```
//!
//! Base32 (RFC 4648, no padding) keeps the token path-segment safe.

use uuid::Uuid;

/// Codec for encoding order ids to tamper-resistant tokens and back.
///
/// Injected as a capability into the payment session initiator and the
/// webhook handler; independent of the storage layer.
pub struct OrderTokenCodec {
    key: ring::hmac::Key,
}

/// Errors produced when decoding a presented token.
///
/// Deliberately coarse: callers respond identically to all variants so a
/// probing client cannot distinguish "bad signature" from "no such order".
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    SignatureMismatch,
}

impl From<ring::error::Unspecified> for TokenError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

impl OrderTokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret),
        }
    }

    /// Encode an order id as `{base32(id)}.{base32(tag)}`.
    pub fn encode(&self, order_id: Uuid) -> String {
        let tag = ring::hmac::sign(&self.key, order_id.as_bytes());
        format!(
            "{}.{}",
            fast32::base32::RFC4648_NOPAD.encode(order_id.as_bytes()),
            fast32::base32::RFC4648_NOPAD.encode(tag.as_ref()),
        )
    }

    /// Decode and authenticate a token, returning the order id it binds.
    pub fn decode(&self, token: &str) -> Result<Uuid, TokenError> {
        let dot = token.find('.').ok_or(TokenError::Malformed)?;
        let id_bytes = fast32::base32::RFC4648_NOPAD
            .decode_str(&token[..dot])
            .map_err(|_| TokenError::Malformed)?;
        let tag = fast32::base32::RFC4648_NOPAD
            .decode_str(&token[dot + 1..])
            .map_err(|_| TokenError::Malformed)?;
        let order_id = Uuid::from_slice(&id_bytes).map_err(|_| TokenError::Malformed)?;
        ring::hmac::verify(&self.key, order_id.as_bytes(), &tag)?;
        Ok(order_id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn round_trip() {
        let codec = OrderTokenCodec::new(b"test-secret");
        let id = Uuid::new_v4();
        let token = codec.encode(id);
        assert_eq!(codec.decode(&token).ok(), Some(id));
    }

    #[test]
    fn token_is_path_segment_safe() {
        let codec = OrderTokenCodec::new(b"test-secret");
        let token = codec.encode(Uuid::new_v4());
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.')
        );
    }

    #[test]
    fn tampered_id_is_rejected() {
        let codec = OrderTokenCodec::new(b"test-secret");
        let token = codec.encode(Uuid::new_v4());
        let other = codec.encode(Uuid::new_v4());
        // Graft the signature of one token onto the id of another.
        let spliced = format!(
            "{}.{}",
            token.split('.').next().unwrap(),
            other.split('.').nth(1).unwrap(),
        );
        assert!(matches!(
            codec.decode(&spliced),
            Err(TokenError::SignatureMismatch)
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let id = Uuid::new_v4();
        let token = OrderTokenCodec::new(b"key-a").encode(id);
        assert!(OrderTokenCodec::new(b"key-b").decode(&token).is_err());
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = OrderTokenCodec::new(b"test-secret");
        for bad in ["", "no-dot", "???.???", "AAAA.AAAA"] {
            assert!(codec.decode(bad).is_err(), "accepted {bad:?}");
        }
    }
}
