//! Stream token generation and local-token packing.
//!
//! A stream session is addressed externally by a `remote_token` embedded in
//! the stream URL, and internally by a `local_token` that also binds the
//! token to the specific message it was minted for, so a leaked/replayed
//! `remote_token` can never be combined with a different `message_id`.

/// Generates a fresh 64-bit remote token.
///
/// Not cryptographically significant beyond collision resistance: the token
/// is opaque and short-lived, not a security boundary against a network
/// attacker (see the Non-goals in the design notes).
#[must_use]
pub fn random_remote_token() -> u64 {
    rand::random()
}

/// Packs a `(remote_token, message_id)` pair into the 128-bit local token
/// that keys every per-session structure (downloaded-block set, transport
/// set, idle debounce, device ownership).
///
/// `local_token = (remote_token << 64) ^ message_id`.
#[must_use]
pub fn serialize_token(remote_token: u64, message_id: u64) -> u128 {
    ((remote_token as u128) << 64) ^ (message_id as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_token_matches_packing_law() {
        assert_eq!(serialize_token(0, 0), 0);
        assert_eq!(serialize_token(1, 0), 1);
        assert_eq!(serialize_token(1, 1), (1u128 << 64) + 1);
        assert_eq!(serialize_token(2, 1), (1u128 << 64) + 2);
        assert_eq!(serialize_token(1, 2), (2u128 << 64) + 1);
    }

    #[test]
    fn distinct_message_ids_never_collide_for_same_remote_token() {
        let a = serialize_token(42, 100);
        let b = serialize_token(42, 101);
        assert_ne!(a, b);
    }
}
