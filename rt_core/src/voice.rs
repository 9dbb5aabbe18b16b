//! Voice token issuer (`spec.md` §4.5, §6): mints a short-lived SFU join
//! token carrying the player's name as identity. No voice bytes ever
//! traverse the session channel; the SFU is trusted and co-located.
//!
//! Grounded on `flux::crypto`'s pattern of a small signing wrapper around a
//! symmetric secret; the token shape itself (three base64url segments,
//! HMAC-SHA256 signed) follows the LiveKit access-token format named in
//! `spec.md` §6, built with `hmac`/`sha2`/`base64` rather than pulling in
//! the `livekit-api` client crate this server only needs the mint half of.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Grants embedded in the token's `video` claim (`spec.md` §4.5: "publish
/// and subscribe grants").
#[derive(Serialize)]
struct VideoGrant<'a> {
    room: &'a str,
    #[serde(rename = "roomJoin")]
    room_join: bool,
    #[serde(rename = "canPublish")]
    can_publish: bool,
    #[serde(rename = "canSubscribe")]
    can_subscribe: bool,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    sub: &'a str,
    exp: i64,
    nbf: i64,
    video: VideoGrant<'a>,
}

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

/// Mints an SFU join token for `player_name` in `room_name`, signed with
/// `api_key`/`api_secret`, valid from `issued_at_unix` for `ttl_seconds`.
///
/// `issued_at_unix` is taken as a parameter rather than read from the clock
/// internally so the mint is deterministic and testable; callers pass
/// `chrono::Utc::now().timestamp()` in production.
pub fn mint_token(
    api_key: &str,
    api_secret: &[u8],
    player_name: &str,
    room_name: &str,
    issued_at_unix: i64,
    ttl_seconds: i64,
) -> String {
    let header = Header { alg: "HS256", typ: "JWT" };
    let claims = Claims {
        iss: api_key,
        sub: player_name,
        exp: issued_at_unix + ttl_seconds,
        nbf: issued_at_unix,
        video: VideoGrant { room: room_name, room_join: true, can_publish: true, can_subscribe: true },
    };

    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).expect("header always serializes"));
    let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("claims always serialize"));
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(api_secret).expect("HMAC accepts any key length");
    mac.update(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{signing_input}.{signature_b64}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_three_dot_separated_segments() {
        let token = mint_token("key", b"secret", "alice", "world", 1_000, 3_600);
        assert_eq!(token.matches('.').count(), 2);
    }

    #[test]
    fn same_inputs_produce_the_same_token() {
        let a = mint_token("key", b"secret", "alice", "world", 1_000, 3_600);
        let b = mint_token("key", b"secret", "alice", "world", 1_000, 3_600);
        assert_eq!(a, b);
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let a = mint_token("key", b"secret-a", "alice", "world", 1_000, 3_600);
        let b = mint_token("key", b"secret-b", "alice", "world", 1_000, 3_600);
        assert_ne!(a, b);
    }
}
