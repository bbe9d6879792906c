use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

use super::domain::{EnrollmentLink, LeadId, LinkToken, SellerId};

/// Fixed length of enrollment-link tokens.
pub const TOKEN_LEN: usize = 32;

// 64 URL-safe symbols so each random byte maps to one character without bias.
const TOKEN_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Derive a URL-safe token from the supplied entropy source.
///
/// Pure function of the source: no shared generator state, safe to call from
/// concurrent requests.
pub fn generate_token(rng: &mut dyn RngCore) -> LinkToken {
    let mut bytes = [0u8; TOKEN_LEN];
    rng.fill_bytes(&mut bytes);
    let token: String = bytes
        .iter()
        .map(|byte| TOKEN_ALPHABET[(byte & 0x3f) as usize] as char)
        .collect();
    LinkToken(token)
}

/// Fresh token backed by the operating system's CSPRNG.
pub fn fresh_token() -> LinkToken {
    generate_token(&mut OsRng)
}

/// Build the link record for a lead, expiring `ttl_days` from issuance.
pub fn issue(
    lead_id: LeadId,
    seller_id: SellerId,
    token: LinkToken,
    now: DateTime<Utc>,
    ttl_days: i64,
) -> EnrollmentLink {
    EnrollmentLink {
        token,
        lead_id,
        seller_id,
        issued_at: now,
        expires_at: now + Duration::days(ttl_days),
        used: false,
        used_at: None,
    }
}
