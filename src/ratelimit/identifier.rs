//! Rate limit identifier derivation.
//!
//! Request handlers partition limiter state by client address or by a
//! domain key such as the participant logging in.

/// Header carrying the proxy chain of client addresses.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Header carrying the client address as seen by the edge proxy.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Identifier shared by every request that carries no address.
pub const ANONYMOUS_IDENTIFIER: &str = "anonymous";

/// Derive a per-client identifier from forwarding headers.
///
/// The first address in `X-Forwarded-For` wins, then `X-Real-IP`, then the
/// anonymous sentinel. Blank header values count as missing.
pub fn client_identifier(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    forwarded_for
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .or_else(|| real_ip.map(str::trim).filter(|addr| !addr.is_empty()))
        .unwrap_or(ANONYMOUS_IDENTIFIER)
        .to_string()
}

/// Identifier for login attempts against a participant account.
pub fn login_identifier(participant_id: &str) -> String {
    format!("login:{}", participant_id)
}
