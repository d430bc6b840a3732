//! Identity resolution and naming.
//!
//! The client never decides what the local display name *is*. It asks an
//! [`IdentityResolver`] and copes with whatever comes back, including nothing.

use sha1::{Digest, Sha1};

/// Display names are capped at this many characters everywhere they enter the
/// client.
pub const MAX_NAME_LEN: usize = 24;

/// Produces the current display name from wherever the host keeps it.
/// May return an empty string when no name can be determined.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self) -> String;
}

/// Resolver returning a fixed name (CLI `--name`).
pub struct FixedName(String);

impl FixedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl IdentityResolver for FixedName {
    fn resolve(&self) -> String {
        self.0.clone()
    }
}

/// Resolver reading `SHOAL_NAME` on every call, so changing the variable in
/// the hosting environment takes effect on the next sync tick.
pub struct EnvName;

impl IdentityResolver for EnvName {
    fn resolve(&self) -> String {
        std::env::var("SHOAL_NAME").unwrap_or_default()
    }
}

/// Random `player-xxxxx` fallback used when the resolver yields nothing at
/// startup.
pub fn guest_name() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let suffix: String = (0..5)
        .map(|_| char::from_digit(rng.random_range(0..36), 36).unwrap_or('0'))
        .collect();
    format!("player-{suffix}")
}

/// Clip a name to [`MAX_NAME_LEN`] characters.
pub fn clip_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LEN).collect()
}

/// Identity hash: lowercase hex SHA-1 of the normalized (lowercased, trimmed)
/// `"<tag>:<nickname>"` pair.
///
/// Computed only for this client's own outbound skin announcements; hashes on
/// inbound frames stay opaque keys.
pub fn name_hash(tag: &str, nick: &str) -> String {
    let normalized = format!("{tag}:{nick}").to_lowercase();
    let digest = Sha1::digest(normalized.trim().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
