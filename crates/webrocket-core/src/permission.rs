//! Single-access tokens scoped to a channel-name pattern (spec §3, §4.D).

use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha512};

/// A minted, consume-once grant: a regex scoping which channel names it
/// authorizes, paired with the token a client presents to redeem it.
pub struct Permission {
    pattern: Regex,
    pub single_access_token: String,
}

impl Permission {
    /// Mint a new permission. The pattern is anchored so a partial match
    /// can't smuggle in an unintended channel (spec §3: "Matches a channel
    /// iff the regex (anchored) accepts the full channel name").
    pub fn mint(pattern_src: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!("^(?:{pattern_src})$"))?;
        Ok(Self {
            pattern,
            single_access_token: generate_single_access_token(),
        })
    }

    pub fn matches(&self, channel_name: &str) -> bool {
        self.pattern.is_match(channel_name)
    }
}

/// 128-hex SHA-512 of 32 random bytes (spec §3).
fn generate_single_access_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(Sha512::digest(bytes))
}
