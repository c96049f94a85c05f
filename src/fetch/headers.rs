//! Browser-like outbound request headers

use rand::seq::SliceRandom;

use crate::render::HeaderSet;

/// Current desktop browser user agents
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Pick a user agent from the pool
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

impl HeaderSet {
    /// Headers a desktop browser would send for a top-level navigation
    pub fn browser_like() -> Self {
        Self {
            user_agent: random_user_agent().to_string(),
            extra: vec![
                ("Accept".to_string(), ACCEPT.to_string()),
                ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
                ("Cache-Control".to_string(), "no-cache".to_string()),
                ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
            ],
        }
    }
}
