//! Anti-bot interstitial detection

/// Substrings that only appear on challenge pages
pub const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "challenge-platform",
    "cf_chl_opt",
    "_cf_chl",
    "Just a moment...",
    "Checking your browser",
    "DDoS protection by",
];

/// Whether the document looks like a challenge page
pub fn is_challenge(content: &str) -> bool {
    CHALLENGE_MARKERS
        .iter()
        .any(|marker| content.contains(marker))
}
