// Handle normalization: callers may pass "@name", a bare name, or a profile URL.

use crate::post::Provider;

/// Detect the provider from a profile URL. Returns None for anything that is
/// not a recognised profile URL.
pub fn detect_provider(target: &str) -> Option<Provider> {
    let lower = target.trim().to_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let (host, path) = rest.split_once('/')?;
    if path.is_empty() {
        return None;
    }
    match host.trim_start_matches("www.").trim_start_matches("mobile.") {
        "bsky.app" => Some(Provider::Bluesky),
        "twitter.com" | "x.com" => Some(Provider::Twitter),
        _ => None,
    }
}

/// Reduce a user reference to the bare handle.
/// "https://bsky.app/profile/jay.bsky.team/" → "jay.bsky.team"
/// "https://x.com/jack/status/20" → "jack"
/// "@jack" → "jack"
pub fn normalize_handle(target: &str) -> String {
    let trimmed = target.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);

    let mut segments = without_scheme.split(['/', '?', '#']).filter(|s| !s.is_empty());
    let handle = match detect_provider(trimmed) {
        Some(Provider::Bluesky) => {
            // bsky.app/profile/<handle>/...
            segments.find(|s| *s != "bsky.app" && *s != "www.bsky.app" && *s != "profile")
        }
        Some(Provider::Twitter) => segments.nth(1),
        None => Some(without_scheme),
    };

    handle
        .unwrap_or(trimmed)
        .trim()
        .trim_start_matches('@')
        .to_string()
}
