use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

// The leading group keeps e-mail addresses and URL fragments from matching.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w@#])@([\w][\w.\-]*)").expect("valid regex"));
static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w@#&])#(\w+)").expect("valid regex"));

/// Extract @mentions from text in order of first appearance. Deduplicated and
/// lowercased, without the @ prefix. Trailing dots are dropped so that
/// "thanks @bob." yields "bob".
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MENTION_RE
        .captures_iter(text)
        .filter_map(|c| {
            let name = c[1].trim_end_matches(['.', '-']).to_lowercase();
            (!name.is_empty() && seen.insert(name.clone())).then_some(name)
        })
        .collect()
}

/// Extract #hashtags from text in order of first appearance. Deduplicated and
/// lowercased, without the # prefix.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    HASHTAG_RE
        .captures_iter(text)
        .filter_map(|c| {
            let tag = c[1].to_lowercase();
            seen.insert(tag.clone()).then_some(tag)
        })
        .collect()
}

/// Most frequent words across `texts`, highest count first. Words are
/// lowercased with `#`/`@` removed; only alphabetic words longer than
/// `min_len` count. Ties keep first-seen order.
pub fn top_words<'a>(texts: impl IntoIterator<Item = &'a str>, top_n: usize, min_len: usize) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for text in texts {
        let cleaned = text.to_lowercase().replace(['#', '@'], "");
        for word in cleaned.split_whitespace() {
            if word.chars().count() <= min_len || !word.chars().all(char::is_alphabetic) {
                continue;
            }
            let count = counts.entry(word.to_string()).or_insert(0);
            if *count == 0 {
                order.push(word.to_string());
            }
            *count += 1;
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(top_n);
    order
}
