use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// The provider a post was collected from. Post ids are only unique within one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Twitter,
    Bluesky,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Twitter => "twitter",
            Provider::Bluesky => "bluesky",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(Provider::Twitter),
            "bluesky" | "bsky" => Ok(Provider::Bluesky),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// A provider-agnostic social media post.
///
/// Only built through [`NewPost::build`] (or deserialization, which runs the same
/// checks), so `id`, `author_handle` and `url` are never empty. There are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PostRecord")]
pub struct Post {
    id: String,
    provider: Provider,
    content: String,
    author_display_name: String,
    author_handle: String,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    created_at_fallback: bool,
    like_count: u64,
    repost_count: u64,
    reply_count: u64,
    url: String,
    hashtags: Vec<String>,
    mentions: Vec<String>,
    language: Option<String>,
}

impl Post {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn author_display_name(&self) -> &str {
        &self.author_display_name
    }

    pub fn author_handle(&self) -> &str {
        &self.author_handle
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when the provider timestamp was missing or unparseable and
    /// `created_at` holds the epoch sentinel instead.
    pub fn created_at_fallback(&self) -> bool {
        self.created_at_fallback
    }

    pub fn like_count(&self) -> u64 {
        self.like_count
    }

    pub fn repost_count(&self) -> u64 {
        self.repost_count
    }

    pub fn reply_count(&self) -> u64 {
        self.reply_count
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn hashtags(&self) -> &[String] {
        &self.hashtags
    }

    pub fn mentions(&self) -> &[String] {
        &self.mentions
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

/// Raw material for a [`Post`]. Parsers fill this in from a provider item and
/// call [`NewPost::build`], which applies defaults and checks invariants.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: String,
    pub provider: Provider,
    pub content: String,
    pub author_display_name: Option<String>,
    pub author_handle: String,
    pub created_at: Option<DateTime<Utc>>,
    pub like_count: u64,
    pub repost_count: u64,
    pub reply_count: u64,
    /// Provider-supplied permalink. Built from handle + id when absent.
    pub url: Option<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub language: Option<String>,
}

impl NewPost {
    pub fn build(self) -> Result<Post, ParseError> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(ParseError::Empty("id"));
        }
        let author_handle = self.author_handle.trim().trim_start_matches('@').to_string();
        if author_handle.is_empty() {
            return Err(ParseError::Empty("author_handle"));
        }

        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| permalink(self.provider, &author_handle, &id));

        let author_display_name = self
            .author_display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| author_handle.clone());

        let (created_at, created_at_fallback) = match self.created_at {
            Some(ts) => (ts, false),
            None => (DateTime::<Utc>::UNIX_EPOCH, true),
        };

        Ok(Post {
            id,
            provider: self.provider,
            content: self.content,
            author_display_name,
            author_handle,
            created_at,
            created_at_fallback,
            like_count: self.like_count,
            repost_count: self.repost_count,
            reply_count: self.reply_count,
            url,
            hashtags: strip_prefixes(self.hashtags, '#'),
            mentions: strip_prefixes(self.mentions, '@'),
            language: self.language.filter(|l| !l.trim().is_empty()),
        })
    }
}

/// Canonical permalink for a post on `provider`.
pub fn permalink(provider: Provider, handle: &str, id: &str) -> String {
    match provider {
        Provider::Twitter => format!("https://twitter.com/{handle}/status/{id}"),
        Provider::Bluesky => format!("https://bsky.app/profile/{handle}/post/{id}"),
    }
}

/// Parse a provider timestamp. Accepts RFC 3339 and the zone-less
/// `YYYY-MM-DDTHH:MM:SS[.fff]` form some AT Protocol clients write (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn strip_prefixes(values: Vec<String>, prefix: char) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().trim_start_matches(prefix).to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Wire shape used when reading a stored/transported post back in.
#[derive(Deserialize)]
struct PostRecord {
    id: String,
    provider: Provider,
    #[serde(default)]
    content: String,
    #[serde(default)]
    author_display_name: Option<String>,
    author_handle: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    created_at_fallback: bool,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    repost_count: u64,
    #[serde(default)]
    reply_count: u64,
    url: String,
    #[serde(default)]
    hashtags: Vec<String>,
    #[serde(default)]
    mentions: Vec<String>,
    #[serde(default)]
    language: Option<String>,
}

impl TryFrom<PostRecord> for Post {
    type Error = ParseError;

    fn try_from(record: PostRecord) -> Result<Self, Self::Error> {
        if record.url.trim().is_empty() {
            return Err(ParseError::Empty("url"));
        }
        let mut post = NewPost {
            id: record.id,
            provider: record.provider,
            content: record.content,
            author_display_name: record.author_display_name,
            author_handle: record.author_handle,
            created_at: Some(record.created_at),
            like_count: record.like_count,
            repost_count: record.repost_count,
            reply_count: record.reply_count,
            url: Some(record.url),
            hashtags: record.hashtags,
            mentions: record.mentions,
            language: record.language,
        }
        .build()?;
        post.created_at_fallback = record.created_at_fallback;
        Ok(post)
    }
}
