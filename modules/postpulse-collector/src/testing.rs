// Test doubles for the collector seams.
//
// - MockCollector (PostCollector): scripted pages, records every page request
// - FixedScorer (SentimentScorer): keyword-based, deterministic
//
// Plus `sample_post` for building posts without a provider payload.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use postpulse_common::{CollectError, NewPost, Post, Provider, Result};

use crate::analysis::{ScoreError, Sentiment, SentimentScore, SentimentScorer};
use crate::traits::{CollectQuery, FeedTarget, Page, PostCollector, QueryKind};

// ---------------------------------------------------------------------------
// MockCollector
// ---------------------------------------------------------------------------

/// Serves a fixed list of pages. Page `i` carries cursor `p{i+1}` unless it is
/// the last one. Builder: `.with_page()`, `.with_skipped()`, `.failing_at()`.
pub struct MockCollector {
    provider: Provider,
    bounds: (u32, u32),
    pages: Vec<Page>,
    failures: HashMap<usize, u16>,
    unknown_user: bool,
    requests: Mutex<Vec<(Option<String>, u32)>>,
    resolves: Mutex<usize>,
}

impl MockCollector {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            bounds: (1, 100),
            pages: Vec::new(),
            failures: HashMap::new(),
            unknown_user: false,
            requests: Mutex::new(Vec::new()),
            resolves: Mutex::new(0),
        }
    }

    pub fn with_bounds(mut self, min: u32, max: u32) -> Self {
        self.bounds = (min, max);
        self
    }

    pub fn with_page(self, posts: Vec<Post>) -> Self {
        self.with_skipped(posts, 0)
    }

    /// A page whose raw payload had `skipped` additional unparseable items.
    pub fn with_skipped(mut self, posts: Vec<Post>, skipped: usize) -> Self {
        self.pages.push(Page {
            posts,
            skipped,
            next_cursor: None,
        });
        self
    }

    /// Fetching page `index` fails with a provider error carrying `status`.
    pub fn failing_at(mut self, index: usize, status: u16) -> Self {
        self.failures.insert(index, status);
        self
    }

    /// User queries fail resolution with `NotFound`.
    pub fn with_unknown_user(mut self) -> Self {
        self.unknown_user = true;
        self
    }

    /// Every page request so far as `(cursor, page_size)`.
    pub fn requests(&self) -> Vec<(Option<String>, u32)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn resolve_count(&self) -> usize {
        *self.resolves.lock().unwrap()
    }
}

#[async_trait]
impl PostCollector for MockCollector {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn page_bounds(&self, _kind: QueryKind) -> (u32, u32) {
        self.bounds
    }

    async fn resolve(&self, query: &CollectQuery) -> Result<FeedTarget> {
        *self.resolves.lock().unwrap() += 1;
        match query {
            CollectQuery::User(handle) if self.unknown_user => {
                Err(CollectError::NotFound(handle.clone()))
            }
            CollectQuery::User(handle) => Ok(FeedTarget {
                query: query.clone(),
                key: handle.clone(),
                handle: Some(handle.clone()),
            }),
            CollectQuery::Search(q) => Ok(FeedTarget::search(q)),
        }
    }

    async fn fetch_page(
        &self,
        _target: &FeedTarget,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page> {
        self.requests
            .lock()
            .unwrap()
            .push((cursor.map(str::to_string), page_size));

        let index = match cursor {
            None => 0,
            Some(c) => c
                .strip_prefix('p')
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| CollectError::provider(Some(400), "bad cursor"))?,
        };

        if let Some(status) = self.failures.get(&index) {
            return Err(CollectError::provider(Some(*status), "scripted failure"));
        }

        let Some(page) = self.pages.get(index) else {
            return Ok(Page::default());
        };
        let mut page = page.clone();
        if index + 1 < self.pages.len() {
            page.next_cursor = Some(format!("p{}", index + 1));
        }
        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// FixedScorer
// ---------------------------------------------------------------------------

/// Keyword scorer: "error" fails, "love" is strongly positive, "great"/"good"
/// positive, "bad"/"hate"/"awful" negative, anything else neutral.
pub struct FixedScorer;

impl SentimentScorer for FixedScorer {
    fn analyze(&self, text: &str) -> std::result::Result<SentimentScore, ScoreError> {
        let lower = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        let (sentiment, score) = if has(&["error"]) {
            return Err(ScoreError("scripted scorer failure".into()));
        } else if has(&["love"]) {
            (Sentiment::Positive, 0.95)
        } else if has(&["great", "good"]) {
            (Sentiment::Positive, 0.8)
        } else if has(&["bad", "hate", "awful"]) {
            (Sentiment::Negative, 0.85)
        } else {
            (Sentiment::Neutral, 0.6)
        };

        let label = match sentiment {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Negative => "NEGATIVE",
            _ => "NEUTRAL",
        };

        Ok(SentimentScore {
            label: label.into(),
            score,
            sentiment,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A post by `tester` with fixed timestamp and no counts.
pub fn sample_post(provider: Provider, id: &str, text: &str) -> Post {
    NewPost {
        id: id.to_string(),
        provider,
        content: text.to_string(),
        author_display_name: None,
        author_handle: "tester".to_string(),
        created_at: chrono::DateTime::from_timestamp(1_700_000_000, 0),
        like_count: 0,
        repost_count: 0,
        reply_count: 0,
        url: None,
        hashtags: Vec::new(),
        mentions: Vec::new(),
        language: None,
    }
    .build()
    .expect("sample post is valid")
}

/// `n` sample posts with ids `{prefix}0..{prefix}{n-1}`.
pub fn sample_posts(provider: Provider, prefix: &str, n: usize) -> Vec<Post> {
    (0..n)
        .map(|i| sample_post(provider, &format!("{prefix}{i}"), &format!("post {i}")))
        .collect()
}
