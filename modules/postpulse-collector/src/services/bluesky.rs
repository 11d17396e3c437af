// Bluesky service: author feeds and post search over an authenticated AT
// Protocol session. Feed documents are read as loose JSON so that posts with
// embed types we don't model (video, records with media) still come through.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use bluesky_client::{BlueskyClient, BlueskyError, Profile};
use postpulse_common::error::excerpt;
use postpulse_common::text_extract::{extract_hashtags, extract_mentions};
use postpulse_common::{
    parse_timestamp, BlueskyCredentials, CollectError, Config, NewPost, ParseError, Post, Provider,
    Result,
};

use crate::latch::FatalLatch;
use crate::rate_limit::RateLimiter;
use crate::resilient::{count, object, optional_str, parse_each, required_str, string_list};
use crate::traits::{CollectQuery, FeedTarget, Page, PostCollector, QueryKind};

const PAGE_BOUNDS: (u32, u32) = (1, 100);
const TAG_FEATURE: &str = "app.bsky.richtext.facet#tag";

/// Every request the client makes, including session refreshes and retries,
/// waits on this collector's rate limiter.
pub struct BlueskyCollector {
    client: BlueskyClient,
    latch: FatalLatch,
    identifier: String,
    password: String,
}

impl BlueskyCollector {
    /// Validate credentials and build the client. No request is made; use
    /// [`BlueskyCollector::connect`] to get a logged-in collector.
    pub fn new(credentials: Option<&BlueskyCredentials>, config: &Config) -> Result<Self> {
        let creds = credentials
            .filter(|c| !c.handle.trim().is_empty() && !c.password.trim().is_empty())
            .ok_or_else(|| {
                CollectError::Configuration(
                    "Bluesky credentials (BLUESKY_HANDLE, BLUESKY_PASSWORD) must be set".into(),
                )
            })?;

        let limiter = Arc::new(RateLimiter::new(config.rate_limit)?);
        let client = BlueskyClient::new(config.request_timeout)
            .map_err(|e| CollectError::provider(None, &e.to_string()))?
            .with_pacer(limiter);
        let client = match &config.bluesky_service {
            Some(service) => client.with_service(service),
            None => client,
        };

        Ok(Self {
            client,
            latch: FatalLatch::default(),
            identifier: creds.handle.trim().trim_start_matches('@').to_string(),
            password: creds.password.clone(),
        })
    }

    /// Build and log in. Any login failure is an authentication error and no
    /// collector is returned.
    pub async fn connect(credentials: Option<&BlueskyCredentials>, config: &Config) -> Result<Self> {
        let collector = Self::new(credentials, config)?;
        collector
            .client
            .login(&collector.identifier, &collector.password)
            .await
            .map_err(|e| {
                CollectError::Authentication(format!(
                    "Bluesky login failed: {}",
                    excerpt(&e.to_string())
                ))
            })?;
        info!(identifier = %collector.identifier, "Bluesky collector ready");
        Ok(collector)
    }

    /// Display fields of an account.
    pub async fn profile(&self, handle: &str) -> Result<Profile> {
        let handle = handle.trim().trim_start_matches('@');
        self.require_session().await?;
        let profile = self.client.profile(handle).await.map_err(|e| map_error(e, handle));
        self.latch.guard(Provider::Bluesky, profile)
    }

    /// Fails without I/O when there is no session or the collector was
    /// disabled by an earlier authentication failure.
    async fn require_session(&self) -> Result<()> {
        self.latch.check()?;
        if self.client.has_session().await {
            Ok(())
        } else {
            Err(CollectError::Authentication("no active Bluesky session".into()))
        }
    }
}

#[async_trait]
impl PostCollector for BlueskyCollector {
    fn provider(&self) -> Provider {
        Provider::Bluesky
    }

    fn page_bounds(&self, _kind: QueryKind) -> (u32, u32) {
        PAGE_BOUNDS
    }

    async fn resolve(&self, query: &CollectQuery) -> Result<FeedTarget> {
        self.require_session().await?;
        match query {
            CollectQuery::Search(q) => Ok(FeedTarget::search(q)),
            CollectQuery::User(handle) => {
                let handle = handle.trim().trim_start_matches('@').to_string();
                Ok(FeedTarget {
                    query: query.clone(),
                    key: handle.clone(),
                    handle: Some(handle),
                })
            }
        }
    }

    async fn fetch_page(
        &self,
        target: &FeedTarget,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page> {
        self.require_session().await?;

        let (doc, items_field) = match target.query {
            CollectQuery::Search(_) => (
                self.client.search_posts(&target.key, page_size, cursor).await,
                "posts",
            ),
            CollectQuery::User(_) => (
                self.client.author_feed(&target.key, page_size, cursor).await,
                "feed",
            ),
        };
        let doc = self
            .latch
            .guard(Provider::Bluesky, doc.map_err(|e| map_error(e, &target.key)))?;

        let items = doc
            .get(items_field)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                CollectError::provider(None, &format!("response has no `{items_field}` array"))
            })?;

        let parsed = match target.query {
            CollectQuery::Search(_) => parse_each(Provider::Bluesky, items, parse_post_view),
            CollectQuery::User(_) => parse_each(Provider::Bluesky, items, |item| {
                parse_post_view(object(item, "post")?)
            }),
        };

        let next_cursor = doc
            .get("cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        debug!(
            key = %target.key,
            received = items.len(),
            parsed = parsed.posts.len(),
            skipped = parsed.skipped,
            has_next = next_cursor.is_some(),
            "Bluesky page fetched"
        );

        Ok(Page {
            posts: parsed.posts,
            skipped: parsed.skipped,
            next_cursor,
        })
    }
}

/// Convert one `app.bsky.feed.defs#postView` into a [`Post`].
pub fn parse_post_view(view: &Value) -> std::result::Result<Post, ParseError> {
    let uri = required_str(view, "uri")?;
    let rkey = uri
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::Invalid(format!("post uri has no record key: {uri}")))?;

    let author = object(view, "author")?;
    let handle = required_str(author, "handle")?;
    let display_name = optional_str(author, "displayName")?;

    let record = object(view, "record")?;
    let text = optional_str(record, "text")?.unwrap_or_default();

    let created_at = optional_str(record, "createdAt")
        .ok()
        .flatten()
        .and_then(parse_timestamp)
        .or_else(|| {
            optional_str(view, "indexedAt")
                .ok()
                .flatten()
                .and_then(parse_timestamp)
        });

    NewPost {
        id: rkey.to_string(),
        provider: Provider::Bluesky,
        content: text.to_string(),
        author_display_name: display_name.map(str::to_string),
        author_handle: handle.to_string(),
        created_at,
        like_count: count(view, "likeCount"),
        repost_count: count(view, "repostCount"),
        reply_count: count(view, "replyCount"),
        url: None,
        hashtags: hashtags(record, text),
        mentions: extract_mentions(text),
        language: string_list(record, "langs").into_iter().next(),
    }
    .build()
}

/// `record.tags`, else `#tag` facet features, else tokens in the text.
fn hashtags(record: &Value, text: &str) -> Vec<String> {
    let tags = string_list(record, "tags");
    if !tags.is_empty() {
        return tags;
    }

    let facet_tags: Vec<String> = record
        .get("facets")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|facet| facet.get("features").and_then(Value::as_array))
        .flatten()
        .filter(|feature| feature.get("$type").and_then(Value::as_str) == Some(TAG_FEATURE))
        .filter_map(|feature| feature.get("tag").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if !facet_tags.is_empty() {
        return facet_tags;
    }

    extract_hashtags(text)
}

fn map_error(err: BlueskyError, subject: &str) -> CollectError {
    match err {
        BlueskyError::NoSession => CollectError::Authentication("no active Bluesky session".into()),
        BlueskyError::Api { status, error, message } => {
            let name = error.as_deref().unwrap_or_default();
            match (status, name) {
                (401, _) | (_, "ExpiredToken" | "InvalidToken" | "AuthenticationRequired") => {
                    CollectError::Authentication(excerpt(&message))
                }
                (404, _) => CollectError::NotFound(subject.to_string()),
                (400, "InvalidRequest") if message.to_lowercase().contains("not found") => {
                    CollectError::NotFound(subject.to_string())
                }
                _ => CollectError::provider(Some(status), &message),
            }
        }
        BlueskyError::Network(detail) | BlueskyError::Parse(detail) => {
            CollectError::provider(None, &detail)
        }
    }
}
