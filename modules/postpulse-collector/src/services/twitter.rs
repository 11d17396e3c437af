// Twitter/X service: recent search and user timelines over the legacy
// OAuth1-signed API. Every request is paced by the collector's rate limiter.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use postpulse_common::text_extract::{extract_hashtags, extract_mentions};
use postpulse_common::error::excerpt;
use postpulse_common::{
    parse_timestamp, CollectError, Config, NewPost, ParseError, Post, Provider, Result,
    TwitterCredentials,
};
use twitter_client::{Credentials, TwitterClient, TwitterError, TwitterUser};

use crate::latch::FatalLatch;
use crate::rate_limit::RateLimiter;
use crate::resilient::{count, optional_str, parse_each, required_str};
use crate::traits::{CollectQuery, FeedTarget, Page, PostCollector, QueryKind};

const SEARCH_BOUNDS: (u32, u32) = (10, 100);
const TIMELINE_BOUNDS: (u32, u32) = (5, 100);

pub struct TwitterCollector {
    client: TwitterClient,
    limiter: RateLimiter,
    latch: FatalLatch,
}

impl TwitterCollector {
    /// Fails with a configuration error when credentials are absent or blank.
    /// No request is made.
    pub fn new(credentials: Option<&TwitterCredentials>, config: &Config) -> Result<Self> {
        let creds = credentials.ok_or_else(|| {
            CollectError::Configuration("Twitter credentials are not configured".into())
        })?;

        let client = TwitterClient::new(
            Credentials {
                api_key: creds.api_key.clone(),
                api_secret: creds.api_secret.clone(),
                access_token: creds.access_token.clone(),
                access_token_secret: creds.access_token_secret.clone(),
            },
            config.request_timeout,
        )
        .map_err(map_error)?;

        let client = match &config.twitter_api_base {
            Some(base) => client.with_base_url(base),
            None => client,
        };

        info!(rate_limit = config.rate_limit, "Twitter collector ready");
        Ok(Self {
            client,
            limiter: RateLimiter::new(config.rate_limit)?,
            latch: FatalLatch::default(),
        })
    }
}

#[async_trait]
impl PostCollector for TwitterCollector {
    fn provider(&self) -> Provider {
        Provider::Twitter
    }

    fn page_bounds(&self, kind: QueryKind) -> (u32, u32) {
        match kind {
            QueryKind::Search => SEARCH_BOUNDS,
            QueryKind::User => TIMELINE_BOUNDS,
        }
    }

    async fn resolve(&self, query: &CollectQuery) -> Result<FeedTarget> {
        self.latch.check()?;
        match query {
            CollectQuery::Search(q) => Ok(FeedTarget::search(q)),
            CollectQuery::User(username) => {
                let username = username.trim().trim_start_matches('@');
                self.limiter.wait_turn().await;
                let lookup = self.client.user_by_username(username).await.map_err(map_error);
                let user = self
                    .latch
                    .guard(Provider::Twitter, lookup)?
                    .ok_or_else(|| CollectError::NotFound(username.to_string()))?;
                debug!(username, user_id = %user.id, "Twitter username resolved");
                Ok(FeedTarget {
                    query: query.clone(),
                    key: user.id,
                    handle: Some(user.username),
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
        self.latch.check()?;
        self.limiter.wait_turn().await;

        let page = match target.query {
            CollectQuery::Search(_) => self.client.search_recent(&target.key, page_size, cursor).await,
            CollectQuery::User(_) => self.client.user_tweets(&target.key, page_size, cursor).await,
        }
        .map_err(map_error);
        let page = self.latch.guard(Provider::Twitter, page)?;

        let users = page.includes.users_by_id();
        let fallback_author = target.handle.as_deref();
        let parsed = parse_each(Provider::Twitter, &page.data, |item| {
            parse_tweet(item, &users, fallback_author)
        });

        debug!(
            received = page.data.len(),
            parsed = parsed.posts.len(),
            skipped = parsed.skipped,
            has_next = page.meta.next_token.is_some(),
            "Twitter page fetched"
        );

        Ok(Page {
            posts: parsed.posts,
            skipped: parsed.skipped,
            next_cursor: page.meta.next_token,
        })
    }
}

/// Convert one raw tweet into a [`Post`]. Author comes from the expanded
/// `includes.users`, or the timeline owner when the expansion is missing.
///
/// Only `id` and an author are required. Optional fields that are absent or
/// of the wrong type fall back to defaults.
pub fn parse_tweet(
    item: &Value,
    users: &HashMap<String, TwitterUser>,
    fallback_author: Option<&str>,
) -> std::result::Result<Post, ParseError> {
    let id = required_str(item, "id")?;
    let text = optional_str(item, "text")?.unwrap_or_default();

    let author = optional_str(item, "author_id")
        .ok()
        .flatten()
        .and_then(|author_id| users.get(author_id));
    let (handle, display_name) = match (author, fallback_author) {
        (Some(user), _) => (user.username.clone(), user.name.clone()),
        (None, Some(handle)) => (handle.to_string(), None),
        (None, None) => return Err(ParseError::Missing("author")),
    };

    let (hashtags, mentions) = match item.get("entities").filter(|e| e.is_object()) {
        Some(entities) => (
            entity_values(entities, "hashtags", "tag"),
            entity_values(entities, "mentions", "username"),
        ),
        None => (extract_hashtags(text), extract_mentions(text)),
    };

    let metrics = item.get("public_metrics").unwrap_or(&Value::Null);

    NewPost {
        id: id.to_string(),
        provider: Provider::Twitter,
        content: text.to_string(),
        author_display_name: display_name,
        author_handle: handle,
        created_at: optional_str(item, "created_at")
            .ok()
            .flatten()
            .and_then(parse_timestamp),
        like_count: count(metrics, "like_count"),
        repost_count: count(metrics, "retweet_count"),
        reply_count: count(metrics, "reply_count"),
        url: None,
        hashtags,
        mentions,
        language: optional_str(item, "lang")
            .ok()
            .flatten()
            .filter(|l| *l != "und")
            .map(str::to_string),
    }
    .build()
}

/// `entities.<list>[*].<field>` strings. Entries without a usable value are dropped.
fn entity_values(entities: &Value, list: &str, field: &str) -> Vec<String> {
    entities
        .get(list)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entity| entity.get(field).and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn map_error(err: TwitterError) -> CollectError {
    match err {
        TwitterError::MissingCredential(field) => {
            CollectError::Configuration(format!("Twitter credential `{field}` is blank"))
        }
        TwitterError::Api {
            status: 401 | 403,
            message,
        } => CollectError::Authentication(format!(
            "Twitter rejected the credentials: {}",
            excerpt(&message)
        )),
        TwitterError::Api { status: 404, message } => CollectError::NotFound(excerpt(&message)),
        TwitterError::Api { status, message } => CollectError::provider(Some(status), &message),
        TwitterError::Network(detail) | TwitterError::Parse(detail) => {
            CollectError::provider(None, &detail)
        }
    }
}
