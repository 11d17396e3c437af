// AT Protocol client. Feed endpoints return the raw JSON document: posts can
// carry embed types (video and friends) that strict schema validation rejects,
// so callers pick out the fields they need themselves.

pub mod error;
pub mod types;

pub use error::{BlueskyError, Result};
pub use types::{Profile, Session};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use types::{CreateSessionInput, XrpcErrorBody};

/// Default PDS entryway for password logins.
pub const DEFAULT_SERVICE: &str = "https://bsky.social";

const EXPIRED_TOKEN: &str = "ExpiredToken";

/// Awaited before every outbound request, including session refreshes and
/// retries.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait_turn(&self);
}

pub struct BlueskyClient {
    client: reqwest::Client,
    service: String,
    session: RwLock<Option<Session>>,
    /// Held for the whole refresh exchange. Refresh tokens are single-use.
    refresh_lock: Mutex<()>,
    pacer: Option<Arc<dyn Pacer>>,
}

impl BlueskyClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            service: DEFAULT_SERVICE.to_string(),
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            pacer: None,
        })
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    pub fn with_service(mut self, url: &str) -> Self {
        self.service = url.trim_end_matches('/').to_string();
        self
    }

    /// Create a session with handle (or DID/email) and password. The session is
    /// kept for all later calls.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Session> {
        info!(identifier, "bluesky: creating session");

        self.pace().await;
        let resp = self
            .client
            .post(self.xrpc_url("com.atproto.server.createSession"))
            .json(&CreateSessionInput {
                identifier,
                password,
            })
            .send()
            .await?;

        let session: Session = parse_response(resp).await?;
        info!(did = %session.did, handle = %session.handle, "bluesky: session created");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Exchange the refresh token for a new session.
    pub async fn refresh(&self) -> Result<Session> {
        let _exclusive = self.refresh_lock.lock().await;
        self.refresh_session().await
    }

    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// `app.bsky.feed.getAuthorFeed` as a raw document (`{"feed": [...], "cursor": ...}`).
    pub async fn author_feed(&self, actor: &str, limit: u32, cursor: Option<&str>) -> Result<Value> {
        let mut params = vec![("actor", actor.to_string()), ("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.xrpc_get("app.bsky.feed.getAuthorFeed", &params).await
    }

    /// `app.bsky.feed.searchPosts` as a raw document (`{"posts": [...], "cursor": ...}`).
    pub async fn search_posts(&self, query: &str, limit: u32, cursor: Option<&str>) -> Result<Value> {
        let mut params = vec![("q", query.to_string()), ("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.xrpc_get("app.bsky.feed.searchPosts", &params).await
    }

    pub async fn profile(&self, actor: &str) -> Result<Profile> {
        let value = self
            .xrpc_get("app.bsky.actor.getProfile", &[("actor", actor.to_string())])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Authenticated GET. An `ExpiredToken` answer triggers one session refresh
    /// and one retry.
    async fn xrpc_get(&self, nsid: &str, params: &[(&str, String)]) -> Result<Value> {
        let token = self.access_token().await?;
        match self.get_once(nsid, params, &token).await {
            Err(err) if err.xrpc_error() == Some(EXPIRED_TOKEN) => {
                warn!(nsid, "bluesky: access token expired, refreshing session");
                let fresh = self.refresh_after(&token).await?;
                self.get_once(nsid, params, &fresh).await
            }
            other => other,
        }
    }

    /// Refresh unless a concurrent caller already replaced `stale`. Returns the
    /// access token to retry with.
    async fn refresh_after(&self, stale: &str) -> Result<String> {
        let _exclusive = self.refresh_lock.lock().await;
        let current = self.access_token().await?;
        if current != stale {
            debug!("bluesky: session already refreshed by another request");
            return Ok(current);
        }
        Ok(self.refresh_session().await?.access_jwt)
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_session(&self) -> Result<Session> {
        let refresh_jwt = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_jwt.clone())
            .ok_or(BlueskyError::NoSession)?;

        debug!("bluesky: refreshing session");
        self.pace().await;
        let resp = self
            .client
            .post(self.xrpc_url("com.atproto.server.refreshSession"))
            .bearer_auth(refresh_jwt)
            .send()
            .await?;

        let session: Session = parse_response(resp).await?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn access_token(&self) -> Result<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_jwt.clone())
            .ok_or(BlueskyError::NoSession)
    }

    async fn get_once(&self, nsid: &str, params: &[(&str, String)], token: &str) -> Result<Value> {
        self.pace().await;
        let resp = self
            .client
            .get(self.xrpc_url(nsid))
            .query(params)
            .bearer_auth(token)
            .send()
            .await?;

        parse_response(resp).await
    }

    async fn pace(&self) {
        if let Some(pacer) = &self.pacer {
            pacer.wait_turn().await;
        }
    }

    fn xrpc_url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service, nsid)
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let parsed: XrpcErrorBody = serde_json::from_str(&body).unwrap_or_default();
        return Err(BlueskyError::Api {
            status: status.as_u16(),
            error: parsed.error,
            message: parsed.message.unwrap_or(body),
        });
    }

    Ok(serde_json::from_str(&body)?)
}
