pub mod error;
pub mod oauth;
pub mod types;

pub use error::{Result, TwitterError};
pub use oauth::Credentials;
pub use types::{ApiProblem, PageMeta, TweetPage, TwitterUser, UserLookup};

use std::time::Duration;

use serde::de::DeserializeOwned;

use oauth::{encode, OAuthSigner};
use types::{EXPANSIONS, TWEET_FIELDS, USER_FIELDS};

const BASE_URL: &str = "https://api.twitter.com";

pub struct TwitterClient {
    client: reqwest::Client,
    signer: OAuthSigner,
    base_url: String,
}

impl TwitterClient {
    /// Build a client. Fails immediately if any of the four credentials is blank.
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        credentials
            .validate()
            .map_err(TwitterError::MissingCredential)?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            signer: OAuthSigner::new(credentials),
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Recent search (last 7 days). `max_results` must already be within the
    /// endpoint's 10..=100 range.
    pub async fn search_recent(
        &self,
        query: &str,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<TweetPage> {
        let mut params = tweet_params(max_results);
        params.push(("query".into(), query.to_string()));
        if let Some(token) = next_token {
            params.push(("next_token".into(), token.to_string()));
        }

        tracing::debug!(query, max_results, "Twitter recent search request");
        self.get("/2/tweets/search/recent", params).await
    }

    /// Resolve a username to its user record. `Ok(None)` when the username does
    /// not exist.
    pub async fn user_by_username(&self, username: &str) -> Result<Option<TwitterUser>> {
        let path = format!("/2/users/by/username/{}", encode(username));
        let params = vec![("user.fields".into(), USER_FIELDS.to_string())];

        let lookup: UserLookup = self.get(&path, params).await?;
        if lookup.data.is_none() {
            let detail = lookup
                .errors
                .first()
                .and_then(|e| e.detail.clone())
                .unwrap_or_default();
            tracing::debug!(username, detail, "Twitter username did not resolve");
        }
        Ok(lookup.data)
    }

    /// One page of a user's timeline. `max_results` must already be within the
    /// endpoint's 5..=100 range.
    pub async fn user_tweets(
        &self,
        user_id: &str,
        max_results: u32,
        pagination_token: Option<&str>,
    ) -> Result<TweetPage> {
        let path = format!("/2/users/{}/tweets", encode(user_id));
        let mut params = tweet_params(max_results);
        if let Some(token) = pagination_token {
            params.push(("pagination_token".into(), token.to_string()));
        }

        tracing::debug!(user_id, max_results, "Twitter user timeline request");
        self.get(&path, params).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: Vec<(String, String)>) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let auth = self.signer.authorization_header("GET", &url, &params);

        // Query built by hand so it is encoded exactly as it was signed.
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let full_url = if query.is_empty() {
            url
        } else {
            format!("{url}?{query}")
        };

        let resp = self
            .client
            .get(&full_url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TwitterError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn tweet_params(max_results: u32) -> Vec<(String, String)> {
    vec![
        ("max_results".into(), max_results.to_string()),
        ("tweet.fields".into(), TWEET_FIELDS.to_string()),
        ("expansions".into(), EXPANSIONS.to_string()),
        ("user.fields".into(), USER_FIELDS.to_string()),
    ]
}
