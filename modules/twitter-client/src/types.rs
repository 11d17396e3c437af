use std::collections::HashMap;

use serde::Deserialize;

/// Fields requested on every tweet lookup.
pub const TWEET_FIELDS: &str = "created_at,public_metrics,lang,entities,author_id";
/// Author expansion so each tweet's user resolves from `includes.users`.
pub const EXPANSIONS: &str = "author_id";
pub const USER_FIELDS: &str = "username,name";

/// One page of tweets from a search or timeline endpoint.
///
/// `data` stays as raw JSON so a single malformed tweet can be skipped by the
/// caller instead of failing the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetPage {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub meta: PageMeta,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<serde_json::Value>,
}

impl Includes {
    /// Expanded authors keyed by user id. Entries that don't parse are ignored.
    pub fn users_by_id(&self) -> HashMap<String, TwitterUser> {
        self.users
            .iter()
            .filter_map(|raw| serde_json::from_value::<TwitterUser>(raw.clone()).ok())
            .map(|u| (u.id.clone(), u))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    pub result_count: Option<u32>,
    pub next_token: Option<String>,
}

/// Partial-error entry the API returns alongside (or instead of) `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiProblem {
    pub title: Option<String>,
    pub detail: Option<String>,
    #[serde(rename = "type")]
    pub problem_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
}

/// Response of the username lookup endpoint. An unknown username comes back as
/// HTTP 200 with `errors` and no `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserLookup {
    pub data: Option<TwitterUser>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}
