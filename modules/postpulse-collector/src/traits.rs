// PostCollector: the one seam between the orchestrator and a provider.
//
// The orchestrator only ever sees this trait. Each provider service resolves a
// query into a FeedTarget (authenticating or looking up the user as needed) and
// then serves pages of already-normalized posts.

use async_trait::async_trait;

use postpulse_common::{Post, Provider, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Search,
    User,
}

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectQuery {
    /// Keyword search across the provider.
    Search(String),
    /// One account's timeline, by handle/username.
    User(String),
}

impl CollectQuery {
    pub fn kind(&self) -> QueryKind {
        match self {
            CollectQuery::Search(_) => QueryKind::Search,
            CollectQuery::User(_) => QueryKind::User,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            CollectQuery::Search(q) | CollectQuery::User(q) => q,
        }
    }
}

/// A query after provider-side resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTarget {
    pub query: CollectQuery,
    /// Provider key for page requests: the search string, a resolved user id,
    /// or a handle.
    pub key: String,
    /// Account handle when known, used as the author of timeline items that
    /// arrive without author metadata.
    pub handle: Option<String>,
}

impl FeedTarget {
    pub fn search(query: &str) -> Self {
        Self {
            query: CollectQuery::Search(query.to_string()),
            key: query.to_string(),
            handle: None,
        }
    }
}

/// One fetched page, already parsed item by item.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub posts: Vec<Post>,
    /// Items dropped because they could not be parsed.
    pub skipped: usize,
    /// Cursor for the next page; `None` once the provider is exhausted.
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait PostCollector: Send + Sync {
    fn provider(&self) -> Provider;

    /// Inclusive page-size range the provider accepts for this kind of query.
    fn page_bounds(&self, kind: QueryKind) -> (u32, u32);

    /// Turn a query into a fetchable target. Errors here (unknown user, no
    /// session) abort the call before any post is produced.
    async fn resolve(&self, query: &CollectQuery) -> Result<FeedTarget>;

    /// Fetch and parse one page. `page_size` is within [`Self::page_bounds`].
    async fn fetch_page(
        &self,
        target: &FeedTarget,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page>;
}
