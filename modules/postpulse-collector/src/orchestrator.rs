// Orchestrator: the single entry point for collection.
//
// Holds one collector per provider and turns a query into a lazy PostStream.
// Pages are only requested as the consumer pulls, requesting stops as soon as
// the limit is met, and a failing page ends the stream after whatever was
// already emitted.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use postpulse_common::{normalize_handle, CollectError, Post, Provider, Result};

use crate::traits::{CollectQuery, PostCollector};

#[derive(Default)]
pub struct OrchestratorBuilder {
    collectors: HashMap<Provider, Arc<dyn PostCollector>>,
}

impl OrchestratorBuilder {
    /// Register a collector under its own provider. A later registration for
    /// the same provider replaces the earlier one.
    pub fn with(mut self, collector: Arc<dyn PostCollector>) -> Self {
        self.collectors.insert(collector.provider(), collector);
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            collectors: self.collectors,
        }
    }
}

pub struct Orchestrator {
    collectors: HashMap<Provider, Arc<dyn PostCollector>>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.collectors.contains_key(&provider)
    }

    /// Configured providers in name order.
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.collectors.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }

    /// Keyword search, at most `limit` posts.
    pub fn search(&self, provider: Provider, query: &str, limit: usize) -> Result<PostStream> {
        self.collect(provider, CollectQuery::Search(query.trim().to_string()), limit, None)
    }

    /// Recent posts of one account, at most `limit`. `handle` may be `@name`
    /// or a profile URL.
    pub fn user_posts(&self, provider: Provider, handle: &str, limit: usize) -> Result<PostStream> {
        self.collect(provider, CollectQuery::User(normalize_handle(handle)), limit, None)
    }

    /// Start a collection. Fails immediately only when `provider` has no
    /// collector; everything else surfaces through the stream.
    ///
    /// After `cancel` fires no further page is requested, but posts already
    /// parsed from the current page are still emitted.
    pub fn collect(
        &self,
        provider: Provider,
        query: CollectQuery,
        limit: usize,
        cancel: Option<CancellationToken>,
    ) -> Result<PostStream> {
        let collector = self.collectors.get(&provider).cloned().ok_or_else(|| {
            CollectError::Configuration(format!("{provider} collection is not configured"))
        })?;

        let stats = Arc::new(CollectStats::default());
        let cancel = cancel.unwrap_or_default();
        let inner = collect_stream(collector, query, limit, cancel, stats.clone());

        Ok(PostStream {
            inner: Box::pin(inner),
            stats,
        })
    }
}

/// Live counters of one collection. Readable while the stream runs and after
/// it ends, including after an abort.
#[derive(Debug, Default)]
pub struct CollectStats {
    emitted: AtomicUsize,
    skipped: AtomicUsize,
    pages: AtomicUsize,
}

impl CollectStats {
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Items dropped by the per-item parser.
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Pages fetched successfully.
    pub fn pages(&self) -> usize {
        self.pages.load(Ordering::Relaxed)
    }
}

/// A finite, lazy stream of posts in provider order.
pub struct PostStream {
    inner: Pin<Box<dyn Stream<Item = Result<Post>> + Send>>,
    stats: Arc<CollectStats>,
}

impl PostStream {
    pub fn stats(&self) -> Arc<CollectStats> {
        self.stats.clone()
    }

    /// Drain the stream. The posts gathered before a failure are kept next to
    /// the error.
    pub async fn collect_all(mut self) -> Collected {
        let mut posts = Vec::new();
        let mut error = None;
        while let Some(item) = self.next().await {
            match item {
                Ok(post) => posts.push(post),
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }
        Collected {
            posts,
            skipped: self.stats.skipped(),
            error,
        }
    }
}

impl Stream for PostStream {
    type Item = Result<Post>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Outcome of [`PostStream::collect_all`].
#[derive(Debug)]
pub struct Collected {
    pub posts: Vec<Post>,
    pub skipped: usize,
    pub error: Option<CollectError>,
}

fn collect_stream(
    collector: Arc<dyn PostCollector>,
    query: CollectQuery,
    limit: usize,
    cancel: CancellationToken,
    stats: Arc<CollectStats>,
) -> impl Stream<Item = Result<Post>> + Send {
    async_stream::stream! {
        if limit == 0 {
            return;
        }

        let provider = collector.provider();
        let (min_page, max_page) = collector.page_bounds(query.kind());
        info!(%provider, query = query.text(), limit, "Starting collection");

        let mut failure = None;
        let mut cancelled = false;

        match collector.resolve(&query).await {
            Err(e) => failure = Some(e),
            Ok(target) => {
                let mut cursor: Option<String> = None;
                let mut emitted = 0usize;

                loop {
                    if cancel.is_cancelled() {
                        cancelled = true;
                        break;
                    }

                    let remaining = u32::try_from(limit - emitted).unwrap_or(u32::MAX);
                    let page_size = remaining.clamp(min_page, max_page);

                    let fetched = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        page = collector.fetch_page(&target, cursor.as_deref(), page_size) => Some(page),
                    };

                    let page = match fetched {
                        None => {
                            cancelled = true;
                            break;
                        }
                        Some(Err(e)) => {
                            failure = Some(e);
                            break;
                        }
                        Some(Ok(page)) => page,
                    };

                    stats.pages.fetch_add(1, Ordering::Relaxed);
                    stats.skipped.fetch_add(page.skipped, Ordering::Relaxed);
                    let progressed = !page.posts.is_empty() || page.skipped > 0;

                    for post in page.posts {
                        if emitted >= limit {
                            break;
                        }
                        emitted += 1;
                        stats.emitted.fetch_add(1, Ordering::Relaxed);
                        yield Ok(post);
                    }

                    if emitted >= limit {
                        break;
                    }
                    match page.next_cursor {
                        Some(next) if progressed => cursor = Some(next),
                        _ => break,
                    }
                }
            }
        }

        match failure {
            Some(e) => {
                warn!(
                    %provider,
                    emitted = stats.emitted(),
                    skipped = stats.skipped(),
                    error = %e,
                    "Collection aborted"
                );
                yield Err(e);
            }
            None => info!(
                %provider,
                emitted = stats.emitted(),
                skipped = stats.skipped(),
                pages = stats.pages(),
                cancelled,
                "Collection finished"
            ),
        }
    }
}
