use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use postpulse_collector::testing::{sample_posts, MockCollector};
use postpulse_collector::{CollectQuery, Orchestrator};
use postpulse_common::{CollectError, Provider};

fn orchestrator(mock: &Arc<MockCollector>) -> Orchestrator {
    Orchestrator::builder().with(mock.clone()).build()
}

fn ids(posts: &[postpulse_common::Post]) -> Vec<String> {
    posts.iter().map(|p| p.id().to_string()).collect()
}

#[tokio::test]
async fn emits_exactly_limit_when_provider_has_more() {
    let mock = Arc::new(
        MockCollector::new(Provider::Twitter)
            .with_page(sample_posts(Provider::Twitter, "a", 10))
            .with_page(sample_posts(Provider::Twitter, "b", 10))
            .with_page(sample_posts(Provider::Twitter, "c", 10)),
    );

    let collected = orchestrator(&mock)
        .search(Provider::Twitter, "rust", 15)
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(collected.posts.len(), 15);
    assert!(collected.error.is_none());
    // The third page is never requested.
    assert_eq!(mock.requests().len(), 2);
}

#[tokio::test]
async fn emits_everything_when_provider_runs_out_first() {
    let mock = Arc::new(
        MockCollector::new(Provider::Bluesky)
            .with_page(sample_posts(Provider::Bluesky, "a", 3))
            .with_page(sample_posts(Provider::Bluesky, "b", 2)),
    );

    let collected = orchestrator(&mock)
        .search(Provider::Bluesky, "rust", 100)
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(collected.posts.len(), 5);
    assert_eq!(mock.requests().len(), 2);
}

#[tokio::test]
async fn preserves_provider_order() {
    let mock = Arc::new(
        MockCollector::new(Provider::Bluesky)
            .with_page(sample_posts(Provider::Bluesky, "a", 2))
            .with_page(sample_posts(Provider::Bluesky, "b", 2)),
    );

    let collected = orchestrator(&mock)
        .search(Provider::Bluesky, "rust", 10)
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(ids(&collected.posts), vec!["a0", "a1", "b0", "b1"]);
}

#[tokio::test]
async fn malformed_item_is_skipped_and_counted() {
    let mock = Arc::new(
        MockCollector::new(Provider::Bluesky).with_skipped(sample_posts(Provider::Bluesky, "a", 4), 1),
    );

    let collected = orchestrator(&mock)
        .user_posts(Provider::Bluesky, "alice.bsky.social", 25)
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(collected.posts.len(), 4);
    assert_eq!(collected.skipped, 1);
    assert!(collected.error.is_none());
}

#[tokio::test]
async fn mid_stream_failure_keeps_emitted_posts() {
    let mock = Arc::new(
        MockCollector::new(Provider::Twitter)
            .with_page(sample_posts(Provider::Twitter, "a", 5))
            .with_page(sample_posts(Provider::Twitter, "b", 5))
            .failing_at(1, 503),
    );

    let stream = orchestrator(&mock).search(Provider::Twitter, "rust", 50).unwrap();
    let stats = stream.stats();
    let collected = stream.collect_all().await;

    assert_eq!(ids(&collected.posts), vec!["a0", "a1", "a2", "a3", "a4"]);
    assert!(matches!(
        collected.error,
        Some(CollectError::Provider { status: Some(503), .. })
    ));
    assert_eq!(stats.emitted(), 5);
    assert_eq!(stats.pages(), 1);
}

#[tokio::test]
async fn error_is_yielded_once_then_stream_ends() {
    let mock = Arc::new(
        MockCollector::new(Provider::Twitter)
            .with_page(sample_posts(Provider::Twitter, "a", 1))
            .failing_at(0, 500),
    );

    let mut stream = orchestrator(&mock).search(Provider::Twitter, "rust", 10).unwrap();
    assert!(matches!(stream.next().await, Some(Err(_))));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn calling_again_collects_afresh() {
    let mock = Arc::new(
        MockCollector::new(Provider::Bluesky).with_page(sample_posts(Provider::Bluesky, "a", 3)),
    );
    let orchestrator = orchestrator(&mock);

    let first = orchestrator
        .search(Provider::Bluesky, "rust", 10)
        .unwrap()
        .collect_all()
        .await;
    let second = orchestrator
        .search(Provider::Bluesky, "rust", 10)
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(ids(&first.posts), ids(&second.posts));
    assert_eq!(mock.requests().len(), 2);
    assert_eq!(mock.resolve_count(), 2);
}

#[tokio::test]
async fn zero_limit_makes_no_request() {
    let mock = Arc::new(
        MockCollector::new(Provider::Twitter).with_page(sample_posts(Provider::Twitter, "a", 3)),
    );

    let collected = orchestrator(&mock)
        .search(Provider::Twitter, "rust", 0)
        .unwrap()
        .collect_all()
        .await;

    assert!(collected.posts.is_empty());
    assert!(mock.requests().is_empty());
    assert_eq!(mock.resolve_count(), 0);
}

#[tokio::test]
async fn stream_is_lazy() {
    let mock = Arc::new(
        MockCollector::new(Provider::Twitter).with_page(sample_posts(Provider::Twitter, "a", 3)),
    );

    let _stream = orchestrator(&mock).search(Provider::Twitter, "rust", 10).unwrap();
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn unknown_user_ends_with_not_found_and_no_posts() {
    let mock = Arc::new(
        MockCollector::new(Provider::Twitter)
            .with_page(sample_posts(Provider::Twitter, "a", 3))
            .with_unknown_user(),
    );

    let collected = orchestrator(&mock)
        .user_posts(Provider::Twitter, "@nobody", 10)
        .unwrap()
        .collect_all()
        .await;

    assert!(collected.posts.is_empty());
    assert!(matches!(collected.error, Some(CollectError::NotFound(ref h)) if h == "nobody"));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn page_size_is_clamped_into_provider_bounds() {
    let mock = Arc::new(
        MockCollector::new(Provider::Twitter)
            .with_bounds(10, 100)
            .with_page(sample_posts(Provider::Twitter, "a", 10))
            .with_page(sample_posts(Provider::Twitter, "b", 10)),
    );

    let collected = orchestrator(&mock)
        .search(Provider::Twitter, "rust", 3)
        .unwrap()
        .collect_all()
        .await;

    // Provider minimum applies to the request, the limit to the output.
    assert_eq!(collected.posts.len(), 3);
    assert_eq!(mock.requests(), vec![(None, 10)]);
}

#[tokio::test]
async fn page_size_shrinks_with_remaining_limit() {
    let mock = Arc::new(
        MockCollector::new(Provider::Bluesky)
            .with_bounds(1, 100)
            .with_page(sample_posts(Provider::Bluesky, "a", 100))
            .with_page(sample_posts(Provider::Bluesky, "b", 100)),
    );

    let collected = orchestrator(&mock)
        .search(Provider::Bluesky, "rust", 130)
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(collected.posts.len(), 130);
    assert_eq!(
        mock.requests(),
        vec![(None, 100), (Some("p1".to_string()), 30)]
    );
}

#[tokio::test]
async fn empty_page_with_cursor_stops_pagination() {
    let mock = Arc::new(
        MockCollector::new(Provider::Bluesky)
            .with_page(vec![])
            .with_page(sample_posts(Provider::Bluesky, "b", 2)),
    );

    let collected = orchestrator(&mock)
        .search(Provider::Bluesky, "rust", 10)
        .unwrap()
        .collect_all()
        .await;

    assert!(collected.posts.is_empty());
    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test]
async fn cancellation_drains_current_page_then_stops() {
    let mock = Arc::new(
        MockCollector::new(Provider::Bluesky)
            .with_page(sample_posts(Provider::Bluesky, "a", 3))
            .with_page(sample_posts(Provider::Bluesky, "b", 3)),
    );
    let cancel = CancellationToken::new();

    let mut stream = orchestrator(&mock)
        .collect(
            Provider::Bluesky,
            CollectQuery::Search("rust".into()),
            10,
            Some(cancel.clone()),
        )
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.id(), "a0");
    cancel.cancel();

    let mut rest = Vec::new();
    while let Some(item) = stream.next().await {
        rest.push(item.unwrap().id().to_string());
    }

    assert_eq!(rest, vec!["a1", "a2"]);
    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test]
async fn cancelled_before_start_requests_nothing() {
    let mock = Arc::new(
        MockCollector::new(Provider::Bluesky).with_page(sample_posts(Provider::Bluesky, "a", 3)),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let collected = orchestrator(&mock)
        .collect(Provider::Bluesky, CollectQuery::Search("rust".into()), 10, Some(cancel))
        .unwrap()
        .collect_all()
        .await;

    assert!(collected.posts.is_empty());
    assert!(collected.error.is_none());
    assert!(mock.requests().is_empty());
}
