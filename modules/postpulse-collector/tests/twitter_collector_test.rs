use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{header_exists, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use postpulse_collector::{Orchestrator, TwitterCollector};
use postpulse_common::{CollectError, Config, Provider, TwitterCredentials};

fn credentials() -> TwitterCredentials {
    TwitterCredentials {
        api_key: "key".into(),
        api_secret: "secret".into(),
        access_token: "token".into(),
        access_token_secret: "token-secret".into(),
    }
}

fn config(server: &MockServer) -> Config {
    Config {
        twitter_api_base: Some(server.uri()),
        rate_limit: 1000.0,
        ..Config::default()
    }
}

fn orchestrator(server: &MockServer) -> Orchestrator {
    let collector = TwitterCollector::new(Some(&credentials()), &config(server)).unwrap();
    Orchestrator::builder().with(Arc::new(collector)).build()
}

fn tweets(prefix: &str, n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "id": format!("{prefix}{i}"),
                "text": format!("tweet {i} #rust"),
                "author_id": "42",
                "created_at": "2024-03-01T12:00:00.000Z",
                "public_metrics": {"like_count": i, "retweet_count": 0, "reply_count": 0, "quote_count": 0}
            })
        })
        .collect()
}

fn page(data: Vec<Value>, next_token: Option<&str>) -> Value {
    let count = data.len();
    json!({
        "data": data,
        "includes": {"users": [{"id": "42", "username": "jack", "name": "Jack"}]},
        "meta": {"result_count": count, "next_token": next_token}
    })
}

#[tokio::test]
async fn search_without_results_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .and(query_param("query", "test"))
        .and(query_param("max_results", "10"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {"result_count": 0}})))
        .expect(1)
        .mount(&server)
        .await;

    let collected = orchestrator(&server)
        .search(Provider::Twitter, "test", 10)
        .unwrap()
        .collect_all()
        .await;

    assert!(collected.posts.is_empty());
    assert!(collected.error.is_none());
}

#[tokio::test]
async fn search_normalizes_tweets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(tweets("1", 2), None)))
        .mount(&server)
        .await;

    let collected = orchestrator(&server)
        .search(Provider::Twitter, "rust", 10)
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(collected.posts.len(), 2);
    let post = &collected.posts[1];
    assert_eq!(post.id(), "11");
    assert_eq!(post.author_handle(), "jack");
    assert_eq!(post.author_display_name(), "Jack");
    assert_eq!(post.like_count(), 1);
    assert_eq!(post.url(), "https://twitter.com/jack/status/11");
    assert_eq!(post.hashtags(), ["rust"]);
}

#[tokio::test]
async fn malformed_tweet_is_skipped() {
    let server = MockServer::start().await;
    let mut data = tweets("1", 3);
    data[1] = json!({"text": "no id here", "author_id": "42"});
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(data, None)))
        .mount(&server)
        .await;

    let collected = orchestrator(&server)
        .search(Provider::Twitter, "rust", 10)
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(collected.posts.len(), 2);
    assert_eq!(collected.skipped, 1);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/nobody"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"title": "Not Found Error", "detail": "Could not find user with username: [nobody]."}]
        })))
        .mount(&server)
        .await;

    let collected = orchestrator(&server)
        .user_posts(Provider::Twitter, "@nobody", 10)
        .unwrap()
        .collect_all()
        .await;

    assert!(collected.posts.is_empty());
    assert!(matches!(collected.error, Some(CollectError::NotFound(_))));
}

#[tokio::test]
async fn user_timeline_follows_pagination_token_until_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/jack"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "42", "username": "jack", "name": "Jack"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .and(query_param("max_results", "7"))
        .and(query_param_is_missing("pagination_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(tweets("a", 5), Some("t2"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .and(query_param("pagination_token", "t2"))
        .and(query_param("max_results", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(tweets("b", 5), Some("t3"))))
        .expect(1)
        .mount(&server)
        .await;

    let collected = orchestrator(&server)
        .user_posts(Provider::Twitter, "https://x.com/jack", 7)
        .unwrap()
        .collect_all()
        .await;

    let ids: Vec<&str> = collected.posts.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec!["a0", "a1", "a2", "a3", "a4", "b0", "b1"]);
    assert!(collected.error.is_none());
}

#[tokio::test]
async fn rejected_credentials_are_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "title": "Unauthorized", "status": 401, "detail": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let collected = orchestrator(&server)
        .search(Provider::Twitter, "rust", 10)
        .unwrap()
        .collect_all()
        .await;

    assert!(collected.posts.is_empty());
    let err = collected.error.unwrap();
    assert!(matches!(err, CollectError::Authentication(_)));
    assert_eq!(err.kind().http_status(), 503);
}

#[tokio::test]
async fn rejected_credentials_disable_the_collector() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/jack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let first = orchestrator
        .search(Provider::Twitter, "rust", 10)
        .unwrap()
        .collect_all()
        .await;
    assert!(matches!(first.error, Some(CollectError::Authentication(_))));

    let again = orchestrator
        .search(Provider::Twitter, "rust", 10)
        .unwrap()
        .collect_all()
        .await;
    assert!(matches!(again.error, Some(CollectError::Authentication(_))));

    let timeline = orchestrator
        .user_posts(Provider::Twitter, "jack", 10)
        .unwrap()
        .collect_all()
        .await;
    assert!(matches!(timeline.error, Some(CollectError::Authentication(_))));
}

#[tokio::test]
async fn server_errors_leave_the_collector_usable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(2)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    for _ in 0..2 {
        let collected = orchestrator
            .search(Provider::Twitter, "rust", 10)
            .unwrap()
            .collect_all()
            .await;
        assert!(matches!(
            collected.error,
            Some(CollectError::Provider { status: Some(503), .. })
        ));
    }
}

#[tokio::test]
async fn rate_limited_response_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;

    let collected = orchestrator(&server)
        .search(Provider::Twitter, "rust", 10)
        .unwrap()
        .collect_all()
        .await;

    match collected.error {
        Some(CollectError::Provider { status, detail }) => {
            assert_eq!(status, Some(429));
            assert_eq!(detail, "Too Many Requests");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn missing_credentials_fail_at_construction() {
    let config = Config::default();
    let err = TwitterCollector::new(None, &config).err().unwrap();
    assert!(matches!(err, CollectError::Configuration(_)));

    let mut blank = credentials();
    blank.access_token = "  ".into();
    let err = TwitterCollector::new(Some(&blank), &config).err().unwrap();
    assert!(matches!(err, CollectError::Configuration(_)));
}
