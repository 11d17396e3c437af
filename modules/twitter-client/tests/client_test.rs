use std::time::Duration;

use serde_json::json;
use twitter_client::{Credentials, TwitterClient, TwitterError};
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> Credentials {
    Credentials {
        api_key: "key".into(),
        api_secret: "secret".into(),
        access_token: "token".into(),
        access_token_secret: "token-secret".into(),
    }
}

async fn client(server: &MockServer) -> TwitterClient {
    TwitterClient::new(credentials(), Duration::from_secs(5))
        .unwrap()
        .with_base_url(&server.uri())
}

#[test]
fn blank_credential_fails_at_construction() {
    let mut creds = credentials();
    creds.api_secret = String::new();
    let err = TwitterClient::new(creds, Duration::from_secs(5)).err().unwrap();
    assert!(matches!(err, TwitterError::MissingCredential("api_secret")));
}

#[tokio::test]
async fn search_sends_signed_request_with_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .and(header_exists("authorization"))
        .and(query_param("query", "rust lang"))
        .and(query_param("max_results", "10"))
        .and(query_param("expansions", "author_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "1", "text": "hello", "author_id": "9"}],
            "includes": {"users": [{"id": "9", "username": "jack", "name": "Jack"}]},
            "meta": {"result_count": 1, "next_token": "abc"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server).await.search_recent("rust lang", 10, None).await.unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.meta.next_token.as_deref(), Some("abc"));
    assert_eq!(page.includes.users_by_id()["9"].username, "jack");
}

#[tokio::test]
async fn empty_search_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {"result_count": 0}})))
        .mount(&server)
        .await;

    let page = client(&server).await.search_recent("test", 10, None).await.unwrap();
    assert!(page.data.is_empty());
}

#[tokio::test]
async fn unknown_username_resolves_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/nobody"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"title": "Not Found Error", "detail": "Could not find user with username: [nobody]."}]
        })))
        .mount(&server)
        .await;

    let user = client(&server).await.user_by_username("nobody").await.unwrap();
    assert!(user.is_none());
}

#[tokio::test]
async fn timeline_passes_pagination_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .and(query_param("pagination_token", "next-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "7", "text": "second page"}],
            "meta": {"result_count": 1}
        })))
        .mount(&server)
        .await;

    let page = client(&server)
        .await
        .user_tweets("42", 5, Some("next-1"))
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert!(page.meta.next_token.is_none());
}

#[tokio::test]
async fn http_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let err = client(&server).await.search_recent("x", 10, None).await.unwrap_err();
    match err {
        TwitterError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
