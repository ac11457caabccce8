//! HTTP adapter behavior against a mock marketplace backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use campus_market::application::{
    GuardSettings, PageRequest, QueryComposer, RetryPolicy, SessionGuard,
};
use campus_market::domain::{
    AppError, AuthApi, AuthState, BlockStatus, Condition, CursorPolicy, FilterState, MarketApi,
    TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
use campus_market::infrastructure::{HttpApi, MemoryTokenStore};

fn listing_json(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "title": format!("Listing {id}"),
        "condition": "Fair",
        "description": "",
        "price": 10.0,
        "image": null,
        "likes": 1,
        "dislikes": 0,
        "tags": ["dorm"],
        "created_at": "2024-09-01T12:00:00Z",
        "author_id": 2
    })
}

/// Unsigned token whose payload is `{"exp": exp, "user_id": 3}`.
fn token_expiring_at(exp: i64) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"user_id":3}}"#));
    format!("{header}.{payload}.sig")
}

fn api_for(server: &MockServer, store: Arc<MemoryTokenStore>) -> Arc<HttpApi> {
    Arc::new(HttpApi::new(&server.uri(), Duration::from_secs(5), store).unwrap())
}

#[tokio::test]
async fn test_listings_envelope_and_filters() {
    let server = MockServer::start().await;
    let next = format!("{}/api/listings/?cursor=cD0y&min_price=10", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/listings/"))
        .and(query_param("min_price", "10"))
        .and(query_param("condition", "Fair"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [listing_json(1), listing_json(2)],
            "links": { "next": next, "previous": null }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::default()));
    let composer = QueryComposer::new(api, RetryPolicy::no_retry(), CursorPolicy::Authoritative);

    let page = composer
        .fetch(&PageRequest::Fresh {
            filters: FilterState::default()
                .with_min_price(10.0)
                .with_condition(Condition::Fair),
        })
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].tags.as_deref(), Some(&["dorm".to_string()][..]));
    assert_eq!(page.next.unwrap().as_str(), next);
    assert!(page.previous.is_none());
}

#[tokio::test]
async fn test_cursor_followed_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/listings/"))
        .and(query_param("cursor", "cD0y"))
        .and(query_param("search", "lamp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [listing_json(3)],
            "links": { "next": null, "previous": null }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::default()));
    let composer = QueryComposer::new(api, RetryPolicy::no_retry(), CursorPolicy::Authoritative);
    let cursor = format!("{}/api/listings/?cursor=cD0y&search=lamp", server.uri());

    let page = composer.fetch_page(&cursor).await.unwrap();
    assert_eq!(page.items[0].id, 3);
}

#[tokio::test]
async fn test_listings_with_sqlite_timestamps() {
    let server = MockServer::start().await;
    let mut stored = listing_json(4);
    stored["created_at"] = json!("2024-09-01 12:00:00");

    Mock::given(method("GET"))
        .and(path("/api/listings/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [stored, listing_json(5)],
            "links": { "next": null, "previous": null }
        })))
        .mount(&server)
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::default()));
    let page = api.fetch_listings("/api/listings/").await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].created_at, page.items[1].created_at);
    assert!(page.items[0].created_at.is_some());
}

#[tokio::test]
async fn test_foreign_cursor_host_gets_no_token() {
    let api_server = MockServer::start().await;
    let foreign = MockServer::start().await;
    let envelope = json!({ "results": [], "links": { "next": null, "previous": null } });

    for server in [&api_server, &foreign] {
        Mock::given(method("GET"))
            .and(path("/api/listings/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope.clone()))
            .mount(server)
            .await;
    }

    let store = Arc::new(MemoryTokenStore::default());
    store.set(ACCESS_TOKEN_KEY, "session-access").unwrap();
    let api = api_for(&api_server, store);

    api.fetch_listings(&format!("{}/api/listings/?cursor=x", foreign.uri()))
        .await
        .unwrap();
    api.fetch_listings(&format!("{}/api/listings/?cursor=y", api_server.uri()))
        .await
        .unwrap();

    let foreign_requests = foreign.received_requests().await.unwrap();
    assert_eq!(foreign_requests.len(), 1);
    assert!(foreign_requests[0].headers.get("authorization").is_none());

    let api_requests = api_server.received_requests().await.unwrap();
    assert_eq!(
        api_requests[0]
            .headers
            .get("authorization")
            .map(|v| v.to_str().unwrap()),
        Some("Bearer session-access")
    );
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/listings/5/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/listings/6/"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "error": "Listing with that id not found." })),
        )
        .mount(&server)
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::default()));

    let unavailable = api.fetch_listing(5).await.unwrap_err();
    assert!(matches!(unavailable, AppError::Server { status: 503, .. }));
    assert!(unavailable.is_retryable());

    let missing = api.fetch_listing(6).await.unwrap_err();
    match missing {
        AppError::Client { status, detail } => {
            assert_eq!(status, 404);
            assert_eq!(detail, "Listing with that id not found.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let api = HttpApi::new(
        &uri,
        Duration::from_secs(2),
        Arc::new(MemoryTokenStore::default()),
    )
    .unwrap();

    let err = api.fetch_listing(1).await.unwrap_err();
    assert!(matches!(err, AppError::TransientNetwork { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_bearer_token_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/messages/"))
        .and(header("authorization", "Bearer stored-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "message_id": 1, "sender_id": 2, "content": "Still available?" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    store.set(ACCESS_TOKEN_KEY, "stored-access").unwrap();
    let api = api_for(&server, store);

    let messages = api.list_messages().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, 2);
    assert_eq!(messages[0].content, "Still available?");
}

#[tokio::test]
async fn test_block_status_decoding() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users/4/is_user_blocked/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "detail": "User is blocked." })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/5/is_user_blocked/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "detail": "User is not blocked." })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/6/is_user_blocked/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "detail": "Maybe." })))
        .mount(&server)
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::default()));

    assert_eq!(api.block_status(4).await.unwrap(), BlockStatus::Blocked);
    assert_eq!(api.block_status(5).await.unwrap(), BlockStatus::NotBlocked);
    assert!(matches!(
        api.block_status(6).await,
        Err(AppError::InvalidResponse { .. })
    ));
}

#[tokio::test]
async fn test_favorite_conflict_and_unfavorite_delete() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/listings/9/favorite_listing/"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "error": "Listing already favorited." })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/listings/9/remove_favorite_listing/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::default()));

    let err = api.favorite_listing(9).await.unwrap_err();
    assert_eq!(err.status(), Some(409));
    api.remove_favorite_listing(9).await.unwrap();
}

#[tokio::test]
async fn test_refresh_posts_refresh_token() {
    let server = MockServer::start().await;
    let fresh = token_expiring_at(4_000_000_000);

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({ "refresh": "r-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": fresh,
            "refresh": "r-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::default()));
    let tokens = api.refresh_access("r-1").await.unwrap();

    assert_eq!(tokens.access, fresh);
    assert_eq!(tokens.refresh.as_deref(), Some("r-2"));
}

#[tokio::test]
async fn test_guard_refreshes_expired_session_over_http() {
    let server = MockServer::start().await;
    let fresh = token_expiring_at(4_000_000_000);

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({ "refresh": "r-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": fresh })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    store.set(ACCESS_TOKEN_KEY, &token_expiring_at(1_000)).unwrap();
    store.set(REFRESH_TOKEN_KEY, "r-1").unwrap();

    let api = api_for(&server, Arc::clone(&store));
    let guard = SessionGuard::new(store.clone(), api, GuardSettings::default());

    assert_eq!(guard.check_authorized().await, AuthState::Authorized);
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), Some(fresh));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r-1"));
}

#[tokio::test]
async fn test_login_rejected_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials"
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    let api = api_for(&server, Arc::clone(&store));
    let guard = SessionGuard::new(store.clone(), api, GuardSettings::default());

    let err = guard.login("sam", "wrong").await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));
    assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
}
