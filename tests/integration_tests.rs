//! End-to-end tests wiring the pipeline, pager, and identity cache
//! together the way a typed accessor would.

use apikit::cache::{Entity, EntityCtor, IdentityCache, Shared, StoragePolicy};
use apikit::http::{HttpClient, RequestOptions};
use apikit::page::{Page, PageOptions};
use apikit::types::{EntityKey, JsonValue};
use apikit::Result;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// A minimal "users" accessor entity
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum User {
    Partial {
        id: i64,
        name: String,
    },
    Full {
        id: i64,
        name: String,
        description: String,
    },
}

impl User {
    fn name(&self) -> &str {
        match self {
            User::Partial { name, .. } | User::Full { name, .. } => name,
        }
    }
}

impl Entity for User {
    fn type_tag(&self) -> &'static str {
        match self {
            User::Partial { .. } => "UserPartial",
            User::Full { .. } => "User",
        }
    }

    fn patch(&mut self, seed: &JsonValue) {
        if let Some(name) = seed.get("name").and_then(JsonValue::as_str) {
            match self {
                User::Partial { name: n, .. } | User::Full { name: n, .. } => {
                    *n = name.to_string();
                }
            }
        }
        if let User::Full { description, .. } = self {
            if let Some(text) = seed.get("description").and_then(JsonValue::as_str) {
                *description = text.to_string();
            }
        }
    }
}

fn build_partial_user(seed: &JsonValue) -> User {
    User::Partial {
        id: seed.get("id").and_then(JsonValue::as_i64).unwrap_or_default(),
        name: seed
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

fn build_full_user(seed: &JsonValue) -> User {
    User::Full {
        id: seed.get("id").and_then(JsonValue::as_i64).unwrap_or_default(),
        name: seed
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string(),
        description: seed
            .get("description")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

const USER_PARTIAL: EntityCtor<User> = EntityCtor::new("UserPartial", build_partial_user);
const USER_FULL: EntityCtor<User> = EntityCtor::new("User", build_full_user);

fn user_cache() -> IdentityCache<User> {
    init_tracing();
    IdentityCache::new(vec!["UserPartial", "User"])
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn user_page(ids: &[i64], next: Option<&str>) -> JsonValue {
    json!({
        "previousPageCursor": null,
        "nextPageCursor": next,
        "data": ids
            .iter()
            .map(|id| json!({"id": id, "name": format!("user-{id}")}))
            .collect::<Vec<_>>(),
    })
}

/// Map a raw page item into a cache-backed shared entity, enforcing the
/// non-null id contract at the JSON boundary.
fn cache_mapper(
    cache: &IdentityCache<User>,
) -> impl Fn(&JsonValue) -> Result<Shared<User>> + Send + Sync + 'static {
    let cache = cache.clone();
    move |item: &JsonValue| {
        let key = EntityKey::from_json(item.get("id").unwrap_or(&JsonValue::Null))?;
        Ok(cache.get(key, item, &USER_PARTIAL, None))
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_paged_listing_feeds_the_identity_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_page(&[1, 2], Some("c2"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_page(&[3], None)))
        .mount(&server)
        .await;

    let client = HttpClient::new();
    let cache = user_cache();

    let page = Page::first(
        &format!("{}/v1/users", server.uri()),
        &client,
        PageOptions::default(),
        cache_mapper(&cache),
    )
    .await
    .unwrap();
    let users = page.fetch_all_page_data().await.unwrap();

    assert_eq!(users.len(), 3);
    assert_eq!(cache.len(), 3);
    // The page item and the cache hand out the same instance.
    let from_cache = cache.rawget(&EntityKey::from(1i64)).unwrap();
    assert!(std::sync::Arc::ptr_eq(&users[0], &from_cache));
}

#[tokio::test]
async fn test_detail_fetch_upgrades_listing_entities() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_page(&[7], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/users/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "name": "user-7",
            "description": "Long-form profile text",
        })))
        .mount(&server)
        .await;

    let client = HttpClient::new();
    let cache = user_cache();

    let page = Page::first(
        &format!("{}/v1/users", server.uri()),
        &client,
        PageOptions::default(),
        cache_mapper(&cache),
    )
    .await
    .unwrap();
    let listed = &page.contents.as_ref().unwrap()[0];
    assert_eq!(listed.read().unwrap().type_tag(), "UserPartial");

    // A detail accessor fetches the full representation and upgrades
    // the cached identity.
    let detail = client
        .get(&format!("{}/v1/users/7", server.uri()))
        .await
        .unwrap();
    let body = detail.json.unwrap();
    let key = EntityKey::from_json(&body["id"]).unwrap();
    cache.get(key.clone(), &body, &USER_FULL, None);

    let cached = cache.rawget(&key).unwrap();
    let cached = cached.read().unwrap();
    assert_eq!(cached.type_tag(), "User");
    assert_eq!(cached.name(), "user-7");

    // A later partial sighting merges instead of downgrading.
    drop(cached);
    cache.get(key.clone(), &json!({"name": "user-7-renamed"}), &USER_PARTIAL, None);
    let cached = cache.rawget(&key).unwrap();
    assert_eq!(cached.read().unwrap().type_tag(), "User");
    assert_eq!(cached.read().unwrap().name(), "user-7-renamed");
}

#[tokio::test]
async fn test_null_ids_surface_invalid_key_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "previousPageCursor": null,
            "nextPageCursor": null,
            "data": [{"id": null, "name": "ghost"}],
        })))
        .mount(&server)
        .await;

    let client = HttpClient::new();
    let cache = user_cache();
    let result = Page::first(
        &format!("{}/v1/users", server.uri()),
        &client,
        PageOptions::default(),
        cache_mapper(&cache),
    )
    .await;

    assert!(matches!(
        result.unwrap_err(),
        apikit::Error::InvalidKey { .. }
    ));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_pagination_rides_out_rate_limiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_page(&[1, 2], Some("c2"))))
        .mount(&server)
        .await;
    // Page 2 is rate limited once, then succeeds; the pager never sees
    // the 429.
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_page(&[3], None)))
        .mount(&server)
        .await;

    let client = HttpClient::new();
    let cache = user_cache();
    let options = PageOptions::new()
        .request(RequestOptions::new().ratelimit_after(Duration::from_millis(10)));

    let users = Page::first(
        &format!("{}/v1/users", server.uri()),
        &client,
        options,
        cache_mapper(&cache),
    )
    .await
    .unwrap()
    .fetch_all_page_data()
    .await
    .unwrap();

    assert_eq!(users.len(), 3);
}

#[tokio::test]
async fn test_token_refresh_spans_accessor_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/groups/9/join"))
        .respond_with(ResponseTemplate::new(403).insert_header("x-csrf-token", "minted"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/groups/9/join"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"joined": true})))
        .mount(&server)
        .await;

    let client = HttpClient::new();
    let response = client
        .post(&format!("{}/v1/groups/9/join", server.uri()), json!({}))
        .await
        .unwrap();

    assert!(response.ok);
    // The minted token is shared client-wide for every later accessor.
    assert_eq!(
        client.default_header("x-csrf-token").await,
        Some("minted".to_string())
    );
}

#[tokio::test]
async fn test_sweeper_reclaims_listing_entities_after_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_page(&[4], None)))
        .mount(&server)
        .await;

    let client = HttpClient::new();
    let cache = IdentityCache::with_policies(
        vec!["UserPartial", "User"],
        Some(StoragePolicy::SoftWeak(Duration::from_millis(20))),
        apikit::cache::PolicyTable::new(),
    );
    let sweeper = cache.start_sweeper_every(Duration::from_millis(10));

    let users = Page::first(
        &format!("{}/v1/users", server.uri()),
        &client,
        PageOptions::default(),
        cache_mapper(&cache),
    )
    .await
    .unwrap()
    .fetch_all_page_data()
    .await
    .unwrap();
    assert_eq!(cache.len(), 1);

    // Entries expire, get demoted, and vanish once the accessor drops
    // its handles.
    drop(users);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(cache.len(), 0);
    drop(sweeper);
}
