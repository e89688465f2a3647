use std::time::Duration;

use serde_json::json;
use tesla_owner_api::tesla::{Credentials, Error, RetryPolicy, TeslaApi};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> Credentials {
    Credentials {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        email: "driver@example.com".to_string(),
        password: "correct horse".to_string(),
    }
}

fn instant_retries() -> RetryPolicy {
    RetryPolicy {
        backoff_factor: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

fn api(server: &MockServer) -> TeslaApi {
    TeslaApi::builder(credentials())
        .base_url(server.uri())
        .retry_policy(instant_retries())
        .build()
        .unwrap()
}

fn listing_entry(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "vehicle_id": id + 1000,
        "vin": format!("5YJSA1111111{:05}", id),
        "display_name": format!("car {}", id),
        "option_codes": "MDLS,RENA",
        "color": null,
        "tokens": [],
        "state": "online",
        "in_service": false,
        "id_s": id.to_string(),
        "calendar_enabled": true,
        "api_version": 7
    })
}

#[tokio::test]
async fn password_grant_token_is_sent_on_later_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(query_param("grant_type", "password"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("client_id=client-id"))
        .and(body_string_contains("client_secret=client-secret"))
        .and(body_string_contains("email=driver%40example.com"))
        .and(body_string_contains("password=correct+horse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "token_type": "bearer",
            "expires_in": 3888000,
            "refresh_token": "refresh",
            "created_at": 1600000000
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/1/vehicles"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let mut api = api(&server);
    api.initialize(None).await.unwrap();

    assert_eq!(api.access_token(), Some("fresh-token"));
    assert_eq!(api.token().and_then(|t| t.expires_in), Some(3888000));
    assert!(api.list_vehicles().await.unwrap().is_empty());
}

#[tokio::test]
async fn supplied_token_skips_token_request() {
    let server = MockServer::start().await;

    Mock::given(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/1/vehicles"))
        .and(header("authorization", "Bearer XXXXXXXXXXX"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": [listing_entry(1)] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut api = api(&server);
    api.initialize(Some("XXXXXXXXXXX")).await.unwrap();
    assert_eq!(api.access_token(), Some("XXXXXXXXXXX"));

    let vehicles = api.list_vehicles().await.unwrap();
    assert_eq!(vehicles.len(), 1);
}

#[tokio::test]
async fn rejected_credentials_are_an_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_grant" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut api = api(&server);
    let err = api.initialize(None).await.unwrap_err();

    assert!(matches!(err, Error::Authentication(_)));
    assert_eq!(err.status().map(|s| s.as_u16()), Some(401));
    assert!(!api.is_authenticated());

    let msg = err.to_string();
    assert!(!msg.contains("correct horse"));
    assert!(!msg.contains("correct+horse"));
    assert!(!msg.contains("client-secret"));
}

#[tokio::test]
async fn token_request_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(504))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "second-try" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut api = api(&server);
    api.initialize(None).await.unwrap();
    assert_eq!(api.access_token(), Some("second-try"));
}

#[tokio::test]
async fn token_response_without_token_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "nope" })))
        .mount(&server)
        .await;

    let mut api = api(&server);
    let err = api.initialize(None).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
}

#[tokio::test]
async fn listing_yields_one_handle_per_vehicle() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": [listing_entry(11), listing_entry(22), listing_entry(33)]
        })))
        .mount(&server)
        .await;

    let mut api = api(&server);
    api.initialize(Some("token")).await.unwrap();

    let vehicles = api.list_vehicles().await.unwrap();
    let ids = vehicles.iter().map(|v| v.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![11, 22, 33]);

    for vehicle in &vehicles {
        assert_eq!(
            vehicle.prefix(),
            format!("{}/api/1/vehicles/{}", server.uri(), vehicle.id)
        );
        let summary = vehicle.summary().unwrap();
        assert_eq!(summary.vehicle_id, vehicle.id + 1000);
        assert_eq!(summary.option_codes(), vec!["MDLS", "RENA"]);
    }

    // the session prefix is untouched by handle construction
    assert_eq!(api.base_url(), server.uri());
    assert_eq!(
        api.vehicle(44).prefix(),
        format!("{}/api/1/vehicles/44", server.uri())
    );
}

#[tokio::test]
async fn malformed_listing_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "vehicles": [] })))
        .mount(&server)
        .await;

    let mut api = api(&server);
    api.initialize(Some("token")).await.unwrap();

    match api.list_vehicles().await {
        Err(Error::Protocol { path, .. }) => assert_eq!(path, "/api/1/vehicles"),
        other => panic!("unexpected {:?}", other.map(|v| v.len())),
    }
}

#[tokio::test]
async fn verbs_prefix_the_base_url() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/1/users/me"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut api = api(&server);
    api.initialize(Some("token")).await.unwrap();

    let rsp = api
        .patch("/api/1/users/me", Some(&json!({ "locale": "en_US" })))
        .await
        .unwrap();
    assert_eq!(rsp.status().as_u16(), 204);
}

#[tokio::test]
async fn empty_supplied_token_falls_back_to_password_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "real" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut api = api(&server);
    api.initialize(Some("")).await.unwrap();
    assert_eq!(api.access_token(), Some("real"));
}

#[tokio::test]
async fn minimal_listing_entries_still_yield_handles() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": [{ "id": 5 }, listing_entry(6)]
        })))
        .mount(&server)
        .await;

    let mut api = api(&server);
    api.initialize(Some("token")).await.unwrap();

    let ids = api
        .list_vehicles()
        .await
        .unwrap()
        .iter()
        .map(|v| v.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![5, 6]);
}

/// Base URL of a port nothing is listening on.
fn closed_port() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn unreachable_api(retry: RetryPolicy) -> TeslaApi {
    let mut api = TeslaApi::builder(credentials())
        .base_url(closed_port())
        .retry_policy(retry)
        .build()
        .unwrap();
    api.initialize(Some("token")).await.unwrap();
    api
}

fn assert_connect_failure(err: &Error) {
    match err {
        Error::Command { path, source } => {
            assert_eq!(path, "/api/1/vehicles/7/command/honk_horn");
            assert!(source.is_connect(), "unexpected {:?}", source);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(err.status(), None);
}

#[tokio::test(start_paused = true)]
async fn connection_failures_are_retried_within_budget() {
    // 1s then 2s of backoff; a third retry would add another 4s
    let api = unreachable_api(RetryPolicy {
        max_retries: 2,
        ..RetryPolicy::default()
    })
    .await;

    let start = tokio::time::Instant::now();
    let err = api.vehicle(7).honk_horn().await.unwrap_err();
    let elapsed = start.elapsed();

    assert_connect_failure(&err);
    assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn no_retry_policy_returns_first_connection_failure() {
    let api = unreachable_api(RetryPolicy::none()).await;

    let start = tokio::time::Instant::now();
    let err = api.vehicle(7).honk_horn().await.unwrap_err();

    assert_connect_failure(&err);
    assert!(start.elapsed() < Duration::from_secs(1));
}
