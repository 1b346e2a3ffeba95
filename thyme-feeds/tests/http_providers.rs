//! HTTP feed tests against a local mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;
use thyme_feeds::http::build_client;
use thyme_feeds::{
    CalendarConfig, CalendarProvider, ChatConfig, ChatProvider, DataProvider, FetchError,
    StaticToken, WeatherConfig, WeatherProvider,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FORECAST: &str = r#"{
    "daily": {
        "temperature_2m_max": [18.4],
        "temperature_2m_min": [9.6],
        "weathercode": [3]
    }
}"#;

fn weather(server: &MockServer) -> WeatherProvider {
    WeatherProvider::new(
        WeatherConfig {
            endpoint: format!("{}/v1/forecast", server.uri()),
            temperature_unit: "celsius".into(),
            ..Default::default()
        },
        build_client(Some(Duration::from_secs(5))).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn weather_fetch_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("temperature_unit", "celsius"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FORECAST))
        .expect(1)
        .mount(&server)
        .await;

    let report = weather(&server).fetch().await.unwrap();
    assert_eq!(report.display_text(), "18° / 10°");
    assert_eq!(report.icon(), "cloudy");
    assert_eq!(report.unit, "celsius");
}

#[tokio::test]
async fn weather_server_error_is_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = weather(&server).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn weather_malformed_body_is_parse() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"daily\": 7}"))
        .mount(&server)
        .await;

    let err = weather(&server).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)), "got {err:?}");
}

#[tokio::test]
async fn calendar_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .and(header("authorization", "Bearer cal-token"))
        .and(query_param("singleEvents", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"items": [{"summary": "Dentist", "start": {"dateTime": "2025-03-14T10:00:00-05:00"}}]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let provider = CalendarProvider::new(
        CalendarConfig {
            enabled: true,
            endpoint: format!("{}/calendar/v3", server.uri()),
            ..Default::default()
        },
        build_client(None).unwrap(),
        Arc::new(StaticToken::new("cal-token")),
    )
    .unwrap();

    let events = provider.fetch().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].display_line(), "10:00 AM - Dentist");
}

#[tokio::test]
async fn calendar_rejected_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = CalendarProvider::new(
        CalendarConfig {
            enabled: true,
            endpoint: server.uri(),
            ..Default::default()
        },
        build_client(None).unwrap(),
        Arc::new(StaticToken::new("expired")),
    )
    .unwrap();

    let err = provider.fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Unauthorized(_)), "got {err:?}");
    assert!(!err.to_string().contains("expired"));
}

#[tokio::test]
async fn chat_uses_bot_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v10/channels/777/messages"))
        .and(header("authorization", "Bot chat-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"content": "on my way", "timestamp": "2025-03-14T07:45:00+00:00",
                 "author": {"username": "bob", "global_name": "Bob Jones"}},
                {"content": "!ping", "timestamp": "2025-03-14T07:40:00+00:00",
                 "author": {"username": "bob", "global_name": null}}
            ]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ChatProvider::new(
        ChatConfig {
            enabled: true,
            bot_token: Some("chat-token".into()),
            channel_id: "777".into(),
            endpoint: format!("{}/api/v10", server.uri()),
            ..Default::default()
        },
        build_client(None).unwrap(),
    )
    .unwrap();

    let messages = provider.fetch().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].display_line(), "07:45 Bob: on my way");
}

#[tokio::test]
async fn slow_server_hits_client_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(FORECAST)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let provider = WeatherProvider::new(
        WeatherConfig {
            endpoint: server.uri(),
            ..Default::default()
        },
        build_client(Some(Duration::from_millis(100))).unwrap(),
    )
    .unwrap();

    let err = provider.fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)), "got {err:?}");
}
