//! Remote checks against a mock HTTP server.

use std::sync::Arc;

use formguard_validator::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine() -> Engine {
    Engine::builder().transport(Arc::new(HttpTransport::new())).build()
}

async fn check(engine: &Engine, input: &Element) -> Outcome {
    let mut field = engine.bind_field(input.handle(), OptionLayer::new()).unwrap();
    field
        .when_validate(ValidateOptions::default())
        .unwrap()
        .expect("no group restriction")
        .await
}

#[tokio::test]
async fn get_requests_carry_the_value_under_the_field_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/available"))
        .and(query_param("user", "bob"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let input = Element::input("text")
        .with_attr("name", "user")
        .with_value("bob")
        .with_attr("data-parsley-remote", &format!("{}/available", server.uri()));
    assert_eq!(check(&engine(), &input).await, Ok(()));
}

#[tokio::test]
async fn error_statuses_fail_the_default_strategy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let input = Element::input("text")
        .with_attr("name", "user")
        .with_value("taken")
        .with_attr("data-parsley-remote", &format!("{}/available", server.uri()));
    let failures = check(&engine(), &input).await.unwrap_err();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].constraint.name(), "remote");
}

#[tokio::test]
async fn reverse_accepts_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let input = Element::input("text")
        .with_attr("name", "user")
        .with_value("fresh")
        .with_attr("data-parsley-remote", &format!("{}/taken", server.uri()))
        .with_attr("data-parsley-remote-reverse", "true");
    assert_eq!(check(&engine(), &input).await, Ok(()));
}

#[tokio::test]
async fn value_placeholders_are_substituted_into_the_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/bob%20smith"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let input = Element::input("text")
        .with_attr("name", "user")
        .with_value("bob smith")
        .with_attr("data-parsley-remote", &format!("{}/users/{{value}}", server.uri()));
    assert_eq!(check(&engine(), &input).await, Ok(()));
}

#[tokio::test]
async fn post_requests_send_a_form_body_with_extra_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/check"))
        .and(body_string_contains("user=bob"))
        .and(body_string_contains("token=7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let options = json!({"type": "post", "data": {"token": 7}}).to_string();
    let input = Element::input("text")
        .with_attr("name", "user")
        .with_value("bob")
        .with_attr("data-parsley-remote", &format!("{}/check", server.uri()))
        .with_attr("data-parsley-remote-options", &options);
    assert_eq!(check(&engine(), &input).await, Ok(()));
}

#[tokio::test]
async fn identical_requests_are_sent_once_until_the_cache_is_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/available"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let engine = engine();
    let url = format!("{}/available", server.uri());
    let first = Element::input("text").with_attr("name", "user").with_value("bob").with_attr("data-parsley-remote", &url);
    let second = Element::input("text").with_attr("name", "user").with_value("bob").with_attr("data-parsley-remote", &url);

    assert_eq!(check(&engine, &first).await, Ok(()));
    assert_eq!(check(&engine, &second).await, Ok(()));
    assert_eq!(engine.remote().cached_requests(), 1);

    engine.remote().clear_cache();
    assert_eq!(check(&engine, &first).await, Ok(()));
}

#[tokio::test]
async fn named_strategies_judge_the_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"free\":false}"))
        .mount(&server)
        .await;

    let engine = engine();
    engine.remote().add_async_validator(
        "flag",
        AsyncValidator::new(|response: &Response| response.body.contains("\"free\":true"))
            .with_url(format!("{}/lookup", server.uri())),
    );
    let input = Element::input("text")
        .with_attr("name", "user")
        .with_value("bob")
        .with_attr("data-parsley-remote", "")
        .with_attr("data-parsley-remote-validator", "flag");
    assert!(check(&engine, &input).await.is_err());
}

#[tokio::test]
async fn unreachable_servers_reject() {
    let input = Element::input("text")
        .with_attr("name", "user")
        .with_value("bob")
        .with_attr("data-parsley-remote", "http://127.0.0.1:9/nothing");
    assert!(check(&engine(), &input).await.is_err());
}
