use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardlink::services::email::{EmailClient, EmailError, OutgoingEmail};

fn message(to: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Your ticket".to_string(),
        text: "See you there".to_string(),
    }
}

#[tokio::test]
async fn sends_through_sendgrid() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("authorization", "Bearer SG.key"))
        .and(body_partial_json(json!({
            "personalizations": [{ "to": [{ "email": "ada@example.com" }] }],
            "from": { "email": "tickets@cardlink.app" },
            "subject": "Your ticket",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let client = EmailClient::new(
        &server.uri(),
        Some(Secret::new("SG.key".to_string())),
        "tickets@cardlink.app",
    );

    client.send(&message("ada@example.com")).await.unwrap();
}

#[tokio::test]
async fn api_failure_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = EmailClient::new(
        &server.uri(),
        Some(Secret::new("SG.wrong".to_string())),
        "tickets@cardlink.app",
    );

    let err = client.send(&message("ada@example.com")).await.unwrap_err();
    assert!(matches!(err, EmailError::ApiError(msg) if msg.contains("bad key")));
}

#[tokio::test]
async fn best_effort_counts_only_delivered_messages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(body_partial_json(json!({
            "personalizations": [{ "to": [{ "email": "bounce@example.com" }] }],
        })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = EmailClient::new(
        &server.uri(),
        Some(Secret::new("SG.key".to_string())),
        "tickets@cardlink.app",
    );

    let delivered = client
        .send_all_best_effort(&[
            message("ada@example.com"),
            message("bounce@example.com"),
            message("grace@example.com"),
        ])
        .await;

    assert_eq!(delivered, 2);
}

#[tokio::test]
async fn without_api_key_nothing_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let client = EmailClient::new(&server.uri(), None, "tickets@cardlink.app");
    client.send(&message("ada@example.com")).await.unwrap();
}
