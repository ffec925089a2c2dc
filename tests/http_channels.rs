//! HTTP contract tests for the Gmail client and the notifiers.
//!
//! Each test starts a `wiremock` server standing in for the real API.

use base64::Engine as _;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, Utc};
use secrecy::SecretString;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mail_digest::channels::{GmailClient, TelegramNotifier, WhatsAppNotifier};
use mail_digest::config::GmailConfig;
use mail_digest::error::{NotifyError, SourceError};
use mail_digest::pipeline::source::normalize;
use mail_digest::pipeline::{MailboxClient, MailboxQuery, Notifier};

/// Write a token file holding a still-valid access token.
fn token_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("token.json");
    let json = serde_json::json!({
        "token": "access-1",
        "refresh_token": "refresh-1",
        "client_id": "client-1",
        "client_secret": "secret-1",
        "token_uri": "http://127.0.0.1:1/token",
        "expiry": (Utc::now() + Duration::hours(1)).to_rfc3339(),
    });
    std::fs::write(&path, json.to_string()).unwrap();
    path
}

fn gmail(server: &MockServer, dir: &tempfile::TempDir) -> GmailClient {
    GmailClient::new(&GmailConfig {
        api_base: server.uri(),
        token_path: token_file(dir),
    })
    .unwrap()
}

// ── Gmail ───────────────────────────────────────────────────────────

#[tokio::test]
async fn gmail_search_sends_query_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("q", "after:2026/01/11 in:inbox"))
        .and(query_param("maxResults", "50"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": [{"id": "a1", "threadId": "t1"}, {"id": "a2", "threadId": "t2"}],
            "resultSizeEstimate": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = gmail(&server, &dir);
    let query = MailboxQuery {
        since: NaiveDate::from_ymd_opt(2026, 1, 11).unwrap(),
        max_results: 50,
    };

    assert_eq!(client.search(&query).await.unwrap(), vec!["a1", "a2"]);
}

#[tokio::test]
async fn gmail_search_with_no_matches_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "resultSizeEstimate": 0
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let query = MailboxQuery {
        since: NaiveDate::from_ymd_opt(2026, 1, 11).unwrap(),
        max_results: 50,
    };
    assert!(gmail(&server, &dir).search(&query).await.unwrap().is_empty());
}

#[tokio::test]
async fn gmail_fetch_multipart_message() {
    let server = MockServer::start().await;
    let encode = |s: &str| base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(s);
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages/a1"))
        .and(query_param("format", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "a1",
            "threadId": "t1",
            "snippet": "Quarterly numbers",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    {"name": "From", "value": "\"Jane Doe\" <jane@x.com>"},
                    {"name": "Subject", "value": "Q1 report"},
                    {"name": "Date", "value": "Tue, 13 Jan 2026 08:00:00 +0000"}
                ],
                "body": {"size": 0},
                "parts": [
                    {"mimeType": "text/plain", "body": {"size": 17, "data": encode("Quarterly numbers")}},
                    {"mimeType": "text/html", "body": {"size": 24, "data": encode("<b>Quarterly numbers</b>")}}
                ]
            }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let raw = gmail(&server, &dir).fetch("a1").await.unwrap();
    let message = normalize(&raw);

    assert_eq!(message.id, "a1");
    assert_eq!(message.subject, "Q1 report");
    assert_eq!(message.sender, "\"Jane Doe\" <jane@x.com>");
    assert_eq!(message.date_raw, "Tue, 13 Jan 2026 08:00:00 +0000");
    assert_eq!(message.body, "Quarterly numbers");
}

#[tokio::test]
async fn gmail_unauthorized_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages/a1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = gmail(&server, &dir).fetch("a1").await.unwrap_err();
    assert!(matches!(err, SourceError::Auth(_)));
}

#[tokio::test]
async fn gmail_server_error_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages/a1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = gmail(&server, &dir).fetch("a1").await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 503, .. }));
}

#[tokio::test]
async fn gmail_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "emailAddress": "me@x.com",
            "messagesTotal": 1234,
            "threadsTotal": 900,
            "historyId": "42"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let profile = gmail(&server, &dir).profile().await.unwrap();
    assert_eq!(profile.email_address, "me@x.com");
    assert_eq!(profile.messages_total, 1234);
}

// ── WhatsApp ────────────────────────────────────────────────────────

#[tokio::test]
async fn whatsapp_posts_text_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v18.0/1055/messages"))
        .and(header("authorization", "Bearer wa-token"))
        .and(body_json(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": "34600000000",
            "type": "text",
            "text": {"body": "🌅 digest"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": [{"id": "wamid.1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WhatsAppNotifier::new(SecretString::from("wa-token"), "1055", "34600000000")
        .unwrap()
        .with_api_base(server.uri());
    notifier.send("🌅 digest").await.unwrap();
}

#[tokio::test]
async fn whatsapp_rejection_is_notify_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v18.0/1055/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_string("recipient not in allowed list"))
        .mount(&server)
        .await;

    let notifier = WhatsAppNotifier::new(SecretString::from("wa-token"), "1055", "34600000000")
        .unwrap()
        .with_api_base(server.uri());
    let err = notifier.send("hi").await.unwrap_err();
    assert!(matches!(err, NotifyError::Rejected { status: 400, .. }));
}

#[tokio::test]
async fn whatsapp_gives_up_on_hung_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v18.0/1055/messages"))
        .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_secs(10)))
        .mount(&server)
        .await;

    let notifier = WhatsAppNotifier::new(SecretString::from("wa-token"), "1055", "34600000000")
        .unwrap()
        .with_api_base(server.uri())
        .with_timeout(StdDuration::from_millis(200))
        .unwrap();
    let err = notifier.send("hi").await.unwrap_err();
    assert!(matches!(err, NotifyError::SendFailed { .. }));
}

// ── Telegram ────────────────────────────────────────────────────────

#[tokio::test]
async fn telegram_sends_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendMessage"))
        .and(body_partial_json(serde_json::json!({
            "chat_id": "42",
            "parse_mode": "Markdown"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(SecretString::from("123:ABC"), "42")
        .unwrap()
        .with_api_base(server.uri());
    notifier.send("*bold* digest").await.unwrap();
}

#[tokio::test]
async fn telegram_retries_plain_when_markdown_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendMessage"))
        .and(body_partial_json(serde_json::json!({"parse_mode": "Markdown"})))
        .respond_with(ResponseTemplate::new(400).set_body_string("can't parse entities"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendMessage"))
        .and(body_json(serde_json::json!({
            "chat_id": "42",
            "text": "unbalanced *markup"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(SecretString::from("123:ABC"), "42")
        .unwrap()
        .with_api_base(server.uri());
    notifier.send("unbalanced *markup").await.unwrap();
}

#[tokio::test]
async fn telegram_both_attempts_rejected_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendMessage"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bot was blocked by the user"))
        .expect(2)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(SecretString::from("123:ABC"), "42")
        .unwrap()
        .with_api_base(server.uri());
    let err = notifier.send("hi").await.unwrap_err();
    assert!(matches!(err, NotifyError::Rejected { status: 403, .. }));
}

#[tokio::test]
async fn telegram_long_digest_is_one_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(SecretString::from("123:ABC"), "42")
        .unwrap()
        .with_api_base(server.uri());
    let digest = format!("{}\n{}", "📌 item ".repeat(400), "x".repeat(2000));
    assert!(digest.len() > 4096);
    notifier.send(&digest).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(text.len() <= 4096);
    assert!(text.ends_with('…'));
}

#[tokio::test]
async fn telegram_gives_up_on_hung_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:ABC/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_secs(10)))
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(SecretString::from("123:ABC"), "42")
        .unwrap()
        .with_api_base(server.uri())
        .with_timeout(StdDuration::from_millis(200))
        .unwrap();
    let err = notifier.send("hi").await.unwrap_err();
    assert!(matches!(err, NotifyError::SendFailed { .. }));
}
