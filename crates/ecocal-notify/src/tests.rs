use crate::channels::telegram::{TelegramChannel, TelegramConfig};
use crate::channels::webhook::WebhookChannel;
use crate::dispatcher::NotificationDispatcher;
use crate::error::NotifyError;
use crate::plugin::ChannelRegistry;
use crate::template::{
    describe_lead_time, offset_from_minutes, render_daily_summary, render_grouped_alert, Markup,
};
use crate::{NotificationChannel, SendResponse};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Router;
use chrono::{TimeZone, Utc};
use ecocal_alert::DeliveryChannel;
use ecocal_common::types::{CategoryRule, EconomicEvent, Impact, LeadTime};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

fn event(name: &str, impact: Impact, hour: u32, minute: u32) -> EconomicEvent {
    EconomicEvent {
        id: format!("ev-{name}"),
        name: name.to_string(),
        scheduled_at: Utc.with_ymd_and_hms(2025, 3, 12, hour, minute, 0).unwrap(),
        impact,
        forecast: Some("0.3%".to_string()),
        previous: None,
        actual: None,
    }
}

fn rule(impact: Impact, lead: LeadTime) -> CategoryRule {
    CategoryRule {
        id: "rule-1".to_string(),
        impact,
        lead_time: lead,
        destination: "123456".to_string(),
        active: true,
    }
}

// ── Plugin registry tests ──

#[test]
fn registry_default_has_all_builtin_plugins() {
    let registry = ChannelRegistry::with_builtin();
    let mut names = registry.plugin_names();
    names.sort();
    assert_eq!(names, vec!["telegram", "webhook"]);
}

#[test]
fn registry_unknown_plugin_returns_error() {
    let registry = ChannelRegistry::with_builtin();
    let config = serde_json::json!({});
    let err = registry
        .build_channel("email", "ch-1", &config)
        .err()
        .expect("should return error for unknown plugin");
    assert!(
        matches!(
            err.downcast_ref::<NotifyError>(),
            Some(NotifyError::UnknownChannelType(name)) if name == "email"
        ),
        "error was: {err}"
    );
}

#[test]
fn telegram_plugin_validates_config() {
    let registry = ChannelRegistry::with_builtin();

    let valid = serde_json::json!({ "bot_token": "123:abc", "parse_mode": "Markdown" });
    let channel = registry.build_channel("telegram", "tg", &valid).unwrap();
    assert_eq!(channel.channel_type(), "telegram");
    assert_eq!(channel.instance_id(), "tg");
    assert_eq!(channel.markup(), Markup::Markdown);

    let v2 = serde_json::json!({ "bot_token": "123:abc", "parse_mode": "MarkdownV2" });
    let channel = registry.build_channel("telegram", "tg", &v2).unwrap();
    assert_eq!(channel.markup(), Markup::MarkdownV2);

    let unset = serde_json::json!({ "bot_token": "123:abc" });
    let channel = registry.build_channel("telegram", "tg", &unset).unwrap();
    assert_eq!(channel.markup(), Markup::Plain);

    let unknown = serde_json::json!({ "bot_token": "123:abc", "parse_mode": "BBCode" });
    assert!(registry.build_channel("telegram", "tg", &unknown).is_err());

    assert!(registry
        .build_channel("telegram", "tg", &serde_json::json!({}))
        .is_err());
    assert!(registry
        .build_channel("telegram", "tg", &serde_json::json!({ "bot_token": "  " }))
        .is_err());
}

#[test]
fn webhook_plugin_validates_config() {
    let registry = ChannelRegistry::with_builtin();

    let valid = serde_json::json!({ "url": "https://hooks.example.com/ecocal" });
    let channel = registry.build_channel("webhook", "wh", &valid).unwrap();
    assert_eq!(channel.markup(), Markup::Plain);

    assert!(registry
        .build_channel("webhook", "wh", &serde_json::json!({}))
        .is_err());
    assert!(registry
        .build_channel("webhook", "wh", &serde_json::json!({ "url": "ftp://x" }))
        .is_err());
}

#[test]
fn telegram_plugin_redacts_bot_token() {
    let registry = ChannelRegistry::with_builtin();
    let plugin = registry.get_plugin("telegram").unwrap();
    let redacted = plugin.redact_config(&serde_json::json!({
        "bot_token": "123:secret",
        "parse_mode": "Markdown"
    }));
    assert_eq!(redacted["bot_token"], "***");
    assert_eq!(redacted["parse_mode"], "Markdown");
}

#[test]
fn redaction_reaches_nested_values() {
    let redacted = crate::utils::redact_secrets(&serde_json::json!({
        "url": "https://hooks.example.com",
        "headers": [{ "Api_Key": "k" }, { "accept": "json" }],
        "auth": { "password": "p", "user": "u" }
    }));
    assert_eq!(redacted["headers"][0]["Api_Key"], "***");
    assert_eq!(redacted["headers"][1]["accept"], "json");
    assert_eq!(redacted["auth"]["password"], "***");
    assert_eq!(redacted["auth"]["user"], "u");
    assert_eq!(redacted["url"], "https://hooks.example.com");
}

#[test]
fn truncate_body_keeps_char_boundaries() {
    assert_eq!(crate::utils::truncate_body("short", 10), "short");
    // "é" is two bytes; cutting at 2 would split it.
    assert_eq!(crate::utils::truncate_body("aéb", 2), "a... [truncated]");
}

#[test]
fn telegram_payload_carries_parse_mode() {
    let channel = TelegramChannel::new(
        "tg",
        TelegramConfig {
            bot_token: "123:abc".to_string(),
            parse_mode: Some("Markdown".to_string()),
            api_base: "https://api.telegram.org/".to_string(),
            disable_notification: false,
        },
    );
    assert_eq!(
        channel.endpoint(),
        "https://api.telegram.org/bot123:abc/sendMessage"
    );
    let payload = channel.build_payload("42", "hello");
    assert_eq!(payload["chat_id"], "42");
    assert_eq!(payload["text"], "hello");
    assert_eq!(payload["parse_mode"], "Markdown");
    assert!(payload.get("disable_notification").is_none());
}

#[test]
fn webhook_template_escapes_values() {
    let channel = WebhookChannel::new(
        "wh",
        "https://hooks.example.com".to_string(),
        Some(r#"{"chat":"{{destination}}","msg":"{{text}}"}"#.to_string()),
    );
    let body = channel.render_body("chat-1", "line \"one\"\nline two");
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["chat"], "chat-1");
    assert_eq!(parsed["msg"], "line \"one\"\nline two");
}

// ── Template tests ──

#[test]
fn lead_time_descriptions() {
    assert_eq!(describe_lead_time(LeadTime::from_minutes(2)), "2 minutes");
    assert_eq!(describe_lead_time(LeadTime::from_minutes(1)), "1 minute");
    assert_eq!(describe_lead_time(LeadTime::from_minutes(30)), "30 minutes");
    assert_eq!(describe_lead_time(LeadTime::from_minutes(60)), "1 hour");
    assert_eq!(describe_lead_time(LeadTime::from_minutes(120)), "2 hours");
    assert_eq!(describe_lead_time(LeadTime::from_minutes(90)), "1.5 hours");
}

#[test]
fn grouped_alert_uses_explicit_offset() {
    let events = vec![
        event("CPI m/m", Impact::High, 12, 30),
        event("Core CPI", Impact::High, 12, 30),
    ];
    let offset = offset_from_minutes(-180);
    let text = render_grouped_alert(
        &events,
        &rule(Impact::High, LeadTime::from_minutes(2)),
        offset,
        Markup::Markdown,
    );

    assert!(text.contains("⏰ In *2 minutes*"));
    assert!(text.contains("09:30    ⭐⭐⭐    CPI m/m    0.3%    —"));
    assert!(text.contains("Core CPI"));
    assert!(!text.contains("12:30"));

    let utc_text = render_grouped_alert(
        &events,
        &rule(Impact::High, LeadTime::from_minutes(2)),
        offset_from_minutes(0),
        Markup::Markdown,
    );
    assert!(utc_text.contains("12:30"));
}

#[test]
fn grouped_alert_escapes_markdown_in_names() {
    let events = vec![event("ISM_Manufacturing *PMI*", Impact::Medium, 14, 0)];
    let text = render_grouped_alert(
        &events,
        &rule(Impact::Medium, LeadTime::from_minutes(60)),
        offset_from_minutes(0),
        Markup::Markdown,
    );
    assert!(text.contains(r"ISM\_Manufacturing \*PMI\*"));
    assert!(text.contains("⭐⭐    "));
    assert_eq!(Markup::Markdown.escape("a`b[c"), r"a\`b\[c");
}

#[test]
fn plain_alert_has_no_markup() {
    let events = vec![event("ISM_Manufacturing *PMI*", Impact::Medium, 14, 0)];
    let text = render_grouped_alert(
        &events,
        &rule(Impact::Medium, LeadTime::from_minutes(90)),
        offset_from_minutes(0),
        Markup::Plain,
    );
    assert!(text.starts_with("🚨 ECONOMIC ALERTS\n"));
    assert!(text.contains("⏰ In 1.5 hours\n"));
    assert!(text.contains("ISM_Manufacturing *PMI*"));
    assert!(!text.contains('\\'));
}

#[test]
fn markdown_v2_escapes_every_reserved_char() {
    let mut cpi = event("CPI (y/y) - Core", Impact::High, 12, 30);
    cpi.forecast = Some("-0.1%".to_string());
    let text = render_grouped_alert(
        &[cpi],
        &rule(Impact::High, LeadTime::from_minutes(90)),
        offset_from_minutes(0),
        Markup::MarkdownV2,
    );
    assert!(text.contains(r"⏰ In *1\.5 hours*"));
    assert!(text.contains(r"CPI \(y/y\) \- Core    \-0\.1%"));
    assert!(text.ends_with(r"Expect possible volatility\!"));
}

#[test]
fn html_markup_uses_tags() {
    let events = vec![event("S&P <Global> PMI", Impact::Low, 9, 45)];
    let text = render_daily_summary(&events, offset_from_minutes(0), Markup::Html).unwrap();
    assert!(text.contains("<b>Good morning! Today's events:</b>"));
    assert!(text.contains("🟢 09:45 - <b>S&amp;P &lt;Global&gt; PMI</b>"));
    assert!(text.ends_with("<i>Have a great trading day!</i>"));
}

#[test]
fn parse_mode_selects_markup() {
    assert_eq!(Markup::from_parse_mode(None), Ok(Markup::Plain));
    assert_eq!(Markup::from_parse_mode(Some("  ")), Ok(Markup::Plain));
    assert_eq!(Markup::from_parse_mode(Some("markdown")), Ok(Markup::Markdown));
    assert_eq!(Markup::from_parse_mode(Some("MarkdownV2")), Ok(Markup::MarkdownV2));
    assert_eq!(Markup::from_parse_mode(Some("HTML")), Ok(Markup::Html));
    assert!(Markup::from_parse_mode(Some("BBCode")).is_err());
}

#[test]
fn daily_summary_lists_events_or_returns_none() {
    assert!(render_daily_summary(&[], offset_from_minutes(0), Markup::Markdown).is_none());

    let events = vec![
        event("CPI", Impact::High, 12, 30),
        event("Retail Sales", Impact::Medium, 14, 0),
    ];
    let text = render_daily_summary(&events, offset_from_minutes(60), Markup::Markdown).unwrap();
    assert!(text.contains("🔴 13:30 - *CPI*"));
    assert!(text.contains("🟡 15:00 - *Retail Sales*"));
}

#[test]
fn out_of_range_offset_falls_back_to_utc() {
    assert_eq!(offset_from_minutes(100_000).local_minus_utc(), 0);
    assert_eq!(offset_from_minutes(330).local_minus_utc(), 330 * 60);
}

// ── Dispatcher tests ──

#[derive(Default)]
struct MockChannel {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

#[async_trait]
impl NotificationChannel for Arc<MockChannel> {
    async fn send(&self, destination: &str, text: &str) -> anyhow::Result<SendResponse> {
        if self.fail {
            anyhow::bail!("chat not found");
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), text.to_string()));
        Ok(SendResponse::default())
    }

    fn channel_type(&self) -> &str {
        "mock"
    }

    fn instance_id(&self) -> &str {
        "mock-1"
    }
}

#[tokio::test]
async fn dispatcher_renders_and_sends_one_message_per_group() {
    let mock = Arc::new(MockChannel::default());
    let dispatcher = NotificationDispatcher::new(Box::new(mock.clone()), offset_from_minutes(0));
    let events = vec![
        event("CPI", Impact::High, 12, 30),
        event("Core CPI", Impact::High, 12, 30),
    ];

    dispatcher
        .deliver("123456", &events, &rule(Impact::High, LeadTime::from_minutes(2)))
        .await
        .unwrap();

    let sent = mock.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "123456");
    assert!(sent[0].1.contains("CPI"));
    assert!(sent[0].1.contains("Core CPI"));
    assert!(sent[0].1.starts_with("🚨 ECONOMIC ALERTS\n"), "{}", sent[0].1);
}

#[tokio::test]
async fn dispatcher_failure_names_the_channel() {
    let mock = Arc::new(MockChannel {
        fail: true,
        ..Default::default()
    });
    let dispatcher = NotificationDispatcher::new(Box::new(mock), offset_from_minutes(0));
    let err = dispatcher
        .deliver(
            "123456",
            &[event("CPI", Impact::High, 12, 30)],
            &rule(Impact::High, LeadTime::from_minutes(2)),
        )
        .await
        .unwrap_err();
    let rendered = format!("{err:#}");
    assert!(rendered.contains("mock channel 'mock-1'"), "{rendered}");
    assert!(rendered.contains("chat not found"), "{rendered}");
}

// ── HTTP channel tests against a local stub ──

struct StubState {
    responses: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<(String, String)>>,
}

async fn stub_handler(
    State(state): State<Arc<StubState>>,
    uri: axum::http::Uri,
    body: Bytes,
) -> (StatusCode, String) {
    state
        .requests
        .lock()
        .unwrap()
        .push((uri.path().to_string(), String::from_utf8_lossy(&body).to_string()));
    let (status, body) = state
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((500, "no scripted response".to_string()));
    (StatusCode::from_u16(status).unwrap(), body)
}

async fn spawn_stub(responses: Vec<(u16, &str)>) -> (String, Arc<StubState>) {
    let state = Arc::new(StubState {
        responses: Mutex::new(
            responses
                .into_iter()
                .map(|(s, b)| (s, b.to_string()))
                .collect(),
        ),
        requests: Mutex::new(Vec::new()),
    });
    let app = Router::new().fallback(stub_handler).with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn telegram_for(api_base: &str) -> TelegramChannel {
    TelegramChannel::new(
        "tg",
        TelegramConfig {
            bot_token: "123:abc".to_string(),
            parse_mode: Some("Markdown".to_string()),
            api_base: api_base.to_string(),
            disable_notification: false,
        },
    )
}

#[tokio::test]
async fn telegram_send_returns_message_id() {
    let (base, stub) = spawn_stub(vec![(200, r#"{"ok":true,"result":{"message_id":42}}"#)]).await;
    let channel = telegram_for(&base);

    let resp = channel.send("987", "hello").await.unwrap();
    assert_eq!(resp.http_status, Some(200));
    assert_eq!(resp.retry_count, 0);
    assert_eq!(resp.api_message_id.as_deref(), Some("42"));

    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "/bot123:abc/sendMessage");
    let body: serde_json::Value = serde_json::from_str(&requests[0].1).unwrap();
    assert_eq!(body["chat_id"], "987");
    assert_eq!(body["text"], "hello");
}

#[tokio::test]
async fn telegram_retries_server_errors() {
    let (base, stub) = spawn_stub(vec![
        (502, "bad gateway"),
        (200, r#"{"ok":true,"result":{"message_id":7}}"#),
    ])
    .await;
    let channel = telegram_for(&base);

    let resp = channel.send("987", "hello").await.unwrap();
    assert_eq!(resp.retry_count, 1);
    assert_eq!(stub.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn telegram_does_not_retry_client_errors() {
    let (base, stub) = spawn_stub(vec![(
        400,
        r#"{"ok":false,"description":"Bad Request: chat not found"}"#,
    )])
    .await;
    let channel = telegram_for(&base);

    let err = channel.send("987", "hello").await.unwrap_err();
    match err.downcast_ref::<NotifyError>() {
        Some(NotifyError::Rejected { status, body, .. }) => {
            assert_eq!(*status, 400);
            assert!(body.contains("chat not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(stub.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn telegram_treats_ok_false_as_failure() {
    let (base, _stub) =
        spawn_stub(vec![(200, r#"{"ok":false,"description":"blocked by user"}"#)]).await;
    let channel = telegram_for(&base);
    assert!(channel.send("987", "hello").await.is_err());
}

#[tokio::test]
async fn telegram_gives_up_after_three_attempts() {
    let (base, stub) = spawn_stub(vec![(503, "down"), (503, "down"), (503, "down")]).await;
    let channel = telegram_for(&base);
    assert!(channel.send("987", "hello").await.is_err());
    assert_eq!(stub.requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn webhook_posts_default_json_body() {
    let (base, stub) = spawn_stub(vec![(204, "")]).await;
    let channel = WebhookChannel::new("wh", format!("{base}/hook"), None);

    let resp = channel.send("chat-9", "alert text").await.unwrap();
    assert_eq!(resp.http_status, Some(204));

    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests[0].0, "/hook");
    let body: serde_json::Value = serde_json::from_str(&requests[0].1).unwrap();
    assert_eq!(body["destination"], "chat-9");
    assert_eq!(body["text"], "alert text");
    assert!(body["sent_at"].is_string());
}
