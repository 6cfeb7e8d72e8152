use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::time::{Duration, Instant};

pub const TRACE_HEADER: &str = "x-trace-id";

/// Longest request body excerpt written to the log.
const BODY_EXCERPT_CHARS: usize = 200;
/// POST bodies above this size reach the handler empty.
const MAX_BUFFERED_BODY: usize = 64 * 1024;

/// Trace id of the current request, stored in request extensions.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl TraceId {
    /// Keeps a caller-supplied `X-Trace-Id` when it looks sane, so an
    /// external cron service can correlate its own logs with ours.
    fn for_request(headers: &HeaderMap) -> Self {
        let supplied = headers
            .get(TRACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| is_acceptable_trace_id(v));
        match supplied {
            Some(v) => Self(v.to_string()),
            None => Self::random(),
        }
    }

    fn random() -> Self {
        let raw: u64 = rand::thread_rng().gen();
        Self(format!("{raw:016x}"))
    }
}

fn is_acceptable_trace_id(v: &str) -> bool {
    (8..=64).contains(&v.len())
        && v.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Logs one line per request and one per response, tagged with the trace
/// id, and echoes the id back in `X-Trace-Id`.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = TraceId::for_request(req.headers());
    req.extensions_mut().insert(trace_id.clone());

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let (req, excerpt) = if method == Method::POST {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_BUFFERED_BODY)
            .await
            .unwrap_or_default();
        let excerpt = body_excerpt(&bytes, BODY_EXCERPT_CHARS);
        (Request::from_parts(parts, Body::from(bytes)), excerpt)
    } else {
        (req, None)
    };

    tracing::info!(
        trace_id = %trace_id.0,
        method = %method,
        path = %path,
        body = excerpt.as_deref().unwrap_or(""),
        ua = %user_agent,
        "--> request"
    );

    let started = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = human_elapsed(started.elapsed());
    let status = response.status();

    let level = response_level(status);
    if level == tracing::Level::ERROR {
        tracing::error!(trace_id = %trace_id.0, status = status.as_u16(), elapsed = %elapsed, "<-- response");
    } else if level == tracing::Level::WARN {
        tracing::warn!(trace_id = %trace_id.0, status = status.as_u16(), elapsed = %elapsed, "<-- response");
    } else {
        tracing::info!(trace_id = %trace_id.0, status = status.as_u16(), elapsed = %elapsed, "<-- response");
    }

    if let Ok(val) = HeaderValue::from_str(&trace_id.0) {
        response.headers_mut().insert(TRACE_HEADER, val);
    }
    response
}

fn response_level(status: StatusCode) -> tracing::Level {
    if status.is_server_error() {
        tracing::Level::ERROR
    } else if status.is_client_error() {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    }
}

/// `None` for an empty body. Non-UTF-8 bodies are summarized by size.
fn body_excerpt(bytes: &[u8], max_chars: usize) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let Ok(text) = std::str::from_utf8(bytes) else {
        return Some(format!("<{} binary bytes>", bytes.len()));
    };
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        Some(format!("{head}..."))
    } else {
        Some(head)
    }
}

fn human_elapsed(d: Duration) -> String {
    match d.as_micros() {
        us if us < 1_000 => format!("{us}µs"),
        us if us < 1_000_000 => format!("{}ms", us / 1_000),
        _ => format!("{:.1}s", d.as_secs_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_trace_id_is_sixteen_hex_chars() {
        let id = TraceId::random();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn supplied_trace_id_is_kept_only_when_sane() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_HEADER, HeaderValue::from_static("cron-job-42abc"));
        assert_eq!(TraceId::for_request(&headers).0, "cron-job-42abc");

        headers.insert(TRACE_HEADER, HeaderValue::from_static("short"));
        assert_ne!(TraceId::for_request(&headers).0, "short");

        headers.insert(TRACE_HEADER, HeaderValue::from_static("has spaces in it"));
        assert_eq!(TraceId::for_request(&headers).len(), 16);
    }

    #[test]
    fn body_excerpt_counts_chars() {
        assert_eq!(body_excerpt(b"", 10), None);
        assert_eq!(body_excerpt(b"abc", 10).as_deref(), Some("abc"));
        assert_eq!(body_excerpt("héllo".as_bytes(), 2).as_deref(), Some("hé..."));
        assert_eq!(
            body_excerpt(&[0xff, 0xfe], 10).as_deref(),
            Some("<2 binary bytes>")
        );
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(human_elapsed(Duration::from_micros(999)), "999µs");
        assert_eq!(human_elapsed(Duration::from_micros(12_345)), "12ms");
        assert_eq!(human_elapsed(Duration::from_millis(2_500)), "2.5s");
    }

    #[test]
    fn status_maps_to_log_level() {
        assert_eq!(response_level(StatusCode::OK), tracing::Level::INFO);
        assert_eq!(response_level(StatusCode::METHOD_NOT_ALLOWED), tracing::Level::WARN);
        assert_eq!(
            response_level(StatusCode::INTERNAL_SERVER_ERROR),
            tracing::Level::ERROR
        );
    }
}
