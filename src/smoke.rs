//! Dashboard Smoke Check
//!
//! Requests a running dashboard and reports what the page looks like.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default dashboard address
pub const DEFAULT_URL: &str = "http://localhost:8502";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const START_HINT: &str = "start the dashboard with `freemobilachat` (default port 8502)";

/// Errors raised by the smoke check
#[derive(Debug, Error)]
pub enum SmokeError {
    #[error("Dashboard unreachable at {url}: {message}; {hint}")]
    Unreachable {
        url: String,
        message: String,
        hint: &'static str,
    },

    #[error("Dashboard at {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// What the smoke check saw
#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub url: String,
    pub status: u16,
    pub title: Option<String>,
    /// `<i>` elements whose class contains `fa`
    pub icon_count: usize,
    pub elapsed_ms: u128,
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"))
}

fn icon_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<i\s[^>]*class\s*=\s*["'][^"']*fa[^"']*["']"#).expect("valid icon regex")
    })
}

/// Page `<title>`, trimmed
pub fn extract_title(html: &str) -> Option<String> {
    title_regex()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Number of Font Awesome icon elements
pub fn count_icons(html: &str) -> usize {
    icon_regex().find_iter(html).count()
}

/// GET the dashboard and require HTTP 200
pub async fn run_smoke(url: &str, timeout: Duration) -> Result<SmokeReport, SmokeError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let started = Instant::now();

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_connect() || e.is_timeout() {
            SmokeError::Unreachable {
                url: url.to_string(),
                message: e.to_string(),
                hint: START_HINT,
            }
        } else {
            SmokeError::Request(e)
        }
    })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(SmokeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let html = response.text().await?;
    let report = SmokeReport {
        url: url.to_string(),
        status: status.as_u16(),
        title: extract_title(&html),
        icon_count: count_icons(&html),
        elapsed_ms: started.elapsed().as_millis(),
    };

    tracing::info!(
        url = %report.url,
        status = report.status,
        icons = report.icon_count,
        elapsed_ms = report.elapsed_ms as u64,
        "Smoke check passed"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><head><title> FreeMobilaChat </title></head>
<body><i class="fa-solid fa-comments"></i><i class="fas fa-chart-pie" aria-hidden="true"></i>
<i>plain italic</i><span class="fa-solid fa-x"></span></body></html>"#;

    #[test]
    fn test_extract_title_and_icons() {
        assert_eq!(extract_title(PAGE).as_deref(), Some("FreeMobilaChat"));
        assert_eq!(count_icons(PAGE), 2);
        assert_eq!(extract_title("<p>no title</p>"), None);
    }

    #[tokio::test]
    async fn test_smoke_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let report = run_smoke(&server.uri(), DEFAULT_TIMEOUT).await.unwrap();
        assert_eq!(report.status, 200);
        assert_eq!(report.title.as_deref(), Some("FreeMobilaChat"));
        assert_eq!(report.icon_count, 2);
    }

    #[tokio::test]
    async fn test_smoke_bad_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = run_smoke(&server.uri(), DEFAULT_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, SmokeError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_smoke_unreachable_has_hint() {
        // Bind then drop to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let err = run_smoke(&format!("http://127.0.0.1:{}", port), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, SmokeError::Unreachable { .. }));
        assert!(err.to_string().contains("freemobilachat"));
        assert!(err.to_string().contains("8502"));
    }
}
