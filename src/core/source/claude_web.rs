use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, COOKIE, ORIGIN, REFERER, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::core::auth::CookieLookup;
use crate::core::config::AppConfig;
use crate::core::error::FetchError;
use crate::core::models::usage::UsageSnapshot;
use crate::core::source::{validate_endpoint, UsageSource};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

#[derive(Deserialize)]
struct OrganizationRaw {
    uuid: String,
}

#[derive(Deserialize)]
struct WindowRaw {
    #[serde(default)]
    utilization: Option<f64>,
    #[serde(default)]
    resets_at: Option<String>,
}

#[derive(Deserialize)]
struct UsageResponse {
    #[serde(default)]
    five_hour: Option<WindowRaw>,
    #[serde(default)]
    seven_day: Option<WindowRaw>,
}

/// Reads usage from the claude.ai web API with a browser session cookie.
pub struct ClaudeWebSource {
    client: reqwest::Client,
    base_url: String,
    cookies: CookieLookup,
}

impl ClaudeWebSource {
    pub fn new(
        base_url: impl Into<String>,
        cookies: CookieLookup,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookies,
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        validate_endpoint(&config.source.base_url)?;
        Self::new(
            config.source.base_url.clone(),
            CookieLookup::new(config.source.cookie_file.clone()),
            config.poll.timeout(),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let cookie = self.cookies.read()?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .header(COOKIE, cookie.header_value())
            .header(ACCEPT, "application/json")
            .header(ORIGIN, &self.base_url)
            .header(REFERER, format!("{}/settings/usage", self.base_url))
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::AuthExpired);
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!("HTTP {}", status.as_u16())));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl UsageSource for ClaudeWebSource {
    async fn resolve_org_id(&self) -> Result<String, FetchError> {
        let orgs: Vec<OrganizationRaw> = self.get_json("/api/organizations").await?;
        orgs.into_iter()
            .next()
            .map(|org| org.uuid)
            .ok_or_else(|| FetchError::MalformedResponse("no organization in account".into()))
    }

    async fn fetch_usage(&self, org_id: &str) -> Result<UsageSnapshot, FetchError> {
        let data: UsageResponse = self
            .get_json(&format!("/api/organizations/{}/usage", org_id))
            .await?;
        Ok(parse_usage(data))
    }
}

fn parse_usage(data: UsageResponse) -> UsageSnapshot {
    let (session_percent, session_reset_at) = parse_window(data.five_hour);
    let (weekly_percent, weekly_reset_at) = parse_window(data.seven_day);
    UsageSnapshot {
        session_percent,
        session_reset_at,
        weekly_percent,
        weekly_reset_at,
    }
}

// `utilization` is already a percentage on this endpoint.
fn parse_window(raw: Option<WindowRaw>) -> (f64, Option<DateTime<Utc>>) {
    let Some(raw) = raw else {
        return (0.0, None);
    };
    let percent = raw
        .utilization
        .filter(|u| u.is_finite())
        .map(|u| u.clamp(0.0, 100.0))
        .unwrap_or(0.0);
    let resets_at = raw
        .resets_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    (percent, resets_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer, dir: &tempfile::TempDir) -> ClaudeWebSource {
        let cookie_path = dir.path().join("cookie");
        std::fs::write(&cookie_path, "sessionKey=test-session").unwrap();
        ClaudeWebSource::new(
            server.uri(),
            CookieLookup::new(Some(cookie_path)),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn parse_window_reads_percent_and_reset() {
        let (percent, reset) = parse_window(Some(WindowRaw {
            utilization: Some(42.0),
            resets_at: Some("2024-01-01T10:00:00.123456+00:00".to_string()),
        }));
        assert_eq!(percent, 42.0);
        assert_eq!(
            reset.map(|r| r.timestamp()),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap().timestamp())
        );
    }

    #[test]
    fn parse_window_defaults_missing_fields() {
        assert_eq!(parse_window(None), (0.0, None));
        let (percent, reset) = parse_window(Some(WindowRaw {
            utilization: None,
            resets_at: Some("not-a-date".to_string()),
        }));
        assert_eq!(percent, 0.0);
        assert!(reset.is_none());
    }

    #[test]
    fn parse_window_clamps_out_of_range() {
        let (percent, _) = parse_window(Some(WindowRaw {
            utilization: Some(130.0),
            resets_at: None,
        }));
        assert_eq!(percent, 100.0);
        let (percent, _) = parse_window(Some(WindowRaw {
            utilization: Some(-3.0),
            resets_at: None,
        }));
        assert_eq!(percent, 0.0);
    }

    #[test]
    fn deserialize_usage_with_null_windows() {
        let json = r#"{ "five_hour": null, "seven_day": { "utilization": 59, "resets_at": null }, "seven_day_opus": null }"#;
        let data: UsageResponse = serde_json::from_str(json).unwrap();
        let snapshot = parse_usage(data);
        assert_eq!(snapshot.session_percent, 0.0);
        assert_eq!(snapshot.weekly_percent, 59.0);
        assert!(snapshot.weekly_reset_at.is_none());
    }

    #[tokio::test]
    async fn resolve_org_id_takes_first_organization() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/organizations"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"uuid": "org-1", "name": "Personal"}, {"uuid": "org-2"}]"#,
            ))
            .mount(&server)
            .await;

        let source = source_for(&server, &dir);
        assert_eq!(source.resolve_org_id().await.unwrap(), "org-1");
    }

    #[tokio::test]
    async fn resolve_org_id_empty_list_is_malformed() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/organizations"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let source = source_for(&server, &dir);
        let err = source.resolve_org_id().await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn fetch_usage_parses_both_windows() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/organizations/org-1/usage"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{
                    "five_hour": { "utilization": 28.0, "resets_at": "2024-01-01T10:00:00Z" },
                    "seven_day": { "utilization": 61.5, "resets_at": "2024-01-05T17:00:00Z" }
                }"#,
            ))
            .mount(&server)
            .await;

        let source = source_for(&server, &dir);
        let snapshot = source.fetch_usage("org-1").await.unwrap();
        assert_eq!(snapshot.session_percent, 28.0);
        assert_eq!(snapshot.weekly_percent, 61.5);
        assert_eq!(
            snapshot.session_reset_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            snapshot.weekly_reset_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 17, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn forbidden_maps_to_auth_expired() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/organizations/org-1/usage"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let source = source_for(&server, &dir);
        assert_eq!(
            source.fetch_usage("org-1").await.unwrap_err(),
            FetchError::AuthExpired
        );
    }

    #[tokio::test]
    async fn server_error_maps_to_transient() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/organizations/org-1/usage"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let source = source_for(&server, &dir);
        assert_eq!(
            source.fetch_usage("org-1").await.unwrap_err(),
            FetchError::Transient("HTTP 502".to_string())
        );
    }

    #[tokio::test]
    async fn html_body_maps_to_malformed() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/organizations/org-1/usage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let source = source_for(&server, &dir);
        let err = source.fetch_usage("org-1").await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn slow_response_times_out_as_transient() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/organizations/org-1/usage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let source = source_for(&server, &dir);
        let err = source.fetch_usage("org-1").await.unwrap_err();
        assert!(matches!(err, FetchError::Transient(_)));
    }

    #[tokio::test]
    async fn missing_cookie_fails_before_request() {
        let server = MockServer::start().await;
        let source = ClaudeWebSource::new(
            server.uri(),
            CookieLookup::new(Some("/nonexistent/quotawatch/cookie".into())),
            Duration::from_secs(2),
        )
        .unwrap();
        if std::env::var(crate::core::auth::COOKIE_ENV_VAR).is_ok() {
            return;
        }
        let err = source.resolve_org_id().await.unwrap_err();
        assert!(matches!(err, FetchError::CredentialsUnavailable(_)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[test]
    fn from_config_rejects_http_base_url() {
        let mut config = AppConfig::default();
        config.source.base_url = "http://claude.ai".to_string();
        assert!(ClaudeWebSource::from_config(&config).is_err());
    }
}
