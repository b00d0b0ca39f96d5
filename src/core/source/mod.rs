pub mod claude_web;

use async_trait::async_trait;

use crate::core::error::FetchError;
use crate::core::models::usage::UsageSnapshot;

pub use claude_web::ClaudeWebSource;

/// Remote usage data, behind a trait so the tracker can be driven by fakes.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Resolve the organization whose usage is tracked.
    async fn resolve_org_id(&self) -> Result<String, FetchError>;

    /// Fetch the current usage for `org_id`.
    async fn fetch_usage(&self, org_id: &str) -> Result<UsageSnapshot, FetchError>;
}

/// Validate that a base URL uses HTTPS.
///
/// The session cookie is attached to every request, so plain HTTP and other
/// schemes are refused before anything is sent.
pub fn validate_endpoint(url: &str) -> anyhow::Result<()> {
    if !url.starts_with("https://") {
        anyhow::bail!("endpoint must use HTTPS, got: {}", url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_endpoint_accepts_https() {
        assert!(validate_endpoint("https://claude.ai").is_ok());
    }

    #[test]
    fn validate_endpoint_rejects_http() {
        let err = validate_endpoint("http://evil.com").unwrap_err();
        assert!(err.to_string().contains("must use HTTPS"));
    }

    #[test]
    fn validate_endpoint_rejects_empty() {
        assert!(validate_endpoint("").is_err());
    }

    #[test]
    fn validate_endpoint_rejects_file_scheme() {
        assert!(validate_endpoint("file:///etc/passwd").is_err());
    }
}
