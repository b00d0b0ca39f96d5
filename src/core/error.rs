use thiserror::Error;

const DETAIL_MAX_CHARS: usize = 40;

/// Reasons a usage fetch can fail. Each one ends the current attempt; the
/// next poll tick is the retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("No claude.ai session cookie available: {0}")]
    CredentialsUnavailable(String),
    #[error("claude.ai rejected the session cookie")]
    AuthExpired,
    #[error("Transient fetch failure: {0}")]
    Transient(String),
    #[error("Malformed usage response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Short line suitable for the status display.
    pub fn status_message(&self) -> String {
        match self {
            Self::CredentialsUnavailable(_) => "No claude.ai session found".to_string(),
            Self::AuthExpired => "Session expired, sign in to claude.ai again".to_string(),
            Self::Transient(detail) => format!("Fetch failed: {}", truncate(detail)),
            Self::MalformedResponse(_) => "Unexpected response from claude.ai".to_string(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transient("request timed out".to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Transient(format!("HTTP {}", status.as_u16()))
        } else {
            Self::Transient(err.to_string())
        }
    }
}

fn truncate(detail: &str) -> String {
    if detail.chars().count() <= DETAIL_MAX_CHARS {
        return detail.to_string();
    }
    let cut: String = detail.chars().take(DETAIL_MAX_CHARS).collect();
    format!("{}…", cut)
}
