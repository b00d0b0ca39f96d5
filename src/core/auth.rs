use std::path::{Path, PathBuf};

use crate::core::error::FetchError;

pub const COOKIE_ENV_VAR: &str = "QW_SESSION_COOKIE";

/// Raw `Cookie` header value for an authenticated claude.ai session.
#[derive(Clone)]
pub struct SessionCookie(String);

impl SessionCookie {
    pub fn header_value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCookie(<redacted>)")
    }
}

/// Where to look for the session cookie, in order.
#[derive(Debug, Clone, Default)]
pub struct CookieLookup {
    pub cookie_file: Option<PathBuf>,
}

impl CookieLookup {
    pub fn new(cookie_file: Option<PathBuf>) -> Self {
        Self { cookie_file }
    }

    /// Resolve the session cookie from QW_SESSION_COOKIE, then the cookie file.
    pub fn read(&self) -> Result<SessionCookie, FetchError> {
        if let Ok(value) = std::env::var(COOKIE_ENV_VAR) {
            if let Some(cookie) = normalize(&value) {
                return Ok(cookie);
            }
        }
        match &self.cookie_file {
            Some(path) => read_cookie_file(&expand_home(path)),
            None => Err(FetchError::CredentialsUnavailable(format!(
                "set {} or source.cookie_file",
                COOKIE_ENV_VAR
            ))),
        }
    }
}

fn read_cookie_file(path: &Path) -> Result<SessionCookie, FetchError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        FetchError::CredentialsUnavailable(format!("Failed to read {}: {}", path.display(), e))
    })?;
    normalize(&content).ok_or_else(|| {
        FetchError::CredentialsUnavailable(format!("{} is empty", path.display()))
    })
}

/// Accept either a bare header value or a line starting with `Cookie:`.
fn normalize(raw: &str) -> Option<SessionCookie> {
    let trimmed = raw.trim();
    let value = trimmed
        .strip_prefix("Cookie:")
        .or_else(|| trimmed.strip_prefix("cookie:"))
        .unwrap_or(trimmed)
        .trim();
    if value.is_empty() {
        None
    } else {
        Some(SessionCookie(value.to_string()))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
