//! libcurl-backed session reading a Netscape cookie file.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::provider::{RawDocument, SessionError, SessionProvider};
use crate::config::{default_cookie_file, BatchConfig};
use crate::retry::{classify_curl_error, classify_http_status, FetchError};

/// Session that replays the cookies captured by the external login flow.
///
/// Each fetch builds a fresh `Easy` handle, so cookies rewritten by a new login
/// are picked up without restarting. Landing on a URL containing one of the
/// login markers after redirects means the session has expired.
#[derive(Debug, Clone)]
pub struct CurlSession {
    cookie_file: Option<PathBuf>,
    login_markers: Vec<String>,
    user_agent: String,
    connect_timeout: Duration,
    fetch_timeout: Duration,
}

impl CurlSession {
    pub fn from_config(cfg: &BatchConfig) -> Self {
        let session = cfg.session_or_default();
        let cookie_file = session.cookie_file.or_else(|| default_cookie_file().ok());
        Self {
            cookie_file,
            login_markers: session.login_markers,
            user_agent: session.user_agent,
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            fetch_timeout: Duration::from_secs(cfg.fetch_timeout_secs),
        }
    }

    /// Session without cookies (public documents only).
    pub fn anonymous(cfg: &BatchConfig) -> Self {
        Self {
            cookie_file: None,
            ..Self::from_config(cfg)
        }
    }

    fn is_login_page(&self, final_url: &str) -> bool {
        self.login_markers
            .iter()
            .any(|m| !m.is_empty() && final_url.contains(m.as_str()))
    }

    /// Blocking GET; call from `spawn_blocking`.
    fn get_blocking(&self, url: &str) -> Result<RawDocument, FetchError> {
        let mut body = Vec::new();
        let mut easy = curl::easy::Easy::new();
        let curl_err = |e: curl::Error| classify_curl_error(&e);

        easy.url(url).map_err(curl_err)?;
        easy.follow_location(true).map_err(curl_err)?;
        easy.max_redirections(10).map_err(curl_err)?;
        easy.useragent(&self.user_agent).map_err(curl_err)?;
        easy.connect_timeout(self.connect_timeout).map_err(curl_err)?;
        easy.timeout(self.fetch_timeout).map_err(curl_err)?;
        if let Some(path) = self.cookie_file.as_ref().filter(|p| p.exists()) {
            easy.cookie_file(path).map_err(curl_err)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(curl_err)?;
            transfer.perform().map_err(curl_err)?;
        }

        let code = easy.response_code().map_err(curl_err)?;
        let final_url = easy
            .effective_url()
            .map_err(curl_err)?
            .unwrap_or(url)
            .to_string();
        let content_type = easy.content_type().map_err(curl_err)?.map(str::to_string);

        if self.is_login_page(&final_url) {
            return Err(FetchError::SessionExpired);
        }
        if !(200..300).contains(&code) {
            return Err(classify_http_status(code));
        }
        Ok(RawDocument {
            bytes: body,
            content_type,
            final_url,
        })
    }
}

#[async_trait]
impl SessionProvider for CurlSession {
    async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
        let this = self.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || this.get_blocking(&url))
            .await
            .map_err(|e| FetchError::Connection(format!("fetch task failed: {}", e)))?
    }

    /// The login flow owns credentials; refreshing means re-reading the cookie
    /// file it maintains and confirming it still holds cookies.
    async fn refresh(&self) -> Result<(), SessionError> {
        let Some(path) = self.cookie_file.clone() else {
            return Err(SessionError::NoCredentials);
        };
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SessionError::CookieStore {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let has_cookie = contents
            .lines()
            .map(str::trim)
            .any(|l| !l.is_empty() && (!l.starts_with('#') || l.starts_with("#HttpOnly_")));
        if has_cookie {
            Ok(())
        } else {
            Err(SessionError::CookieStore {
                path: path.display().to_string(),
                reason: "no cookies".to_string(),
            })
        }
    }
}
