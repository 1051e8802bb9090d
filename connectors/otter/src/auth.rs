use base64::Engine;
use reqwest::header::{HeaderMap, AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::{Client, Response};
use shared::error::AuthError;
use shared::utils::truncate_at_char_boundary;
use std::fmt;
use tracing::{debug, info};

use crate::config::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME};
use crate::models::LoginResponse;

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }

    pub fn basic_auth_header(&self) -> String {
        let auth_string = format!("{}:{}", self.email, self.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(auth_string.as_bytes());
        format!("Basic {}", encoded)
    }
}

/// An authenticated Otter session.
///
/// Only [`SessionAuthenticator::authenticate`] builds one, and only once every
/// field is known, so holding a `Session` means login has fully completed.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    auth_cookie: String,
    csrf_token: String,
    user_id: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("auth_cookie", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .finish()
    }
}

impl Session {
    /// Value for the `Cookie` header of every authenticated request.
    pub fn auth_cookie(&self) -> &str {
        &self.auth_cookie
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Returns the leading `name=value` pair of every `Set-Cookie` header, in order.
pub fn response_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect()
}

pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

pub struct SessionAuthenticator {
    client: Client,
    base_url: String,
}

impl SessionAuthenticator {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Runs the CSRF + basic-auth login handshake.
    ///
    /// Fails fast with [`AuthError::MissingCredentials`] before touching the
    /// network when either credential is empty.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        if !credentials.is_complete() {
            return Err(AuthError::MissingCredentials);
        }

        let csrf_token = self.fetch_csrf_token().await?;

        let url = format!("{}/login", self.base_url);
        debug!("Logging in to Otter at {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("username", credentials.email.as_str())])
            .header(AUTHORIZATION, credentials.basic_auth_header())
            .header(CSRF_HEADER_NAME, &csrf_token)
            .header(COOKIE, format!("{}={}", CSRF_COOKIE_NAME, csrf_token))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let response = ensure_success(response).await?;

        let cookies = response_cookies(response.headers());
        if !cookies.iter().any(|(name, _)| name != CSRF_COOKIE_NAME) {
            return Err(AuthError::MissingSessionCookie);
        }

        let auth_cookie = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");

        let csrf_token = cookies
            .iter()
            .find(|(name, _)| name == CSRF_COOKIE_NAME)
            .map(|(_, value)| value.clone())
            .unwrap_or(csrf_token);

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let user_id = serde_json::from_str::<LoginResponse>(&body)
            .ok()
            .and_then(|login| login.user)
            .and_then(|user| user.id)
            .map(|id| id.to_string())
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingUserId)?;

        info!("Successfully logged in to Otter.ai as user {}", user_id);

        Ok(Session {
            auth_cookie,
            csrf_token,
            user_id,
        })
    }

    async fn fetch_csrf_token(&self) -> Result<String, AuthError> {
        let url = format!("{}/login_csrf", self.base_url);
        debug!("Requesting CSRF token from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let response = ensure_success(response).await?;

        response_cookies(response.headers())
            .into_iter()
            .find(|(name, value)| name == CSRF_COOKIE_NAME && !value.is_empty())
            .map(|(_, value)| value)
            .ok_or_else(|| AuthError::MissingCsrfCookie(CSRF_COOKIE_NAME.to_string()))
    }
}

async fn ensure_success(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        truncate_at_char_boundary(body.trim(), 500).to_string()
    };

    Err(AuthError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_set_cookie_takes_leading_pair() {
        assert_eq!(
            parse_set_cookie("csrftoken=abc123; expires=Tue, 01 Jan 2030 00:00:00 GMT; Path=/"),
            Some(("csrftoken".to_string(), "abc123".to_string()))
        );
        assert_eq!(
            parse_set_cookie("sessionid=s%3Dx; HttpOnly"),
            Some(("sessionid".to_string(), "s%3Dx".to_string()))
        );
        assert_eq!(parse_set_cookie("garbage"), None);
        assert_eq!(parse_set_cookie("=value"), None);
    }

    #[test]
    fn test_response_cookies_keeps_header_order() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("csrftoken=new; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("sessionid=xyz; HttpOnly"));

        let cookies = response_cookies(&headers);
        assert_eq!(
            cookies,
            vec![
                ("csrftoken".to_string(), "new".to_string()),
                ("sessionid".to_string(), "xyz".to_string())
            ]
        );
    }

    #[test]
    fn test_basic_auth_header() {
        let creds = Credentials::new("user@example.com", "hunter2");
        assert_eq!(
            creds.basic_auth_header(),
            "Basic dXNlckBleGFtcGxlLmNvbTpodW50ZXIy"
        );
    }

    #[test]
    fn test_credentials_completeness() {
        assert!(Credentials::new("a@b.c", "x").is_complete());
        assert!(!Credentials::new("", "x").is_complete());
        assert!(!Credentials::new("x", "").is_complete());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let printed = format!("{:?}", Credentials::new("a@b.c", "hunter2"));
        assert!(!printed.contains("hunter2"));
    }
}
