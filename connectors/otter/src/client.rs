use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::error::{ApiError, AuthError};
use shared::models::{PageCursor, SpeechDetail, SpeechPage};
use shared::source::SpeechSource;
use shared::utils::truncate_at_char_boundary;
use tracing::debug;

use crate::auth::{Credentials, Session, SessionAuthenticator};
use crate::config::{OtterConnectorConfig, CSRF_HEADER_NAME, USER_AGENT};
use crate::models::{SpeechResponse, SpeechesResponse};

/// Speech listing and detail calls against the upstream API.
///
/// Holds no session state: every authenticated call takes the [`Session`]
/// explicitly, so nothing can be issued before login has resolved.
#[derive(Clone)]
pub struct OtterClient {
    client: Client,
    base_url: String,
    page_size: u32,
}

impl OtterClient {
    pub fn new(config: &OtterConnectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(
            client,
            config.api_base_url.clone(),
            config.page_size,
        ))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            page_size,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn authenticator(&self) -> SessionAuthenticator {
        SessionAuthenticator::new(self.client.clone(), self.base_url.clone())
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.authenticator().authenticate(credentials).await
    }

    /// Lists the page after `cursor`.
    ///
    /// A cursor that already reached the end yields an empty, still-ended page
    /// without contacting the upstream.
    pub async fn list_page(
        &self,
        session: &Session,
        cursor: Option<PageCursor>,
    ) -> Result<SpeechPage, ApiError> {
        let cursor = cursor.unwrap_or_default();
        if cursor.end_of_list {
            debug!("Cursor already at end of list, returning empty page");
            return Ok(SpeechPage::exhausted(cursor));
        }

        let mut params = vec![
            ("userid", session.user_id().to_string()),
            ("folder", "0".to_string()),
            ("source", "owned".to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if !cursor.is_start() {
            params.push(("modified_after", cursor.last_modified_at.to_string()));
            params.push(("last_load_ts", cursor.last_load_ts.to_string()));
        }

        let response: SpeechesResponse = self.get_json(session, "speeches", &params).await?;

        let items = response.speeches.iter().map(|s| s.to_summary()).collect::<Vec<_>>();
        let next_cursor = cursor.advance(
            response.last_load_ts.unwrap_or_default(),
            response.last_modified_at.unwrap_or_default(),
            response.end_of_list,
        );

        debug!(
            "Listed {} speeches (end_of_list: {})",
            items.len(),
            next_cursor.end_of_list
        );

        Ok(SpeechPage { items, next_cursor })
    }

    pub async fn fetch_detail(
        &self,
        session: &Session,
        speech_id: &str,
    ) -> Result<SpeechDetail, ApiError> {
        let params = [
            ("speech_id", speech_id.to_string()),
            ("userid", session.user_id().to_string()),
        ];

        let response: SpeechResponse = self.get_json(session, "speech", &params).await?;
        let detail = response.speech.into_detail();

        debug!(
            "Fetched speech {} with {} transcript segments",
            speech_id,
            detail.segments.len()
        );

        Ok(detail)
    }

    async fn get_json<T>(
        &self,
        session: &Session,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(params)
            .header(COOKIE, session.auth_cookie())
            .header(CSRF_HEADER_NAME, session.csrf_token())
            .send()
            .await
            .map_err(|e| ApiError::new(e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::new(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| {
            ApiError::with_status(
                status,
                format!("Failed to parse Otter response from /{}: {}", path, e),
            )
        })
    }
}

/// Builds an [`ApiError`] from a non-2xx response, preferring the message the
/// upstream put in its body.
pub async fn upstream_error(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ApiError::with_status(status.as_u16(), error_message(status, &body))
}

pub fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(String::from))
        })
        .filter(|message| !message.is_empty());

    if let Some(message) = from_json {
        return message;
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return truncate_at_char_boundary(trimmed, 500).to_string();
    }

    format!(
        "Otter API returned HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .trim_end()
    .to_string()
}

/// A logged-in client: the pairing the importer consumes as a [`SpeechSource`].
pub struct OtterSession {
    client: OtterClient,
    session: Session,
}

impl OtterSession {
    pub async fn open(client: OtterClient, credentials: &Credentials) -> Result<Self, AuthError> {
        let session = client.login(credentials).await?;
        Ok(Self { client, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl SpeechSource for OtterSession {
    async fn list_page(&self, cursor: Option<PageCursor>) -> Result<SpeechPage, ApiError> {
        self.client.list_page(&self.session, cursor).await
    }

    async fn fetch_detail(&self, speech_id: &str) -> Result<SpeechDetail, ApiError> {
        self.client.fetch_detail(&self.session, speech_id).await
    }
}
