use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::error::ApiError;
use shared::models::{
    ForwardRequest, Operation, PageCursor, SealedPassword, SpeechDetail, SpeechPage,
};
use shared::source::SpeechSource;
use shared::utils::truncate_at_char_boundary;
use std::time::Duration;
use tracing::debug;

use crate::credentials::{ImportCredentials, Password};

/// HTTP client for the forwarding service's speeches endpoint.
#[derive(Clone)]
pub struct ForwardingClient {
    client: Client,
    endpoint: String,
}

impl ForwardingClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn get_speeches(
        &self,
        credentials: &ImportCredentials,
        cursor: Option<PageCursor>,
    ) -> Result<SpeechPage, ApiError> {
        let params = match cursor {
            Some(cursor) => serde_json::to_value(cursor).map_err(|e| ApiError::new(e.to_string()))?,
            None => Value::Null,
        };
        self.call(request(credentials, Operation::GetSpeeches, params))
            .await
    }

    pub async fn get_speech(
        &self,
        credentials: &ImportCredentials,
        speech_id: &str,
    ) -> Result<SpeechDetail, ApiError> {
        self.call(request(
            credentials,
            Operation::GetSpeech,
            json!({ "id": speech_id }),
        ))
        .await
    }

    pub async fn encrypt_password(&self, email: &str, password: &str) -> Result<SealedPassword, ApiError> {
        let request = ForwardRequest {
            email: email.to_string(),
            password: Some(password.to_string()),
            operation: Operation::EncryptPassword.to_string(),
            ..Default::default()
        };
        self.call(request).await
    }

    async fn call<T>(&self, request: ForwardRequest) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        debug!("POST {} ({})", self.endpoint, request.operation);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::new(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::new(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::with_status(
                status.as_u16(),
                forwarding_error_message(status, &body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError::with_status(
                status.as_u16(),
                format!("Unexpected {} response: {}", request.operation, e),
            )
        })
    }
}

fn request(credentials: &ImportCredentials, operation: Operation, params: Value) -> ForwardRequest {
    let (password, sealed_password) = match &credentials.password {
        Password::Plain(p) => (Some(p.clone()), None),
        Password::Sealed(s) => (None, Some(s.clone())),
    };
    ForwardRequest {
        email: credentials.email.clone(),
        password,
        sealed_password,
        operation: operation.to_string(),
        params,
    }
}

/// 500s carry `{"error": ...}`; 400s are plain text.
fn forwarding_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .filter(|m| !m.is_empty());
    if let Some(message) = from_json {
        return message;
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return truncate_at_char_boundary(trimmed, 500).to_string();
    }

    format!("Forwarding service returned HTTP {}", status.as_u16())
}

/// A [`ForwardingClient`] bound to one set of credentials.
pub struct ForwardingSource {
    client: ForwardingClient,
    credentials: ImportCredentials,
}

impl ForwardingSource {
    pub fn new(client: ForwardingClient, credentials: ImportCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait]
impl SpeechSource for ForwardingSource {
    async fn list_page(&self, cursor: Option<PageCursor>) -> Result<SpeechPage, ApiError> {
        if let Some(cursor) = cursor.filter(|c| c.end_of_list) {
            return Ok(SpeechPage::exhausted(cursor));
        }
        self.client.get_speeches(&self.credentials, cursor).await
    }

    async fn fetch_detail(&self, speech_id: &str) -> Result<SpeechDetail, ApiError> {
        self.client.get_speech(&self.credentials, speech_id).await
    }
}
