use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        HeaderValue, StatusCode,
    },
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use shared::error::ApiError;
use shared::models::{
    ForwardRequest, Operation, PageCursor, SealedPassword, SpeechDetail, SpeechPage, SpeechParams,
};
use shared::telemetry;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};

use crate::auth::{Credentials, Session};
use crate::client::OtterClient;
use crate::config::{OtterConnectorConfig, FORWARD_PATH};
use crate::crypto::PasswordSealer;

#[derive(Clone)]
pub struct ApiState {
    pub client: OtterClient,
    pub sealer: Option<Arc<PasswordSealer>>,
    pub allowed_origin: HeaderValue,
}

impl ApiState {
    pub fn from_config(config: &OtterConnectorConfig) -> Result<Self> {
        let client = OtterClient::new(config)?;

        let sealer = match &config.encryption_key {
            Some(key) => Some(Arc::new(
                PasswordSealer::from_base64_key(key).context("OTTER_ENCRYPTION_KEY is unusable")?,
            )),
            None => None,
        };

        let allowed_origin = HeaderValue::from_str(&config.allowed_origin)
            .context("ALLOWED_ORIGIN is not a valid header value")?;

        Ok(Self {
            client,
            sealer,
            allowed_origin,
        })
    }
}

enum ForwardError {
    BadRequest(String),
    Upstream(ApiError),
}

impl From<ApiError> for ForwardError {
    fn from(err: ApiError) -> Self {
        ForwardError::Upstream(err)
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        match self {
            ForwardError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ForwardError::Upstream(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.message })),
            )
                .into_response(),
        }
    }
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(FORWARD_PATH, post(forward).options(preflight))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(telemetry::middleware::trace_layer))
                .layer(SetResponseHeaderLayer::overriding(
                    ACCESS_CONTROL_ALLOW_ORIGIN,
                    state.allowed_origin.clone(),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static("POST"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static("content-type"),
                )),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "otter-connector"
    }))
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn forward(
    State(state): State<ApiState>,
    payload: Result<Json<ForwardRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ForwardError::BadRequest(rejection.body_text()).into_response();
        }
    };

    let operation = match request.operation.parse::<Operation>() {
        Ok(operation) => operation,
        Err(unknown) => {
            return ForwardError::BadRequest(format!("Unsupported operation {}", unknown))
                .into_response();
        }
    };

    info!("Forwarding {}", operation);

    let result = match operation {
        Operation::GetSpeeches => get_speeches(&state, &request)
            .await
            .map(|page| Json(page).into_response()),
        Operation::GetSpeech => get_speech(&state, &request)
            .await
            .map(|detail| Json(detail).into_response()),
        Operation::EncryptPassword => encrypt_password(&state, &request)
            .map(|sealed| Json(sealed).into_response()),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            if let ForwardError::Upstream(api_error) = &err {
                error!("{} failed: {}", operation, api_error);
            }
            err.into_response()
        }
    }
}

async fn get_speeches(state: &ApiState, request: &ForwardRequest) -> Result<SpeechPage, ForwardError> {
    let cursor = if request.params.is_null() {
        None
    } else {
        Some(
            serde_json::from_value::<PageCursor>(request.params.clone())
                .map_err(|e| ForwardError::BadRequest(format!("Invalid params: {}", e)))?,
        )
    };

    if let Some(cursor) = cursor.filter(|c| c.end_of_list) {
        return Ok(SpeechPage::exhausted(cursor));
    }

    let session = open_session(state, request).await?;
    Ok(state.client.list_page(&session, cursor).await?)
}

async fn get_speech(state: &ApiState, request: &ForwardRequest) -> Result<SpeechDetail, ForwardError> {
    let params = serde_json::from_value::<SpeechParams>(request.params.clone())
        .map_err(|e| ForwardError::BadRequest(format!("Invalid params: {}", e)))?;
    if params.id.trim().is_empty() {
        return Err(ForwardError::BadRequest("Missing speech id".to_string()));
    }

    let session = open_session(state, request).await?;
    Ok(state.client.fetch_detail(&session, &params.id).await?)
}

fn encrypt_password(
    state: &ApiState,
    request: &ForwardRequest,
) -> Result<SealedPassword, ForwardError> {
    let sealer = state
        .sealer
        .as_ref()
        .ok_or_else(|| ApiError::new("Password encryption is not configured"))?;

    let password = request
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ForwardError::BadRequest("Missing password".to_string()))?;

    sealer
        .seal(password)
        .map_err(|e| ForwardError::Upstream(ApiError::new(e.to_string())))
}

async fn open_session(state: &ApiState, request: &ForwardRequest) -> Result<Session, ForwardError> {
    let password = match (&request.sealed_password, &request.password) {
        (Some(sealed), _) => {
            let sealer = state
                .sealer
                .as_ref()
                .ok_or_else(|| ApiError::new("Password encryption is not configured"))?;
            sealer
                .open(sealed)
                .map_err(|e| ApiError::new(format!("Could not unseal password: {}", e)))?
        }
        (None, Some(password)) => password.clone(),
        (None, None) => String::new(),
    };

    let credentials = Credentials::new(request.email.clone(), password);
    state
        .client
        .login(&credentials)
        .await
        .map_err(|e| ForwardError::Upstream(e.into()))
}
