use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};

pub const FORWARD_PATH: &str = "/extensions/otter/speeches";

#[derive(Clone)]
struct Canned {
    status: StatusCode,
    content_type: &'static str,
    body: String,
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<JsonValue>>>,
    responses: Arc<Mutex<HashMap<String, Canned>>>,
}

/// Stand-in for the forwarding service: answers each operation with a canned
/// response and records every request body.
pub struct MockForwarding {
    pub url: String,
    state: MockState,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl MockForwarding {
    pub async fn start() -> anyhow::Result<Self> {
        let state = MockState::default();

        let app = Router::new()
            .route(FORWARD_PATH, post(handle_forward))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        sleep(Duration::from_millis(50)).await;

        Ok(Self {
            url: format!("http://127.0.0.1:{}{}", port, FORWARD_PATH),
            state,
            _server_handle: server_handle,
        })
    }

    pub fn respond_json(&self, operation: &str, status: StatusCode, body: JsonValue) {
        self.state.responses.lock().unwrap().insert(
            operation.to_string(),
            Canned {
                status,
                content_type: "application/json",
                body: body.to_string(),
            },
        );
    }

    pub fn respond_text(&self, operation: &str, status: StatusCode, body: &str) {
        self.state.responses.lock().unwrap().insert(
            operation.to_string(),
            Canned {
                status,
                content_type: "text/plain; charset=utf-8",
                body: body.to_string(),
            },
        );
    }

    pub fn requests(&self) -> Vec<JsonValue> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn handle_forward(State(state): State<MockState>, Json(body): Json<JsonValue>) -> Response {
    state.requests.lock().unwrap().push(body.clone());

    let operation = body["operation"].as_str().unwrap_or_default().to_string();
    let canned = state.responses.lock().unwrap().get(&operation).cloned();

    let canned = canned.unwrap_or_else(|| Canned {
        status: StatusCode::BAD_REQUEST,
        content_type: "text/plain; charset=utf-8",
        body: format!("Unsupported operation {}", operation),
    });

    Response::builder()
        .status(canned.status)
        .header(header::CONTENT_TYPE, canned.content_type)
        .body(Body::from(canned.body))
        .unwrap()
}

pub fn page_json(ids: &[&str], last_load: f64, is_end: bool) -> JsonValue {
    json!({
        "speeches": ids
            .iter()
            .map(|id| json!({
                "id": id,
                "title": format!("Meeting {}", id),
                "createdDate": 1_700_000_000,
                "summary": "",
                "link": format!("https://otter.ai/u/ot-{}", id),
            }))
            .collect::<Vec<_>>(),
        "lastLoad": last_load,
        "lastModified": last_load / 10.0,
        "isEnd": is_end,
    })
}
