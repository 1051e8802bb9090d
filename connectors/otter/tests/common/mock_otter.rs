use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use base64::Engine;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};

pub const MOCK_EMAIL: &str = "ada@example.com";
pub const MOCK_PASSWORD: &str = "analytical-engine";
pub const MOCK_USER_ID: i64 = 4242;
pub const INITIAL_CSRF: &str = "csrf-initial";
pub const FRESH_CSRF: &str = "csrf-fresh";
pub const SESSION_COOKIE: &str = "sessionid=session-123";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: HashMap<String, String>,
    pub cookie: Option<String>,
    pub authorization: Option<String>,
    pub csrf_header: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginBehavior {
    Normal,
    NoSessionCookie,
    NoUser,
}

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    pages: Arc<Mutex<Vec<Vec<JsonValue>>>>,
    speeches: Arc<Mutex<HashMap<String, JsonValue>>>,
    login_behavior: Arc<Mutex<LoginBehavior>>,
}

pub struct MockOtter {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    pages: Arc<Mutex<Vec<Vec<JsonValue>>>>,
    speeches: Arc<Mutex<HashMap<String, JsonValue>>>,
    login_behavior: Arc<Mutex<LoginBehavior>>,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl MockOtter {
    pub async fn start() -> anyhow::Result<Self> {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let pages = Arc::new(Mutex::new(Vec::new()));
        let speeches = Arc::new(Mutex::new(HashMap::new()));
        let login_behavior = Arc::new(Mutex::new(LoginBehavior::Normal));

        let state = MockState {
            requests: requests.clone(),
            pages: pages.clone(),
            speeches: speeches.clone(),
            login_behavior: login_behavior.clone(),
        };

        let app = Router::new()
            .route("/login_csrf", get(handle_login_csrf))
            .route("/login", get(handle_login))
            .route("/speeches", get(handle_speeches))
            .route("/speech", get(handle_speech))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        sleep(Duration::from_millis(50)).await;

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests,
            pages,
            speeches,
            login_behavior,
            _server_handle: server_handle,
        })
    }

    /// Each inner vec is one page of raw upstream speech objects.
    pub fn set_pages(&self, pages: Vec<Vec<JsonValue>>) {
        *self.pages.lock().unwrap() = pages;
    }

    pub fn add_speech(&self, speech: JsonValue) {
        let id = speech["speech_id"].as_str().unwrap().to_string();
        self.speeches.lock().unwrap().insert(id, speech);
    }

    pub fn set_login_behavior(&self, behavior: LoginBehavior) {
        *self.login_behavior.lock().unwrap() = behavior;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

pub fn speech_json(id: &str, title: &str, created_at: i64) -> JsonValue {
    json!({
        "speech_id": id,
        "otid": format!("ot-{}", id),
        "title": title,
        "created_at": created_at,
        "summary": format!("summary of {}", title),
    })
}

fn record(state: &MockState, path: &str, query: &HashMap<String, String>, headers: &HeaderMap) {
    let get = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    state.requests.lock().unwrap().push(RecordedRequest {
        path: path.to_string(),
        query: query.clone(),
        cookie: get(header::COOKIE),
        authorization: get(header::AUTHORIZATION),
        csrf_header: headers
            .get("x-csrftoken")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    });
}

fn json_response(status: StatusCode, cookies: &[&str], body: JsonValue) -> Response {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    for cookie in cookies {
        builder = builder.header(header::SET_COOKIE, *cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn is_authenticated(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|cookie| cookie.contains(SESSION_COOKIE))
        .unwrap_or(false)
}

async fn handle_login_csrf(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&state, "/login_csrf", &query, &headers);
    let cookie = format!(
        "csrftoken={}; expires=Tue, 01 Jan 2030 00:00:00 GMT; Path=/",
        INITIAL_CSRF
    );
    json_response(StatusCode::OK, &[cookie.as_str()], json!({"status": "OK"}))
}

async fn handle_login(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&state, "/login", &query, &headers);

    let expected_auth = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", MOCK_EMAIL, MOCK_PASSWORD))
    );
    let auth_ok = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected_auth.as_str());
    let csrf_ok = headers.get("x-csrftoken").and_then(|v| v.to_str().ok()) == Some(INITIAL_CSRF);

    if !auth_ok || !csrf_ok {
        return json_response(
            StatusCode::UNAUTHORIZED,
            &[],
            json!({"status": "error", "message": "Invalid email or password"}),
        );
    }

    let behavior = *state.login_behavior.lock().unwrap();
    let fresh_csrf = format!("csrftoken={}; Path=/", FRESH_CSRF);
    let session = format!("{}; HttpOnly; Path=/", SESSION_COOKIE);
    match behavior {
        LoginBehavior::Normal => json_response(
            StatusCode::OK,
            &[fresh_csrf.as_str(), session.as_str()],
            json!({"status": "OK", "user": {"id": MOCK_USER_ID, "email": MOCK_EMAIL}}),
        ),
        LoginBehavior::NoSessionCookie => json_response(
            StatusCode::OK,
            &[fresh_csrf.as_str()],
            json!({"status": "OK", "user": {"id": MOCK_USER_ID}}),
        ),
        LoginBehavior::NoUser => json_response(
            StatusCode::OK,
            &[fresh_csrf.as_str(), session.as_str()],
            json!({"status": "OK"}),
        ),
    }
}

/// Pages are addressed by the cursor the previous page handed out:
/// page `n` reports `last_load_ts = (n + 1) * 100`.
async fn handle_speeches(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&state, "/speeches", &query, &headers);

    if !is_authenticated(&headers) {
        return json_response(
            StatusCode::UNAUTHORIZED,
            &[],
            json!({"message": "Authentication required"}),
        );
    }

    let index = query
        .get("last_load_ts")
        .and_then(|v| v.parse::<f64>().ok())
        .map(|ts| (ts / 100.0) as usize)
        .unwrap_or(0);

    let pages = state.pages.lock().unwrap().clone();
    let speeches = pages.get(index).cloned().unwrap_or_default();
    let end_of_list = index + 1 >= pages.len();

    json_response(
        StatusCode::OK,
        &[],
        json!({
            "status": "OK",
            "speeches": speeches,
            "last_load_ts": ((index + 1) * 100) as f64,
            "last_modified_at": ((index + 1) * 10) as f64,
            "end_of_list": end_of_list,
        }),
    )
}

async fn handle_speech(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&state, "/speech", &query, &headers);

    if !is_authenticated(&headers) {
        return json_response(
            StatusCode::UNAUTHORIZED,
            &[],
            json!({"message": "Authentication required"}),
        );
    }

    let id = query.get("speech_id").cloned().unwrap_or_default();
    let speech = state.speeches.lock().unwrap().get(&id).cloned();
    match speech {
        Some(speech) => json_response(StatusCode::OK, &[], json!({"speech": speech})),
        None => json_response(
            StatusCode::NOT_FOUND,
            &[],
            json!({"status": "error", "message": format!("Speech {} not found", id)}),
        ),
    }
}
