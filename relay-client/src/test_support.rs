//! In-process fake orchestrator for request-level tests

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::TENANT_HEADER;

pub use axum::http::StatusCode as ReplyStatus;

/// A request as the fake orchestrator saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub tenant: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

/// Canned response
pub struct Reply {
    status: StatusCode,
    body: String,
    delay: Option<Duration>,
}

impl Reply {
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Picks a reply given the request and how many earlier requests hit the
/// same method and path
type Responder = dyn Fn(&RecordedRequest, usize) -> Reply + Send + Sync;

struct FakeState {
    requests: Mutex<Vec<RecordedRequest>>,
    responder: Box<Responder>,
}

pub struct FakeOrchestrator {
    pub url: String,
    state: Arc<FakeState>,
}

impl FakeOrchestrator {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest, usize) -> Reply + Send + Sync + 'static,
    {
        let state = Arc::new(FakeState {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        });

        let app = Router::new()
            .fallback(record)
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn record(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let request = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        tenant: header_text(TENANT_HEADER),
        content_type: header_text(header::CONTENT_TYPE.as_str()),
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let reply = {
        let mut requests = state.requests.lock().unwrap();
        let seen = requests
            .iter()
            .filter(|r| r.method == request.method && r.path == request.path)
            .count();
        let reply = (state.responder)(&request, seen);
        requests.push(request);
        reply
    };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    (reply.status, reply.body).into_response()
}

/// A local URL nothing is listening on
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
