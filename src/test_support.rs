use crate::api::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub(crate) enum Scripted {
    Respond(u16, String),
    Fail(String),
    Panic,
    /// Waits for the notify before producing the inner response.
    Gated(Arc<Notify>, Box<Scripted>),
}

impl Clone for Scripted {
    fn clone(&self) -> Self {
        match self {
            Self::Respond(status, body) => Self::Respond(*status, body.clone()),
            Self::Fail(message) => Self::Fail(message.clone()),
            Self::Panic => Self::Panic,
            Self::Gated(gate, inner) => Self::Gated(gate.clone(), inner.clone()),
        }
    }
}

pub(crate) fn ok(data: Value) -> Scripted {
    Scripted::Respond(200, json!({ "success": true, "data": data }).to_string())
}

pub(crate) fn rejected(status: u16, error: &str) -> Scripted {
    Scripted::Respond(status, json!({ "success": false, "error": error }).to_string())
}

/// In-process backend fake. Each route pops queued responses in order; the
/// last one stays in place for any further calls.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(&self, method: HttpMethod, path: &str, response: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, method: HttpMethod, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn next(&self, method: HttpMethod, path: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let scripted = self.next(request.method, &request.path);
        self.requests.lock().unwrap().push(request);

        let mut scripted = match scripted {
            Some(s) => s,
            None => {
                return Ok(HttpResponse {
                    status: 404,
                    body: String::new(),
                })
            }
        };
        loop {
            match scripted {
                Scripted::Respond(status, body) => return Ok(HttpResponse { status, body }),
                Scripted::Fail(message) => return Err(TransportError { message }),
                Scripted::Panic => panic!("scripted transport panic"),
                Scripted::Gated(gate, inner) => {
                    gate.notified().await;
                    scripted = *inner;
                }
            }
        }
    }
}
