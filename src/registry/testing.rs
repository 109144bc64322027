//! Scripted transport for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;

use crate::error::RegistryError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

enum Reply {
    Response(HttpResponse),
    Failure(String),
}

/// Fake helper: answers from per-route queues and records every request
///
/// Replies for a route are served in the order they were registered; the last
/// one is repeated. Unknown routes get a 404 with a `null` body, like the
/// helper's own fallback handler.
#[derive(Default)]
pub(crate) struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn respond(&self, method: Method, path: &str, status: u16, body: &str) {
        self.push(method, path, Reply::Response(HttpResponse::new(status, body)));
    }

    pub(crate) fn fail(&self, method: Method, path: &str, message: &str) {
        self.push(method, path, Reply::Failure(message.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests as "METHOD /path"
    pub(crate) fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, RegistryError> {
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&(request.method.clone(), request.path.clone())) else {
            return Ok(HttpResponse::new(404, "null"));
        };

        let popped = if queue.len() > 1 {
            queue.pop_front()
        } else {
            None
        };
        let reply = popped.as_ref().or(queue.front());
        match reply {
            Some(Reply::Response(response)) => Ok(response.clone()),
            Some(Reply::Failure(message)) => Err(RegistryError::Transport {
                method: request.method.to_string(),
                path: request.path.clone(),
                message: message.clone(),
            }),
            None => Ok(HttpResponse::new(404, "null")),
        }
    }
}
