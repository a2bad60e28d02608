//! Test doubles shared by the in-crate test modules.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::transport::{Transport, WireRequest};

enum Reply {
    Json(Value),
    Fail(String),
}

/// Counts calls, records every request, and answers with a fixed reply.
pub(crate) struct StubTransport {
    reply: Reply,
    calls: AtomicUsize,
    requests: Mutex<Vec<WireRequest>>,
    forms: Mutex<Vec<(String, Vec<(String, String)>, String)>>,
}

impl StubTransport {
    pub(crate) fn replying(body: Value) -> Self {
        Self::with(Reply::Json(body))
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::with(Reply::Fail(message.to_string()))
    }

    fn with(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            forms: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub(crate) fn last_request(&self) -> WireRequest {
        self.requests()
            .pop()
            .expect("at least one request recorded")
    }

    pub(crate) fn forms(&self) -> Vec<(String, Vec<(String, String)>, String)> {
        self.forms.lock().expect("forms lock").clone()
    }

    fn answer(&self) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Json(v) => Ok(v.clone()),
            Reply::Fail(msg) => Err(anyhow!("{}", msg)),
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn post_json(&self, request: WireRequest) -> Result<Value> {
        self.requests.lock().expect("requests lock").push(request);
        self.answer()
    }

    async fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &str,
    ) -> Result<Value> {
        self.forms.lock().expect("forms lock").push((
            url.to_string(),
            headers.to_vec(),
            body.to_string(),
        ));
        self.answer()
    }
}
