//! Shared test support and integration-style tests


use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::upstream::{CallOutcome, Upstream, UpstreamCall};

/// In-memory upstream answering from a per-endpoint script.
///
/// Unscripted endpoints answer `ConnectionRefused`. Every call is recorded.
#[derive(Clone, Default)]
pub struct ScriptedUpstream {
    script: HashMap<String, (Duration, CallOutcome)>,
    calls: Arc<Mutex<Vec<UpstreamCall>>>,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(payload: Value) -> CallOutcome {
        CallOutcome::Success { status: 200, payload }
    }

    pub fn with(self, endpoint: &str, outcome: CallOutcome) -> Self {
        self.with_delay(endpoint, Duration::ZERO, outcome)
    }

    pub fn with_delay(mut self, endpoint: &str, delay: Duration, outcome: CallOutcome) -> Self {
        self.script.insert(endpoint.to_string(), (delay, outcome));
        self
    }

    pub fn calls(&self) -> Vec<UpstreamCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn call(&self, call: &UpstreamCall) -> CallOutcome {
        self.calls.lock().unwrap().push(call.clone());

        match self.script.get(&call.endpoint) {
            Some((delay, outcome)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                outcome.clone()
            }
            None => CallOutcome::ConnectionRefused {
                message: format!("nothing scripted for {}", call.endpoint),
            },
        }
    }
}

/// One-shot raw TCP server: reads the request head, writes `reply` verbatim
/// and closes the socket. Returns its base URL.
pub async fn raw_responder(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(reply).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}", addr)
}
