//! Shared test utilities: a scripted core double and helpers.

#![allow(dead_code, unused_imports)]

pub mod mock_backend;

use effect_shell::codec;
use effect_shell::protocol::{Effect, Request, RequestId};
use effect_shell::CoreGateway;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

/// View model used by the scripted core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestView {
    pub text: String,
    pub renders: u32,
}

impl TestView {
    pub fn new(text: &str, renders: u32) -> Self {
        Self {
            text: text.to_string(),
            renders,
        }
    }
}

/// A call the shell made into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCall {
    View,
    Event(Vec<u8>),
    Response { id: RequestId, bytes: Vec<u8> },
}

#[derive(Default)]
struct Script {
    view: Mutex<Vec<u8>>,
    event_batches: Mutex<VecDeque<Vec<Request>>>,
    response_batches: Mutex<HashMap<RequestId, VecDeque<Vec<u8>>>>,
    calls: Mutex<Vec<CoreCall>>,
    responded: Notify,
}

/// Core double that returns pre-scripted request batches and records every
/// call the shell makes.
#[derive(Clone)]
pub struct ScriptedCore {
    script: Arc<Script>,
}

impl ScriptedCore {
    pub fn new(view: &TestView) -> Self {
        let core = Self {
            script: Arc::new(Script::default()),
        };
        core.set_view(view);
        core
    }

    pub fn set_view(&self, view: &TestView) {
        *self.script.view.lock() = codec::encode(view).expect("encode view");
    }

    /// Raw bytes returned from `view()`.
    pub fn set_view_raw(&self, bytes: Vec<u8>) {
        *self.script.view.lock() = bytes;
    }

    /// Batch returned by the next `process_event` call.
    pub fn on_event(&self, batch: Vec<Request>) {
        self.script.event_batches.lock().push_back(batch);
    }

    /// Batch returned by the next `handle_response` call for `id`.
    pub fn on_response(&self, id: u32, batch: Vec<Request>) {
        let bytes = codec::encode(&batch).expect("encode batch");
        self.on_response_raw(id, bytes);
    }

    pub fn on_response_raw(&self, id: u32, bytes: Vec<u8>) {
        self.script
            .response_batches
            .lock()
            .entry(RequestId(id))
            .or_default()
            .push_back(bytes);
    }

    pub fn calls(&self) -> Vec<CoreCall> {
        self.script.calls.lock().clone()
    }

    pub fn view_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, CoreCall::View))
            .count()
    }

    /// Ids of every submitted response, in submission order.
    pub fn response_ids(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CoreCall::Response { id, .. } => Some(id.0),
                _ => None,
            })
            .collect()
    }

    /// Decoded responses submitted under `id`.
    pub fn responses_for<T: DeserializeOwned>(&self, id: u32) -> Vec<T> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CoreCall::Response { id: got, bytes } if got.0 == id => {
                    Some(codec::decode(&bytes).expect("decode response"))
                }
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` responses were submitted.
    pub async fn wait_for_responses(&self, count: usize) {
        let wait = async {
            loop {
                let notified = self.script.responded.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.response_ids().len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(10), wait)
            .await
            .expect("timed out waiting for responses");
    }
}

impl CoreGateway for ScriptedCore {
    fn view(&self) -> Vec<u8> {
        self.script.calls.lock().push(CoreCall::View);
        self.script.view.lock().clone()
    }

    fn process_event(&self, event: &[u8]) -> Vec<u8> {
        self.script.calls.lock().push(CoreCall::Event(event.to_vec()));
        let batch = self
            .script
            .event_batches
            .lock()
            .pop_front()
            .unwrap_or_default();
        codec::encode(&batch).expect("encode batch")
    }

    fn handle_response(&self, id: RequestId, response: &[u8]) -> Vec<u8> {
        self.script.calls.lock().push(CoreCall::Response {
            id,
            bytes: response.to_vec(),
        });
        let scripted = self
            .script
            .response_batches
            .lock()
            .get_mut(&id)
            .and_then(|batches| batches.pop_front());
        self.script.responded.notify_waiters();
        scripted.unwrap_or_else(|| codec::encode(&Vec::<Request>::new()).expect("encode batch"))
    }
}

pub fn request(id: u32, effect: Effect) -> Request {
    Request {
        id: RequestId(id),
        effect,
    }
}

/// Find an available port for testing.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to free port");
    listener.local_addr().unwrap().port()
}

/// Write `contents` to a temporary config file.
pub fn temp_config(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, contents).expect("Failed to write config");
    (temp_dir, config_path)
}
