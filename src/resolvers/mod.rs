//! Capability resolvers: one per effect family.
//!
//! Synchronous resolvers return their response directly to the dispatch
//! loop. Asynchronous ones (http, timers) run on the tokio runtime and post a
//! [`Completion`] back to the loop, which owns every call into the core.

mod http;
mod key_value;
mod platform;
mod time;

use tokio::sync::mpsc;

use crate::codec::{self, CodecError};
use crate::protocol::{HttpResult, KeyValueResult, PlatformResponse, RequestId, TimeResponse};

pub use http::{execute, HttpResolver};
pub use key_value::KeyValueResolver;
pub use platform::{host_identity, PlatformResolver};
pub use time::TimeResolver;

/// A response ready to be submitted to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Http(HttpResult),
    Time(TimeResponse),
    Platform(PlatformResponse),
    KeyValue(KeyValueResult),
}

impl Resolved {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Resolved::Http(result) => codec::encode(result),
            Resolved::Time(response) => codec::encode(response),
            Resolved::Platform(response) => codec::encode(response),
            Resolved::KeyValue(result) => codec::encode(result),
        }
    }
}

/// Where an asynchronous completion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A one-off task such as an http request.
    Task,
    /// A timer armed with this generation. Stale generations are dropped.
    Timer { generation: u64 },
}

/// An asynchronously resolved response on its way back to the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: RequestId,
    pub origin: Origin,
    pub resolved: Resolved,
}

impl Completion {
    pub fn task(id: RequestId, resolved: Resolved) -> Self {
        Self {
            id,
            origin: Origin::Task,
            resolved,
        }
    }

    pub fn timer(id: RequestId, generation: u64, resolved: Resolved) -> Self {
        Self {
            id,
            origin: Origin::Timer { generation },
            resolved,
        }
    }
}

pub type CompletionSender = mpsc::UnboundedSender<Completion>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<Completion>;

pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}
