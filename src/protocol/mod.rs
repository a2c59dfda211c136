//! Typed values exchanged with the core.
//!
//! The core emits batches of [`Request`]s; every request carries the
//! [`RequestId`] that its response(s) must be submitted under. The shape of
//! these types is shared with the core's schema, so variant order matters:
//! the codec encodes enum variants by index.

mod http;
mod key_value;
mod platform;
mod time;

use serde::{Deserialize, Serialize};

pub use http::{HttpError, HttpHeader, HttpRequest, HttpResponse, HttpResult};
pub use key_value::{KeyValueError, KeyValueOperation, KeyValueResponse, KeyValueResult, Value};
pub use platform::{PlatformRequest, PlatformResponse};
pub use time::{Duration, Instant, TimeRequest, TimeResponse, TimerId};

/// Correlation key between a request and the response(s) it produces.
///
/// Recurring effects (interval timers) reuse the same id for every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u32);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single instruction from the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub effect: Effect,
}

/// Marker payload for render requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOperation;

/// Every capability family the core can ask for.
///
/// Adding a family here is a compile error in every `match` that routes
/// effects, which is the point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Render(RenderOperation),
    Http(HttpRequest),
    Time(TimeRequest),
    Platform(PlatformRequest),
    KeyValue(KeyValueOperation),
}

impl Effect {
    /// Short family name used in logs and stats.
    pub fn family(&self) -> EffectFamily {
        match self {
            Effect::Render(_) => EffectFamily::Render,
            Effect::Http(_) => EffectFamily::Http,
            Effect::Time(_) => EffectFamily::Time,
            Effect::Platform(_) => EffectFamily::Platform,
            Effect::KeyValue(_) => EffectFamily::KeyValue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectFamily {
    Render,
    Http,
    Time,
    Platform,
    KeyValue,
}

impl EffectFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Http => "http",
            Self::Time => "time",
            Self::Platform => "platform",
            Self::KeyValue => "key_value",
        }
    }
}

impl std::fmt::Display for EffectFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
