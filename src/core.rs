//! Boundary to the external core.
//!
//! The core is opaque: the shell only ever calls these three entry points and
//! never touches core state directly. Every call returns encoded bytes; the
//! event and response entry points return a batch of requests, `view` returns
//! the current view snapshot.

use crate::protocol::RequestId;

pub trait CoreGateway: Send + 'static {
    /// Encoded snapshot of the current view.
    fn view(&self) -> Vec<u8>;

    /// Submit an encoded event, returning an encoded batch of requests.
    fn process_event(&self, event: &[u8]) -> Vec<u8>;

    /// Submit the encoded response for `id`, returning an encoded batch of
    /// requests.
    fn handle_response(&self, id: RequestId, response: &[u8]) -> Vec<u8>;
}

/// Entry points exported by a core compiled into the host (for example
/// through generated FFI bindings).
#[derive(Clone, Copy)]
pub struct ExternCore {
    view: fn() -> Vec<u8>,
    process_event: fn(&[u8]) -> Vec<u8>,
    handle_response: fn(u32, &[u8]) -> Vec<u8>,
}

impl ExternCore {
    pub fn new(
        view: fn() -> Vec<u8>,
        process_event: fn(&[u8]) -> Vec<u8>,
        handle_response: fn(u32, &[u8]) -> Vec<u8>,
    ) -> Self {
        Self {
            view,
            process_event,
            handle_response,
        }
    }
}

impl CoreGateway for ExternCore {
    fn view(&self) -> Vec<u8> {
        (self.view)()
    }

    fn process_event(&self, event: &[u8]) -> Vec<u8> {
        (self.process_event)(event)
    }

    fn handle_response(&self, id: RequestId, response: &[u8]) -> Vec<u8> {
        (self.handle_response)(id.0, response)
    }
}

impl std::fmt::Debug for ExternCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternCore").finish_non_exhaustive()
    }
}
