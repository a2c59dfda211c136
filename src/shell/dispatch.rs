//! The effect dispatch loop.
//!
//! Requests wait in an explicit queue. When a synchronous resolver answers,
//! the batch the core returns is pushed onto the *front* of the queue in
//! issuance order, so it is fully drained before the remaining siblings:
//! depth-first order without recursion. Asynchronous completions arrive on a
//! channel and are handled one at a time by the same task, which is the only
//! place the core is ever called.

use std::collections::VecDeque;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::codec;
use crate::core::CoreGateway;
use crate::protocol::{Effect, EffectFamily, Request, RequestId};
use crate::resolvers::{
    Completion, CompletionReceiver, HttpResolver, KeyValueResolver, Origin, PlatformResolver,
    Resolved, TimeResolver,
};
use crate::shell::ShellError;
use crate::shutdown::ShutdownHandle;
use crate::view::ViewProjection;

/// Counters describing what the loop has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellStats {
    pub events: u64,
    pub responses: u64,
    pub stale_completions: u64,
    pub render: u64,
    pub http: u64,
    pub time: u64,
    pub platform: u64,
    pub key_value: u64,
}

impl ShellStats {
    pub fn routed(&self, family: EffectFamily) -> u64 {
        match family {
            EffectFamily::Render => self.render,
            EffectFamily::Http => self.http,
            EffectFamily::Time => self.time,
            EffectFamily::Platform => self.platform,
            EffectFamily::KeyValue => self.key_value,
        }
    }

    pub fn total_routed(&self) -> u64 {
        self.render + self.http + self.time + self.platform + self.key_value
    }

    fn record(&mut self, family: EffectFamily) {
        match family {
            EffectFamily::Render => self.render += 1,
            EffectFamily::Http => self.http += 1,
            EffectFamily::Time => self.time += 1,
            EffectFamily::Platform => self.platform += 1,
            EffectFamily::KeyValue => self.key_value += 1,
        }
    }
}

pub(crate) struct Resolvers {
    pub http: HttpResolver,
    pub time: TimeResolver,
    pub platform: PlatformResolver,
    pub key_value: KeyValueResolver,
}

pub(crate) struct DispatchLoop<C, V> {
    core: C,
    view: ViewProjection<V>,
    resolvers: Resolvers,
    pending: VecDeque<Request>,
    stats: ShellStats,
}

impl<C, V> DispatchLoop<C, V>
where
    C: CoreGateway,
    V: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(core: C, view: ViewProjection<V>, resolvers: Resolvers) -> Self {
        Self {
            core,
            view,
            resolvers,
            pending: VecDeque::new(),
            stats: ShellStats::default(),
        }
    }

    /// Serve events and completions until every handle is gone, shutdown is
    /// signaled, or the core violates the protocol.
    pub async fn run(
        mut self,
        mut events: UnboundedReceiver<Vec<u8>>,
        mut completions: CompletionReceiver,
        shutdown: ShutdownHandle,
    ) -> Result<ShellStats, ShellError> {
        tracing::debug!("dispatch loop started");

        let result = loop {
            // Unbiased: a steady stream of events must not starve completions.
            tokio::select! {
                _ = shutdown.wait() => break Ok(()),
                event = events.recv() => match event {
                    Some(bytes) => {
                        if let Err(err) = self.submit_event(&bytes) {
                            break Err(err);
                        }
                    }
                    None => break Ok(()),
                },
                Some(completion) = completions.recv() => {
                    if let Err(err) = self.complete(completion) {
                        break Err(err);
                    }
                }
            }
        };

        self.resolvers.time.disarm_all();
        self.pending.clear();

        match &result {
            Ok(()) => tracing::debug!(stats = ?self.stats, "dispatch loop stopped"),
            Err(err) => tracing::error!(error = %err, "dispatch loop aborted"),
        }

        result.map(|()| self.stats)
    }

    pub fn submit_event(&mut self, event: &[u8]) -> Result<(), ShellError> {
        self.stats.events += 1;
        let batch = self.core.process_event(event);
        self.schedule(&batch)?;
        self.drain()
    }

    pub fn complete(&mut self, completion: Completion) -> Result<(), ShellError> {
        if let Origin::Timer { generation } = completion.origin {
            if !self.resolvers.time.accept(generation) {
                self.stats.stale_completions += 1;
                tracing::debug!(request = %completion.id, generation, "dropping completion from disarmed timer");
                return Ok(());
            }
        }

        self.respond(completion.id, completion.resolved)?;
        self.drain()
    }

    fn respond(&mut self, id: RequestId, resolved: Resolved) -> Result<(), ShellError> {
        let bytes = resolved.encode().map_err(|source| ShellError::Encode {
            what: "response",
            source,
        })?;
        self.stats.responses += 1;
        let batch = self.core.handle_response(id, &bytes);
        self.schedule(&batch)
    }

    fn schedule(&mut self, batch: &[u8]) -> Result<(), ShellError> {
        let requests = codec::decode_requests(batch).map_err(ShellError::Protocol)?;
        for request in requests.into_iter().rev() {
            self.pending.push_front(request);
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), ShellError> {
        while let Some(request) = self.pending.pop_front() {
            self.route(request)?;
        }
        Ok(())
    }

    fn route(&mut self, request: Request) -> Result<(), ShellError> {
        let Request { id, effect } = request;
        let family = effect.family();
        self.stats.record(family);
        tracing::debug!(request = %id, effect = %family, "routing request");

        match effect {
            Effect::Render(_) => self.view.refresh(&self.core).map_err(ShellError::Protocol),
            Effect::Http(request) => {
                self.resolvers.http.resolve(id, request);
                Ok(())
            }
            Effect::Time(request) => match self.resolvers.time.resolve(id, request) {
                Some(response) => self.respond(id, Resolved::Time(response)),
                None => Ok(()),
            },
            Effect::Platform(_) => {
                let response = self.resolvers.platform.resolve();
                self.respond(id, Resolved::Platform(response))
            }
            Effect::KeyValue(operation) => {
                let result = self.resolvers.key_value.resolve(operation);
                self.respond(id, Resolved::KeyValue(result))
            }
        }
    }

    #[cfg(test)]
    pub fn stats(&self) -> &ShellStats {
        &self.stats
    }
}
