//! Shell entry point: wires the core, the resolvers, and the view projection
//! together and runs the dispatch loop on the current tokio runtime.

mod dispatch;
mod error;

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec;
use crate::config::ShellConfig;
use crate::core::CoreGateway;
use crate::resolvers::{
    completion_channel, HttpResolver, KeyValueResolver, PlatformResolver, TimeResolver,
};
use crate::shutdown::ShutdownHandle;
use crate::store::{FileStore, KeyValueStore};
use crate::view::{ViewProjection, ViewSubscription};

use dispatch::{DispatchLoop, Resolvers};

pub use dispatch::ShellStats;
pub use error::ShellError;

/// Constructors for a running shell.
pub struct Shell;

impl Shell {
    /// Start a shell whose key-value capability is backed by the file store
    /// configured in `config.store`.
    pub fn start<C, E, V>(
        core: C,
        config: ShellConfig,
    ) -> Result<(ShellHandle<E, V>, ShellTask), ShellError>
    where
        C: CoreGateway,
        E: Serialize,
        V: DeserializeOwned + Send + Sync + 'static,
    {
        let store = FileStore::new(config.store.resolved_path())
            .with_lock_timeout(config.store.lock_timeout());
        Self::with_store(core, config, store)
    }

    /// Start a shell with configuration loaded from the default config path.
    pub fn start_default<C, E, V>(core: C) -> Result<(ShellHandle<E, V>, ShellTask), ShellError>
    where
        C: CoreGateway,
        E: Serialize,
        V: DeserializeOwned + Send + Sync + 'static,
    {
        let config = ShellConfig::load()?;
        Self::start(core, config)
    }

    pub fn with_store<C, E, V, S>(
        core: C,
        config: ShellConfig,
        store: S,
    ) -> Result<(ShellHandle<E, V>, ShellTask), ShellError>
    where
        C: CoreGateway,
        E: Serialize,
        V: DeserializeOwned + Send + Sync + 'static,
        S: KeyValueStore,
    {
        let runtime = Handle::try_current().map_err(|_| ShellError::NoRuntime)?;

        let initial: V = codec::decode(&core.view()).map_err(ShellError::Protocol)?;
        let view = ViewProjection::new(initial);
        let subscription = view.subscribe();

        let (completions_tx, completions_rx) = completion_channel();
        let resolvers = Resolvers {
            http: HttpResolver::new(&config.http, runtime.clone(), completions_tx.clone())?,
            time: TimeResolver::new(config.timers.slots, runtime.clone(), completions_tx),
            platform: PlatformResolver,
            key_value: KeyValueResolver::new(Box::new(store), config.store.page_size),
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutdown = ShutdownHandle::new();

        let dispatch = DispatchLoop::new(core, view, resolvers);
        let join = runtime.spawn(dispatch.run(events_rx, completions_rx, shutdown.clone()));

        tracing::info!(timer_slots = ?config.timers.slots, "shell started");

        let handle = ShellHandle {
            events: events_tx,
            view: subscription,
            shutdown,
            _event: PhantomData,
        };
        Ok((handle, ShellTask { join }))
    }
}

/// Host-side handle: submits events and observes the view.
///
/// The dispatch loop keeps running while at least one handle is alive.
pub struct ShellHandle<E, V> {
    events: mpsc::UnboundedSender<Vec<u8>>,
    view: ViewSubscription<V>,
    shutdown: ShutdownHandle,
    _event: PhantomData<fn(E)>,
}

impl<E: Serialize, V> ShellHandle<E, V> {
    /// Encode `event` and submit it to the core.
    pub fn update(&self, event: &E) -> Result<(), ShellError> {
        let bytes = codec::encode(event).map_err(|source| ShellError::Encode {
            what: "event",
            source,
        })?;
        self.update_raw(bytes)
    }
}

impl<E, V> ShellHandle<E, V> {
    /// Submit already encoded event bytes. Fails once shutdown was requested,
    /// even if the loop has not exited yet.
    pub fn update_raw(&self, bytes: Vec<u8>) -> Result<(), ShellError> {
        if self.shutdown.is_shutting_down() {
            return Err(ShellError::Stopped);
        }
        self.events.send(bytes).map_err(|_| ShellError::Stopped)
    }

    pub fn view(&self) -> Arc<V> {
        self.view.latest()
    }

    pub fn subscribe(&self) -> ViewSubscription<V> {
        self.view.clone()
    }

    /// Ask the dispatch loop to stop. Pending timers are disarmed and
    /// in-flight http requests are abandoned.
    pub fn shutdown(&self) {
        self.shutdown.signal();
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_shutting_down() && !self.events.is_closed()
    }
}

impl<E, V> Clone for ShellHandle<E, V> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            view: self.view.clone(),
            shutdown: self.shutdown.clone(),
            _event: PhantomData,
        }
    }
}

/// The spawned dispatch task.
pub struct ShellTask {
    join: JoinHandle<Result<ShellStats, ShellError>>,
}

impl ShellTask {
    /// Wait for the dispatch loop to exit.
    pub async fn wait(self) -> Result<ShellStats, ShellError> {
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(ShellError::Join(err.to_string())),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
