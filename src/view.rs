//! Latest-view storage and publication.
//!
//! Every render replaces the view wholesale; nothing is diffed or patched.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::codec::{self, CodecError};
use crate::core::CoreGateway;

pub struct ViewProjection<V> {
    sender: watch::Sender<Arc<V>>,
}

impl<V> ViewProjection<V> {
    pub fn new(initial: V) -> Self {
        let (sender, _) = watch::channel(Arc::new(initial));
        Self { sender }
    }

    /// Replace the current view and notify every subscriber.
    pub fn publish(&self, view: V) {
        self.sender.send_replace(Arc::new(view));
    }

    pub fn latest(&self) -> Arc<V> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> ViewSubscription<V> {
        ViewSubscription {
            receiver: self.sender.subscribe(),
        }
    }
}

impl<V: DeserializeOwned> ViewProjection<V> {
    /// Fetch and decode the core's current view, then publish it.
    pub fn refresh<C: CoreGateway>(&self, core: &C) -> Result<(), CodecError> {
        let view = codec::decode(&core.view())?;
        self.publish(view);
        Ok(())
    }
}

/// Observer side of a [`ViewProjection`].
pub struct ViewSubscription<V> {
    receiver: watch::Receiver<Arc<V>>,
}

impl<V> ViewSubscription<V> {
    pub fn latest(&self) -> Arc<V> {
        self.receiver.borrow().clone()
    }

    /// Whether a view was published since this subscription last looked.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next published view. Returns `None` once the shell has
    /// stopped.
    pub async fn changed(&mut self) -> Option<Arc<V>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl<V> Clone for ViewSubscription<V> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
        }
    }
}
