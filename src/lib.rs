//! Platform shell for an opaque application core.
//!
//! The core is driven only through encoded events and responses; in return
//! it emits batches of effect requests that the shell resolves against the
//! host (network, clock, device identity, key-value storage) and a view the
//! UI renders.

pub mod codec;
pub mod config;
pub mod core;
pub mod logging;
pub mod protocol;
pub mod resolvers;
pub mod shell;
pub mod shutdown;
pub mod store;
pub mod view;

pub use crate::config::ShellConfig;
pub use crate::core::{CoreGateway, ExternCore};
pub use crate::shell::{Shell, ShellError, ShellHandle, ShellStats, ShellTask};
pub use crate::view::ViewSubscription;
