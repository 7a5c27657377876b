//! Address filtering and dispatch for relaying outbound mail to a cloud
//! sending API.
//!
//! A listener hands every accepted submission to [`Relay::send`]. The relay
//! filters the recipients against the resolved policy, caps the message size
//! and submits whatever is left to the configured backend.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::AsyncRead;

pub mod config;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod filter;
pub mod log;
pub mod pinpoint;
pub mod ses;

pub use config::{resolve, Arns, BackendKind, Environment, ProcessEnv, RelayConfig, Snapshot};
pub use error::{BoxError, ConfigError, FilterError, RelayError};
pub use factory::{new_client, ClientProvider, RelayClient};
pub use filter::{AddressFilter, FilterOutcome};
pub use log::{RelayLog, TracingLog};

#[async_trait]
pub trait Relay: Send + Sync {
    /// Relays one submission. `origin` is only used for logging.
    ///
    /// Recipients rejected by policy are logged and dropped; if nobody is
    /// left the classified denial is returned. A partially denied submission
    /// that reaches the backend successfully returns `Ok`.
    async fn send(
        &self,
        origin: Option<SocketAddr>,
        from: &str,
        to: &[String],
        body: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<(), RelayError>;
}
