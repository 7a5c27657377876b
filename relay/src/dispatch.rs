//! Backend independent send path.
//!
//! [`Dispatcher`] runs the address filter, enforces the message size cap and
//! reports to the relay log. Backends only turn an [`OutboundMessage`] into
//! their own request type and hand it to their client.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::config::BackendKind;
use crate::error::{BoxError, RelayError};
use crate::filter::AddressFilter;
use crate::log::RelayLog;
use crate::Relay;

/// Message that survived filtering, ready for a backend.
#[derive(Debug, Clone, Copy)]
pub struct OutboundMessage<'a> {
    pub from: &'a str,
    pub to: &'a [String],
    pub data: &'a [u8],
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Network client handle used by the backend.
    type Client: ?Sized + Send + Sync;

    fn kind(&self) -> BackendKind;

    /// Returns a copy of this backend using `client` when one is given.
    fn annotate(&self, client: Option<Arc<Self::Client>>) -> Self
    where
        Self: Sized;

    async fn deliver(&self, message: OutboundMessage<'_>) -> Result<(), BoxError>;
}

/// Reads the whole body, failing once it grows past `limit` bytes.
pub async fn consume_to_bytes<R>(reader: &mut R, limit: usize) -> Result<Vec<u8>, RelayError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut data = Vec::new();
    let mut capped = reader.take(limit as u64 + 1);
    capped.read_to_end(&mut data).await?;
    if data.len() > limit {
        return Err(RelayError::MessageTooLarge { limit });
    }
    Ok(data)
}

pub struct Dispatcher<B> {
    backend: B,
    filter: Arc<AddressFilter>,
    max_message_bytes: usize,
    log: Arc<dyn RelayLog>,
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(
        backend: B,
        filter: Arc<AddressFilter>,
        max_message_bytes: usize,
        log: Arc<dyn RelayLog>,
    ) -> Self {
        Dispatcher {
            backend,
            filter,
            max_message_bytes,
            log,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Same dispatcher with the backend's client replaced by `client`, if given.
    pub fn annotate(&self, client: Option<Arc<B::Client>>) -> Self {
        Dispatcher {
            backend: self.backend.annotate(client),
            filter: Arc::clone(&self.filter),
            max_message_bytes: self.max_message_bytes,
            log: Arc::clone(&self.log),
        }
    }
}

#[async_trait]
impl<B: Backend> Relay for Dispatcher<B> {
    async fn send(
        &self,
        origin: Option<SocketAddr>,
        from: &str,
        to: &[String],
        body: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<(), RelayError> {
        let outcome = self.filter.filter(from, to);
        if let Some(err) = outcome.error {
            self.log
                .record(origin, from, &outcome.denied, Some(&RelayError::Denied(err)));
        }

        if outcome.allowed.is_empty() {
            return match outcome.error {
                Some(err) => Err(err.into()),
                None => Ok(()),
            };
        }

        let data = consume_to_bytes(body, self.max_message_bytes).await?;
        debug!(
            backend = %self.backend.kind(),
            size = data.len(),
            recipients = outcome.allowed.len(),
            "Submitting email to backend"
        );

        let message = OutboundMessage {
            from,
            to: &outcome.allowed,
            data: &data,
        };
        match self.backend.deliver(message).await {
            Ok(()) => {
                self.log.record(origin, from, &outcome.allowed, None);
                Ok(())
            }
            Err(e) => {
                let err = RelayError::backend(self.backend.kind(), e);
                self.log.record(origin, from, &outcome.allowed, Some(&err));
                Err(err)
            }
        }
    }
}
