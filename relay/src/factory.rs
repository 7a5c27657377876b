use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::config::{BackendKind, Snapshot};
use crate::dispatch::Dispatcher;
use crate::error::RelayError;
use crate::log::RelayLog;
use crate::pinpoint::{PinpointApi, PinpointBackend};
use crate::ses::{SesApi, SesBackend};
use crate::Relay;

/// Builds network clients on demand; only the selected backend's client is requested.
pub trait ClientProvider {
    fn ses(&self) -> Arc<dyn SesApi>;
    fn pinpoint(&self) -> Arc<dyn PinpointApi>;
}

/// A relay bound to one of the supported backends.
pub enum RelayClient {
    Ses(Dispatcher<SesBackend>),
    Pinpoint(Dispatcher<PinpointBackend>),
}

impl RelayClient {
    pub fn kind(&self) -> BackendKind {
        match self {
            RelayClient::Ses(_) => BackendKind::Ses,
            RelayClient::Pinpoint(_) => BackendKind::Pinpoint,
        }
    }
}

#[async_trait]
impl Relay for RelayClient {
    async fn send(
        &self,
        origin: Option<SocketAddr>,
        from: &str,
        to: &[String],
        body: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<(), RelayError> {
        match self {
            RelayClient::Ses(d) => d.send(origin, from, to, body).await,
            RelayClient::Pinpoint(d) => d.send(origin, from, to, body).await,
        }
    }
}

/// Builds the relay selected by `snapshot`.
pub fn new_client(
    snapshot: &Snapshot,
    clients: &dyn ClientProvider,
    log: Arc<dyn RelayLog>,
) -> RelayClient {
    let set_name = snapshot.set_name().map(str::to_string);
    let filter = snapshot.filter();
    let limit = snapshot.max_message_bytes();

    match snapshot.backend() {
        BackendKind::Ses => {
            let backend = SesBackend::new(clients.ses(), set_name, snapshot.arns().clone());
            RelayClient::Ses(Dispatcher::new(backend, filter, limit, log))
        }
        BackendKind::Pinpoint => {
            let backend = PinpointBackend::new(clients.pinpoint(), set_name);
            RelayClient::Pinpoint(Dispatcher::new(backend, filter, limit, log))
        }
    }
}
