use std::net::SocketAddr;

use tracing::{info, warn};

use crate::error::RelayError;

/// Receives one record per relay decision: the denied recipients of a
/// submission, or the outcome of handing the allowed ones to the backend.
pub trait RelayLog: Send + Sync {
    fn record(
        &self,
        origin: Option<SocketAddr>,
        from: &str,
        to: &[String],
        error: Option<&RelayError>,
    );
}

/// Emits relay records as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl RelayLog for TracingLog {
    fn record(
        &self,
        origin: Option<SocketAddr>,
        from: &str,
        to: &[String],
        error: Option<&RelayError>,
    ) {
        let origin = origin.map(|o| o.to_string()).unwrap_or_default();
        match error {
            None => info!(
                origin = %origin,
                from_email = from,
                to_email = %to.join(","),
                "Relayed email"
            ),
            Some(e) => warn!(
                origin = %origin,
                from_email = from,
                to_email = %to.join(","),
                error = %e,
                "Email not relayed"
            ),
        }
    }
}
