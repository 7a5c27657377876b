//! Amazon Pinpoint Email backend. Identity delegation is not supported by this
//! API, so any configured ARNs are ignored.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::BackendKind;
use crate::dispatch::{Backend, OutboundMessage};
use crate::error::BoxError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinpointSendInput {
    pub configuration_set_name: Option<String>,
    pub from_email_address: String,
    pub to_addresses: Vec<String>,
    pub raw_message: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinpointSendOutput {
    pub message_id: Option<String>,
}

/// Client handle for the Pinpoint Email API.
#[async_trait]
pub trait PinpointApi: Send + Sync {
    async fn send_email(&self, input: PinpointSendInput)
        -> Result<PinpointSendOutput, BoxError>;
}

pub struct PinpointBackend {
    client: Arc<dyn PinpointApi>,
    set_name: Option<String>,
}

impl PinpointBackend {
    pub fn new(client: Arc<dyn PinpointApi>, set_name: Option<String>) -> Self {
        PinpointBackend { client, set_name }
    }

    pub fn build_input(&self, message: OutboundMessage<'_>) -> PinpointSendInput {
        PinpointSendInput {
            configuration_set_name: self.set_name.clone(),
            from_email_address: message.from.to_string(),
            to_addresses: message.to.to_vec(),
            raw_message: message.data.to_vec(),
        }
    }
}

#[async_trait]
impl Backend for PinpointBackend {
    type Client = dyn PinpointApi;

    fn kind(&self) -> BackendKind {
        BackendKind::Pinpoint
    }

    fn annotate(&self, client: Option<Arc<dyn PinpointApi>>) -> Self {
        PinpointBackend {
            client: client.unwrap_or_else(|| Arc::clone(&self.client)),
            set_name: self.set_name.clone(),
        }
    }

    async fn deliver(&self, message: OutboundMessage<'_>) -> Result<(), BoxError> {
        let output = self.client.send_email(self.build_input(message)).await?;
        debug!(message_id = ?output.message_id, "Pinpoint accepted email");
        Ok(())
    }
}
