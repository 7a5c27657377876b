//! Amazon SES (v2 API) backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{Arns, BackendKind};
use crate::dispatch::{Backend, OutboundMessage};
use crate::error::BoxError;

/// Request shape of the SESv2 `SendEmail` call with raw content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendEmailInput {
    pub configuration_set_name: Option<String>,
    pub from_email_address: String,
    pub from_email_address_identity_arn: Option<String>,
    pub feedback_forwarding_email_address_identity_arn: Option<String>,
    pub to_addresses: Vec<String>,
    pub raw_message: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendEmailOutput {
    pub message_id: Option<String>,
}

/// Client handle for the SESv2 API.
#[async_trait]
pub trait SesApi: Send + Sync {
    async fn send_email(&self, input: SendEmailInput) -> Result<SendEmailOutput, BoxError>;
}

pub struct SesBackend {
    client: Arc<dyn SesApi>,
    set_name: Option<String>,
    arns: Arns,
}

impl SesBackend {
    pub fn new(client: Arc<dyn SesApi>, set_name: Option<String>, arns: Arns) -> Self {
        SesBackend {
            client,
            set_name,
            arns,
        }
    }

    pub fn build_input(&self, message: OutboundMessage<'_>) -> SendEmailInput {
        // The source ARN stands in for whichever delegated identity is missing.
        let source = self.arns.source.as_ref();
        SendEmailInput {
            configuration_set_name: self.set_name.clone(),
            from_email_address: message.from.to_string(),
            from_email_address_identity_arn: self.arns.from.as_ref().or(source).cloned(),
            feedback_forwarding_email_address_identity_arn: self
                .arns
                .return_path
                .as_ref()
                .or(source)
                .cloned(),
            to_addresses: message.to.to_vec(),
            raw_message: message.data.to_vec(),
        }
    }
}

#[async_trait]
impl Backend for SesBackend {
    type Client = dyn SesApi;

    fn kind(&self) -> BackendKind {
        BackendKind::Ses
    }

    fn annotate(&self, client: Option<Arc<dyn SesApi>>) -> Self {
        SesBackend {
            client: client.unwrap_or_else(|| Arc::clone(&self.client)),
            set_name: self.set_name.clone(),
            arns: self.arns.clone(),
        }
    }

    async fn deliver(&self, message: OutboundMessage<'_>) -> Result<(), BoxError> {
        let output = self.client.send_email(self.build_input(message)).await?;
        debug!(message_id = ?output.message_id, "SES accepted email");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests::RecordingLog;
    use crate::dispatch::Dispatcher;
    use crate::filter::AddressFilter;
    use crate::Relay;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockSes {
        inputs: Mutex<Vec<SendEmailInput>>,
    }

    #[async_trait]
    impl SesApi for MockSes {
        async fn send_email(&self, input: SendEmailInput) -> Result<SendEmailOutput, BoxError> {
            self.inputs.lock().unwrap().push(input);
            Ok(SendEmailOutput {
                message_id: Some("0100018c-test".to_string()),
            })
        }
    }

    fn message<'a>(to: &'a [String], data: &'a [u8]) -> OutboundMessage<'a> {
        OutboundMessage {
            from: "sender@example.com",
            to,
            data,
        }
    }

    #[test]
    fn test_build_input_without_arns() {
        let backend = SesBackend::new(Arc::new(MockSes::default()), None, Arns::default());
        let to = vec!["user@example.org".to_string()];
        let input = backend.build_input(message(&to, b"raw"));

        assert_eq!(
            input,
            SendEmailInput {
                configuration_set_name: None,
                from_email_address: "sender@example.com".to_string(),
                from_email_address_identity_arn: None,
                feedback_forwarding_email_address_identity_arn: None,
                to_addresses: to.clone(),
                raw_message: b"raw".to_vec(),
            }
        );
    }

    #[test]
    fn test_build_input_source_arn_fills_both_fields() {
        // Constructed directly, without the resolver filling in the defaults.
        let arns = Arns {
            source: Some("arn:source".to_string()),
            from: None,
            return_path: None,
        };
        let backend = SesBackend::new(Arc::new(MockSes::default()), Some("set".to_string()), arns);
        let to = vec!["user@example.org".to_string()];
        let input = backend.build_input(message(&to, b"raw"));

        assert_eq!(input.configuration_set_name.as_deref(), Some("set"));
        assert_eq!(input.from_email_address_identity_arn.as_deref(), Some("arn:source"));
        assert_eq!(
            input.feedback_forwarding_email_address_identity_arn.as_deref(),
            Some("arn:source")
        );
    }

    #[test]
    fn test_build_input_explicit_arns_win() {
        let arns = Arns {
            source: Some("arn:source".to_string()),
            from: Some("arn:from".to_string()),
            return_path: Some("arn:return".to_string()),
        };
        let backend = SesBackend::new(Arc::new(MockSes::default()), None, arns);
        let input = backend.build_input(message(&[], b""));

        assert_eq!(input.from_email_address_identity_arn.as_deref(), Some("arn:from"));
        assert_eq!(
            input.feedback_forwarding_email_address_identity_arn.as_deref(),
            Some("arn:return")
        );
    }

    #[tokio::test]
    async fn test_send_through_annotated_client() {
        let initial = Arc::new(MockSes::default());
        let backend = SesBackend::new(initial.clone(), None, Arns::default());
        let dispatcher = Dispatcher::new(
            backend,
            Arc::new(AddressFilter::default()),
            1024,
            Arc::new(RecordingLog::default()),
        );

        let mock = Arc::new(MockSes::default());
        let dispatcher = dispatcher.annotate(Some(mock.clone() as Arc<dyn SesApi>));
        let to = vec!["user@example.org".to_string()];
        let mut body: &[u8] = b"Subject: test\r\n\r\nhello";
        dispatcher
            .send(None, "sender@example.com", &to, &mut body)
            .await
            .unwrap();

        let inputs = mock.inputs.lock().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].to_addresses, to);
        assert_eq!(inputs[0].raw_message, b"Subject: test\r\n\r\nhello".to_vec());
        assert!(initial.inputs.lock().unwrap().is_empty());
    }
}
