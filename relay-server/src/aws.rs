//! AWS SDK clients behind the relay backend traits.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use relay::pinpoint::{PinpointApi, PinpointSendInput, PinpointSendOutput};
use relay::ses::{SendEmailInput, SendEmailOutput, SesApi};
use relay::{BoxError, ClientProvider};
use tracing::info;

/// Builds SDK clients from the default credential and region chain.
pub struct AwsClients {
    config: SdkConfig,
}

impl AwsClients {
    pub async fn load() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        info!(region = ?config.region(), "Loaded AWS configuration");
        AwsClients { config }
    }
}

impl ClientProvider for AwsClients {
    fn ses(&self) -> Arc<dyn SesApi> {
        Arc::new(SesClient(aws_sdk_sesv2::Client::new(&self.config)))
    }

    fn pinpoint(&self) -> Arc<dyn PinpointApi> {
        Arc::new(PinpointClient(aws_sdk_pinpointemail::Client::new(&self.config)))
    }
}

struct SesClient(aws_sdk_sesv2::Client);

#[async_trait]
impl SesApi for SesClient {
    async fn send_email(&self, input: SendEmailInput) -> Result<SendEmailOutput, BoxError> {
        use aws_sdk_sesv2::error::DisplayErrorContext;
        use aws_sdk_sesv2::primitives::Blob;
        use aws_sdk_sesv2::types::{Destination, EmailContent, RawMessage};

        let raw = RawMessage::builder()
            .data(Blob::new(input.raw_message))
            .build()?;

        let output = self
            .0
            .send_email()
            .set_configuration_set_name(input.configuration_set_name)
            .from_email_address(input.from_email_address)
            .set_from_email_address_identity_arn(input.from_email_address_identity_arn)
            .set_feedback_forwarding_email_address_identity_arn(
                input.feedback_forwarding_email_address_identity_arn,
            )
            .destination(
                Destination::builder()
                    .set_to_addresses(Some(input.to_addresses))
                    .build(),
            )
            .content(EmailContent::builder().raw(raw).build())
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;

        Ok(SendEmailOutput {
            message_id: output.message_id().map(str::to_string),
        })
    }
}

struct PinpointClient(aws_sdk_pinpointemail::Client);

#[async_trait]
impl PinpointApi for PinpointClient {
    async fn send_email(
        &self,
        input: PinpointSendInput,
    ) -> Result<PinpointSendOutput, BoxError> {
        use aws_sdk_pinpointemail::error::DisplayErrorContext;
        use aws_sdk_pinpointemail::primitives::Blob;
        use aws_sdk_pinpointemail::types::{Destination, EmailContent, RawMessage};

        let raw = RawMessage::builder()
            .data(Blob::new(input.raw_message))
            .build()?;

        let output = self
            .0
            .send_email()
            .set_configuration_set_name(input.configuration_set_name)
            .from_email_address(input.from_email_address)
            .destination(
                Destination::builder()
                    .set_to_addresses(Some(input.to_addresses))
                    .build(),
            )
            .content(EmailContent::builder().raw(raw).build())
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;

        Ok(PinpointSendOutput {
            message_id: output.message_id().map(str::to_string),
        })
    }
}
