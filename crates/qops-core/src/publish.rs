//! Publishing single messages.

use crate::queue::QueueClient;
use aws_sdk_sqs::types::MessageAttributeValue;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug)]
pub enum PublishError {
    QueueLookupFailed(anyhow::Error),
    BuildAttributeFailed(String),
    SendFailed(anyhow::Error),
    MissingMessageId,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::QueueLookupFailed(e) => write!(f, "{:#}", e),
            PublishError::BuildAttributeFailed(msg) => {
                write!(f, "failed to build message attribute: {}", msg)
            }
            PublishError::SendFailed(e) => write!(f, "SendMessage failed: {:#}", e),
            PublishError::MissingMessageId => write!(f, "response carried no message id"),
        }
    }
}

impl std::error::Error for PublishError {}

impl QueueClient {
    /// Sends one message to `destination` (a queue URL or a short name),
    /// attaching `attributes` as `String`-typed message attributes when the
    /// map is non-empty. Returns the backend-assigned message id.
    pub async fn publish(
        &self,
        destination: &str,
        body: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<String, PublishError> {
        let url = self
            .endpoint(destination)
            .await
            .map_err(PublishError::QueueLookupFailed)?;

        let mut request = self
            .client
            .send_message()
            .queue_url(url.as_str())
            .message_body(body);

        if !attributes.is_empty() {
            let mut typed = HashMap::with_capacity(attributes.len());
            for (key, value) in attributes {
                let attribute = MessageAttributeValue::builder()
                    .data_type("String")
                    .string_value(value)
                    .build()
                    .map_err(|e| PublishError::BuildAttributeFailed(e.to_string()))?;
                typed.insert(key.clone(), attribute);
            }
            request = request.set_message_attributes(Some(typed));
        }

        let output = request
            .send()
            .await
            .map_err(|e| PublishError::SendFailed(e.into()))?;

        output.message_id.ok_or(PublishError::MissingMessageId)
    }
}
