//! Batched queue-to-queue message transfer.

use crate::queue::QueueClient;
use anyhow::Context;
use aws_sdk_sqs::types::{
    DeleteMessageBatchRequestEntry, Message, MessageSystemAttributeName,
    SendMessageBatchRequestEntry,
};
use std::fmt;
use std::path::PathBuf;

/// SQS caps batch operations at ten entries.
pub(crate) const RECEIVE_BATCH_SIZE: i32 = 10;

/// Visibility window while a batch is being forwarded.
const MOVE_VISIBILITY_TIMEOUT: i32 = 5;

/// A transfer or archive failure, carrying how many messages were fully
/// processed before it. The partial count is part of the contract: callers
/// report it even when the operation stops early.
#[derive(Debug)]
pub struct TransferError {
    pub processed: usize,
    pub kind: TransferFailure,
}

#[derive(Debug)]
pub enum TransferFailure {
    /// A backend call failed outright.
    Transport(anyhow::Error),
    /// The batch send reported rejected entries; nothing was deleted from
    /// source, so the rejected messages reappear after their timeout.
    SendRejected { failed: usize },
    /// Destination accepted the batch but some source deletions failed;
    /// those messages are now duplicated, the at-least-once cost.
    DeleteRejected { failed: usize },
    /// A message could not be written to the archive directory.
    Persist { path: PathBuf, source: anyhow::Error },
    /// The SDK refused a batch entry built from a received message.
    BuildEntry(String),
}

impl TransferError {
    pub(crate) fn transport(processed: usize, source: anyhow::Error) -> Self {
        Self {
            processed,
            kind: TransferFailure::Transport(source),
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TransferFailure::Transport(source) => write!(f, "{:#}", source),
            TransferFailure::SendRejected { failed } => {
                write!(f, "failed to send {} messages", failed)
            }
            TransferFailure::DeleteRejected { failed } => {
                write!(f, "failed to delete {} messages", failed)
            }
            TransferFailure::Persist { path, source } => {
                write!(f, "cannot write {}: {:#}", path.display(), source)
            }
            TransferFailure::BuildEntry(message) => {
                write!(f, "failed to build batch entry: {}", message)
            }
        }
    }
}

impl std::error::Error for TransferError {}

/// Receives one batch from `queue_url` with full attribute and
/// message-attribute retrieval.
pub(crate) async fn receive_batch(
    client: &aws_sdk_sqs::Client,
    queue_url: &str,
    visibility_timeout: i32,
) -> anyhow::Result<Vec<Message>> {
    let output = client
        .receive_message()
        .queue_url(queue_url)
        .max_number_of_messages(RECEIVE_BATCH_SIZE)
        .visibility_timeout(visibility_timeout)
        .message_attribute_names("All")
        .message_system_attribute_names(MessageSystemAttributeName::All)
        .send()
        .await
        .context("ReceiveMessage failed")?;

    Ok(output.messages.unwrap_or_default())
}

impl QueueClient {
    /// Moves up to `limit` messages (0 = unlimited) from `source` to
    /// `destination`. Either endpoint may be a queue URL or a short name.
    ///
    /// Each iteration receives a batch, forwards it, and deletes it from
    /// source only after the destination confirmed every entry. Messages in
    /// a rejected batch are never deleted; they become visible again once
    /// their visibility timeout expires.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] carrying the count moved before the
    /// failure.
    pub async fn move_messages(
        &self,
        source: &str,
        destination: &str,
        limit: usize,
    ) -> Result<usize, TransferError> {
        let src = self
            .endpoint(source)
            .await
            .map_err(|e| TransferError::transport(0, e))?;
        let dst = self
            .endpoint(destination)
            .await
            .map_err(|e| TransferError::transport(0, e))?;

        let mut moved = 0usize;
        loop {
            let received = receive_batch(&self.client, src.as_str(), MOVE_VISIBILITY_TIMEOUT)
                .await
                .map_err(|e| TransferError::transport(moved, e))?;

            if received.is_empty() || (limit > 0 && moved >= limit) {
                return Ok(moved);
            }

            let batch = truncate_to_allowance(received, moved, limit);
            if batch.is_empty() {
                return Ok(moved);
            }

            let entries = send_entries(&batch).map_err(|kind| TransferError {
                processed: moved,
                kind,
            })?;

            let send = self
                .client
                .send_message_batch()
                .queue_url(dst.as_str())
                .set_entries(Some(entries))
                .send()
                .await
                .context("SendMessageBatch failed")
                .map_err(|e| TransferError::transport(moved, e))?;

            if !send.failed.is_empty() {
                log::warn!(
                    "destination rejected {} of {} entries",
                    send.failed.len(),
                    batch.len()
                );
                return Err(TransferError {
                    processed: moved,
                    kind: TransferFailure::SendRejected {
                        failed: send.failed.len(),
                    },
                });
            }

            // Delete only once the whole batch is confirmed in destination.
            let entries = delete_entries(&batch).map_err(|kind| TransferError {
                processed: moved,
                kind,
            })?;

            let deleted = self
                .client
                .delete_message_batch()
                .queue_url(src.as_str())
                .set_entries(Some(entries))
                .send()
                .await
                .context("DeleteMessageBatch failed")
                .map_err(|e| TransferError::transport(moved, e))?;

            if !deleted.failed.is_empty() {
                log::warn!(
                    "source kept {} of {} entries",
                    deleted.failed.len(),
                    batch.len()
                );
                return Err(TransferError {
                    processed: moved,
                    kind: TransferFailure::DeleteRejected {
                        failed: deleted.failed.len(),
                    },
                });
            }

            moved += batch.len();
            log::debug!("moved batch of {}, {} total", batch.len(), moved);
        }
    }
}

/// Caps a received batch to the remaining allowance under `limit`.
/// A `limit` of zero means unlimited.
pub(crate) fn truncate_to_allowance(
    batch: Vec<Message>,
    processed: usize,
    limit: usize,
) -> Vec<Message> {
    if limit == 0 {
        return batch;
    }
    let allowance = limit.saturating_sub(processed);
    batch.into_iter().take(allowance).collect()
}

/// Builds forward entries, reusing each message id as the entry's
/// correlation id and carrying FIFO group and deduplication ids through.
fn send_entries(
    messages: &[Message],
) -> Result<Vec<SendMessageBatchRequestEntry>, TransferFailure> {
    messages
        .iter()
        .map(|message| {
            let mut entry = SendMessageBatchRequestEntry::builder()
                .id(message.message_id().unwrap_or_default())
                .message_body(message.body().unwrap_or_default())
                .set_message_attributes(message.message_attributes.clone());

            if let Some(attributes) = message.attributes() {
                if let Some(group) = attributes.get(&MessageSystemAttributeName::MessageGroupId) {
                    entry = entry.message_group_id(group);
                }
                if let Some(dedup) =
                    attributes.get(&MessageSystemAttributeName::MessageDeduplicationId)
                {
                    entry = entry.message_deduplication_id(dedup);
                }
            }

            entry
                .build()
                .map_err(|e| TransferFailure::BuildEntry(e.to_string()))
        })
        .collect()
}

/// Builds delete entries acknowledging each message by receipt handle.
pub(crate) fn delete_entries(
    messages: &[Message],
) -> Result<Vec<DeleteMessageBatchRequestEntry>, TransferFailure> {
    messages
        .iter()
        .map(|message| {
            DeleteMessageBatchRequestEntry::builder()
                .id(message.message_id().unwrap_or_default())
                .receipt_handle(message.receipt_handle().unwrap_or_default())
                .build()
                .map_err(|e| TransferFailure::BuildEntry(e.to_string()))
        })
        .collect()
}
