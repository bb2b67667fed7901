//! Archiving queue messages to local JSON files.

use crate::queue::QueueClient;
use crate::transfer::{
    delete_entries, receive_batch, truncate_to_allowance, TransferError, TransferFailure,
};
use anyhow::Context;
use aws_sdk_sqs::types::Message;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Visibility window while a batch is being persisted.
const ARCHIVE_VISIBILITY_TIMEOUT: i32 = 2;

/// On-disk representation of an archived message.
///
/// Mirrors the wire fields of a received message so an archive file can be
/// inspected or replayed later.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArchivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    /// System attributes (sent timestamp, receive count, FIFO ids, ...).
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Caller-supplied message attributes.
    #[serde(default)]
    pub message_attributes: HashMap<String, ArchivedAttributeValue>,
}

/// A message attribute as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArchivedAttributeValue {
    pub data_type: String,
    pub string_value: Option<String>,
}

impl ArchivedMessage {
    pub fn from_message(message: &Message) -> Self {
        Self {
            message_id: message.message_id().unwrap_or_default().to_string(),
            receipt_handle: message.receipt_handle().unwrap_or_default().to_string(),
            body: message.body().unwrap_or_default().to_string(),
            attributes: message
                .attributes()
                .map(|attributes| {
                    attributes
                        .iter()
                        .map(|(name, value)| (name.as_str().to_string(), value.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            message_attributes: message
                .message_attributes()
                .map(|attributes| {
                    attributes
                        .iter()
                        .map(|(name, value)| {
                            (
                                name.clone(),
                                ArchivedAttributeValue {
                                    data_type: value.data_type().to_string(),
                                    string_value: value.string_value().map(str::to_string),
                                },
                            )
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Archive file name: the message id with a `.json` extension.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.message_id)
    }
}

impl QueueClient {
    /// Downloads up to `limit` messages (0 = unlimited) from `source` into
    /// `dir`, one JSON file per message, named by message id. With `delete`
    /// set, each fully persisted batch is removed from the queue; otherwise
    /// messages reappear once their visibility timeout expires.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] carrying the count persisted before the
    /// failure. Files written before a failure stay in place.
    pub async fn download(
        &self,
        source: &str,
        dir: impl AsRef<Path>,
        limit: usize,
        delete: bool,
    ) -> Result<usize, TransferError> {
        let src = self
            .endpoint(source)
            .await
            .map_err(|e| TransferError::transport(0, e))?;
        let dir = dir.as_ref();

        let mut downloaded = 0usize;
        loop {
            let received = receive_batch(&self.client, src.as_str(), ARCHIVE_VISIBILITY_TIMEOUT)
                .await
                .map_err(|e| TransferError::transport(downloaded, e))?;

            if received.is_empty() || (limit > 0 && downloaded >= limit) {
                return Ok(downloaded);
            }

            let batch = truncate_to_allowance(received, downloaded, limit);
            if batch.is_empty() {
                return Ok(downloaded);
            }

            // Persist sequentially; a failure keeps the files already
            // written and reports the count persisted so far.
            let mut persisted = downloaded;
            for message in &batch {
                let record = ArchivedMessage::from_message(message);
                let path = dir.join(record.file_name());
                if let Err(source) = write_record(&path, &record) {
                    return Err(TransferError {
                        processed: persisted,
                        kind: TransferFailure::Persist {
                            path,
                            source,
                        },
                    });
                }
                persisted += 1;
            }

            if delete {
                let entries = delete_entries(&batch).map_err(|kind| TransferError {
                    processed: persisted,
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
                    .map_err(|e| TransferError::transport(persisted, e))?;

                if !deleted.failed.is_empty() {
                    return Err(TransferError {
                        processed: persisted,
                        kind: TransferFailure::DeleteRejected {
                            failed: deleted.failed.len(),
                        },
                    });
                }
            }

            downloaded = persisted;
            log::debug!("archived batch of {}, {} total", batch.len(), downloaded);
        }
    }
}

fn write_record(path: &Path, record: &ArchivedMessage) -> anyhow::Result<()> {
    let file = File::create(path).context("cannot create file")?;
    serde_json::to_writer(file, record).context("failed to encode message")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sqs::types::{MessageAttributeValue, MessageSystemAttributeName};

    fn sample_message() -> Message {
        let attribute = MessageAttributeValue::builder()
            .data_type("String")
            .string_value("42")
            .build()
            .unwrap();
        Message::builder()
            .message_id("7e3b9d2a")
            .receipt_handle("AQEBz...")
            .body(r#"{"order":17}"#)
            .attributes(MessageSystemAttributeName::MessageGroupId, "orders")
            .message_attributes("retries", attribute)
            .build()
    }

    #[test]
    fn archived_record_carries_all_wire_fields() {
        let record = ArchivedMessage::from_message(&sample_message());

        assert_eq!(record.message_id, "7e3b9d2a");
        assert_eq!(record.receipt_handle, "AQEBz...");
        assert_eq!(record.body, r#"{"order":17}"#);
        assert_eq!(record.attributes["MessageGroupId"], "orders");
        assert_eq!(record.message_attributes["retries"].data_type, "String");
        assert_eq!(
            record.message_attributes["retries"].string_value.as_deref(),
            Some("42")
        );
    }

    #[test]
    fn file_name_is_the_message_id_dot_json() {
        let record = ArchivedMessage::from_message(&sample_message());
        assert_eq!(record.file_name(), "7e3b9d2a.json");
    }

    #[test]
    fn archive_files_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let record = ArchivedMessage::from_message(&sample_message());
        let path = dir.path().join(record.file_name());

        write_record(&path, &record).unwrap();

        let reread: ArchivedMessage =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(reread, record);
    }

    #[test]
    fn writing_into_a_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let record = ArchivedMessage::from_message(&sample_message());
        let path = dir.path().join("no-such-subdir").join(record.file_name());

        assert!(write_record(&path, &record).is_err());
    }

    #[tokio::test]
    async fn unreachable_source_fails_with_zero_downloaded() {
        let client = crate::test_utils::unreachable_client().await;
        let dir = tempfile::tempdir().unwrap();
        let error = client
            .download("missing-queue", dir.path(), 0, false)
            .await
            .expect_err("endpoint is unreachable");
        assert_eq!(error.processed, 0);
    }
}
