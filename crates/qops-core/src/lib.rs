//! # qops-core
//!
//! Core library for operating AWS SQS queues.
//!
//! This crate provides the fundamental types and operations for working
//! with SQS: listing queues, aggregating per-queue attributes, moving
//! messages between queues in batches, archiving messages to disk, and
//! publishing new messages.
//!
//! ## Features
//!
//! - **Queue directory**: list queues and resolve short names to URLs
//! - **Attribute aggregation**: concurrent per-queue attribute fan-out
//!   yielding a sorted, display-ready record set
//! - **Batch transfer**: receive/send/delete loops that move messages
//!   between queues with at-least-once semantics
//! - **Archival**: one JSON file per downloaded message, named by id
//! - **Publishing**: single messages with string-typed attributes
//!
//! ## Example
//!
//! ```no_run
//! use qops::QueueClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Load AWS configuration
//! let config = aws_config::from_env().load().await;
//!
//! // Create a client
//! let client = QueueClient::from_config(config);
//!
//! // List all queues
//! for url in client.list().await? {
//!     println!("Queue: {}", url);
//! }
//!
//! // Move up to 100 messages out of a dead-letter queue
//! let moved = client.move_messages("orders-dlq", "orders", 100).await?;
//! println!("Moved {} messages", moved);
//! # Ok(())
//! # }
//! ```

mod archive;
mod attributes;
mod publish;
mod queue;
mod transfer;

#[cfg(test)]
mod test_utils;

pub use archive::{ArchivedAttributeValue, ArchivedMessage};
pub use attributes::{AggregateError, FetchFailure, QueueAttributes};
pub use publish::PublishError;
pub use queue::{is_queue_url, QueueClient, QueueUrl};
pub use transfer::{TransferError, TransferFailure};
