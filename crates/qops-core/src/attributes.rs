//! Per-queue attribute snapshots and the concurrent aggregation fan-out.

use crate::queue::{QueueArn, QueueClient};
use anyhow::Context;
use aws_sdk_sqs::types::QueueAttributeName;
use std::collections::HashMap;
use std::fmt;

/// Display-ready snapshot of one queue's attributes.
///
/// Numeric fields read as zero when the backend omits the raw attribute or
/// returns something unparsable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QueueAttributes {
    pub name: String,
    /// Approximate count of messages available for receive.
    pub visible: u64,
    /// Approximate count of received-but-not-deleted messages.
    pub in_flight: u64,
    /// Visibility timeout in seconds.
    pub visibility_timeout: u64,
    /// Dead-letter target, rendered as a short name when it lives in the
    /// queue's own account and region, otherwise as the full ARN. Empty
    /// when the queue has no redrive policy.
    pub dead_letter_target: String,
    /// Receives before a message is dead-lettered; zero without a policy.
    pub max_receive_count: u64,
}

impl QueueAttributes {
    /// Normalizes a raw `GetQueueAttributes` map into a record.
    pub fn from_attributes(name: &str, attributes: &HashMap<QueueAttributeName, String>) -> Self {
        let mut out = Self {
            name: name.to_string(),
            visible: numeric_or_zero(attributes, QueueAttributeName::ApproximateNumberOfMessages),
            in_flight: numeric_or_zero(
                attributes,
                QueueAttributeName::ApproximateNumberOfMessagesNotVisible,
            ),
            visibility_timeout: numeric_or_zero(attributes, QueueAttributeName::VisibilityTimeout),
            dead_letter_target: String::new(),
            max_receive_count: 0,
        };

        if let Some(raw) = attributes.get(&QueueAttributeName::RedrivePolicy) {
            if let Ok(policy) = serde_json::from_str::<RedrivePolicy>(raw) {
                let queue_arn = attributes
                    .get(&QueueAttributeName::QueueArn)
                    .map(String::as_str)
                    .unwrap_or_default();
                out.dead_letter_target = policy.target_label(queue_arn);
                out.max_receive_count = policy.max_receive_count;
            }
        }

        out
    }
}

/// Tab-separated `NAME MESSAGES IN-FLIGHT TIMEOUT MAX DEAD-LETTER-TARGET`.
impl fmt::Display for QueueAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.name,
            self.visible,
            self.in_flight,
            self.visibility_timeout,
            self.max_receive_count,
            self.dead_letter_target
        )
    }
}

/// Missing or unparsable numeric attributes silently read as zero.
fn numeric_or_zero(attributes: &HashMap<QueueAttributeName, String>, key: QueueAttributeName) -> u64 {
    attributes
        .get(&key)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0)
}

/// A queue's dead-letter forwarding policy, as stored in the JSON-encoded
/// `RedrivePolicy` attribute.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedrivePolicy {
    dead_letter_target_arn: String,
    max_receive_count: u64,
}

impl RedrivePolicy {
    /// Targets within the queue's own account and region render as their
    /// short name; everything else renders as the full ARN, verbatim.
    fn target_label(&self, queue_arn: &str) -> String {
        if let (Some(own), Some(target)) = (
            QueueArn::parse(queue_arn),
            QueueArn::parse(&self.dead_letter_target_arn),
        ) {
            if own.account == target.account && own.region == target.region {
                return target.resource.to_string();
            }
        }
        self.dead_letter_target_arn.clone()
    }
}

/// Failure to produce a record for one requested queue name.
#[derive(Debug)]
pub struct FetchFailure {
    pub name: String,
    pub source: anyhow::Error,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.name, self.source)
    }
}

/// Outcome of an aggregation where at least one queue failed.
///
/// Carries every failure, plus the records that did resolve (already
/// sorted by name) so callers never lose partial results.
#[derive(Debug)]
pub struct AggregateError {
    pub records: Vec<QueueAttributes>,
    pub failures: Vec<FetchFailure>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to fetch attributes for {} of {} queues",
            self.failures.len(),
            self.failures.len() + self.records.len()
        )
    }
}

impl std::error::Error for AggregateError {}

impl QueueClient {
    /// Fetches attribute records for every named queue concurrently.
    ///
    /// One task per name; each task sends exactly one outcome, success or
    /// failure, into a shared result channel. The collector drains the
    /// channel until every sender is gone, so the call always returns once
    /// all tasks finish; a failed resolution can never wedge it. Records
    /// come back sorted by queue name.
    ///
    /// # Errors
    ///
    /// When any queue fails, returns [`AggregateError`] carrying the
    /// failures alongside the records that did succeed.
    pub async fn fetch_many(
        &self,
        names: &[String],
    ) -> Result<Vec<QueueAttributes>, AggregateError> {
        let (tx, mut rx) = tokio::sync::mpsc::channel(names.len().max(1));

        for name in names {
            let client = self.clone();
            let name = name.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = match client.fetch_one(&name).await {
                    Ok(record) => Ok(record),
                    Err(source) => Err(FetchFailure { name, source }),
                };
                // Only fails when the collector is gone, and it never is.
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut records = Vec::with_capacity(names.len());
        let mut failures = Vec::new();
        while let Some(outcome) = rx.recv().await {
            match outcome {
                Ok(record) => records.push(record),
                Err(failure) => failures.push(failure),
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));

        if failures.is_empty() {
            Ok(records)
        } else {
            Err(AggregateError { records, failures })
        }
    }

    /// Resolves one queue name and normalizes its full attribute set.
    pub async fn fetch_one(&self, name: &str) -> anyhow::Result<QueueAttributes> {
        let url = self.resolve(name).await?;

        let output = self
            .client
            .get_queue_attributes()
            .queue_url(url.as_str())
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
            .context("GetQueueAttributes failed")?;

        let attributes = output.attributes.unwrap_or_default();
        Ok(QueueAttributes::from_attributes(name, &attributes))
    }
}
