//! SQS client wrapper, queue identifiers and name resolution.

use anyhow::Context;
use aws_config::SdkConfig;
use aws_sdk_sqs as sqs;
use std::fmt;

/// A queue URL as issued by SQS.
///
/// The URL is the backend's canonical identifier for a queue, but its last
/// path segment doubles as the queue's short display name.
///
/// # Example
///
/// ```
/// use qops::QueueUrl;
///
/// let url = QueueUrl::new("https://sqs.us-east-1.amazonaws.com/123456789012/orders");
/// assert_eq!(url.name(), "orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct QueueUrl(String);

impl QueueUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The queue's short display name: the last `/`-separated segment.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(at) => &self.0[at + 1..],
            None => &self.0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QueueUrl {
    fn from(url: String) -> Self {
        Self(url)
    }
}

impl AsRef<str> for QueueUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Region, account and resource segments of a queue ARN.
///
/// Queue ARNs carry six `:`-separated segments:
/// `arn:aws:sqs:<region>:<account>:<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueArn<'a> {
    pub region: &'a str,
    pub account: &'a str,
    pub resource: &'a str,
}

impl<'a> QueueArn<'a> {
    /// Splits a reference into its canonical segments. Returns `None` for
    /// anything that does not have exactly six.
    pub fn parse(arn: &'a str) -> Option<Self> {
        let parts: Vec<&str> = arn.split(':').collect();
        if parts.len() != 6 {
            return None;
        }
        Some(Self {
            region: parts[3],
            account: parts[4],
            resource: parts[5],
        })
    }
}

/// Queue endpoint arguments that are already URL-shaped are used verbatim;
/// anything else is treated as a short name to resolve.
pub fn is_queue_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Client for operating SQS queues.
///
/// Wraps the SDK client together with its configuration and provides the
/// queue directory (list, resolve), attribute aggregation, batch transfer,
/// archival and publishing operations.
///
/// # Example
///
/// ```no_run
/// use qops::QueueClient;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = aws_config::from_env().load().await;
/// let client = QueueClient::from_config(config);
///
/// for url in client.list().await? {
///     println!("{}", url.name());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueueClient {
    /// The AWS SDK configuration used for SQS operations
    pub config: SdkConfig,
    /// The SQS client instance
    pub client: sqs::Client,
}

impl QueueClient {
    /// Creates a client from a pre-built AWS SDK config.
    ///
    /// The caller decides credentials and endpoint, which keeps LocalStack
    /// and production setups symmetric.
    pub fn from_config(config: SdkConfig) -> Self {
        let client = sqs::Client::new(&config);
        Self { config, client }
    }

    /// Lists queue URLs in the order the backend returns them.
    ///
    /// Bounded to the first 1000 queues per call.
    ///
    /// # Errors
    ///
    /// Returns an error if the `ListQueues` call fails.
    pub async fn list(&self) -> anyhow::Result<Vec<QueueUrl>> {
        // todo: page with next_token when an account holds more than 1000 queues
        let output = self
            .client
            .list_queues()
            .max_results(1000)
            .send()
            .await
            .context("ListQueues failed")?;

        Ok(output
            .queue_urls
            .unwrap_or_default()
            .into_iter()
            .map(QueueUrl::new)
            .collect())
    }

    /// Resolves a queue's short name to its URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue does not exist or the `GetQueueUrl`
    /// call fails.
    pub async fn resolve(&self, name: &str) -> anyhow::Result<QueueUrl> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .context("GetQueueUrl failed")?;

        let url = output.queue_url.context("GetQueueUrl returned no URL")?;
        Ok(QueueUrl::new(url))
    }

    /// Accepts either a queue URL or a short name, resolving the latter.
    pub(crate) async fn endpoint(&self, queue: &str) -> anyhow::Result<QueueUrl> {
        if is_queue_url(queue) {
            Ok(QueueUrl::new(queue))
        } else {
            self.resolve(queue).await
        }
    }
}
