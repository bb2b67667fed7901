use aws_sdk_sqs::config::Credentials;

pub fn local_config(endpoint_url: &str, region: Option<&'static str>) -> aws_config::ConfigLoader {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .endpoint_url(endpoint_url)
        .region(region.unwrap_or("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "static"))
}

/// Client pointed at a port nothing listens on, with retries disabled so
/// failure paths return quickly.
pub async fn unreachable_client() -> crate::QueueClient {
    let config = local_config("http://127.0.0.1:1", None)
        .retry_config(aws_config::retry::RetryConfig::disabled())
        .load()
        .await;
    crate::QueueClient::from_config(config)
}
