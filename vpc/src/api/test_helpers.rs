//! Test helpers for the VPC API

#[cfg(test)]
use super::{Client, RetryConfig};

/// Client against a mock server with retries shortened to milliseconds
#[cfg(test)]
pub fn create_test_client(url: &str) -> Client {
    Client::with_config(
        url,
        "test-token",
        super::DEFAULT_API_VERSION,
        RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            timeout_seconds: 5,
        },
    )
    .unwrap()
}
