//! Shared fixtures for unit tests

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::api::test_helpers::create_test_client;
use crate::wait::PollConfig;
use crate::VpcProviderData;

/// Route `tracing` output through the test harness; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Provider data against a mock server, polling every millisecond
pub fn provider_data(url: &str) -> VpcProviderData {
    init_tracing();
    VpcProviderData::with_poll(
        create_test_client(url),
        PollConfig {
            interval: Duration::from_millis(1),
        },
    )
}
