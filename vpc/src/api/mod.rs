pub mod bare_metal_servers;
pub mod client;
pub mod common;
pub mod error;
pub mod instances;
pub mod load_balancers;
pub mod subnets;
pub mod test_helpers;
pub mod virtual_network_interfaces;

pub use client::{Client, RetryConfig, DEFAULT_API_VERSION};
pub use error::ApiError;
