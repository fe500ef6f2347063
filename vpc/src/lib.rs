pub mod api;
pub mod data_sources;
pub mod error;
pub mod ids;
pub mod locks;
pub mod provider_data;
pub mod resources;
pub mod wait;

#[cfg(test)]
pub mod test_helpers;

pub use provider_data::VpcProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{DataSourceFactory, ResourceFactory};
use tfplug::resource::ConfigurableResource;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::NumberRangeValidator;
use tfplug::{ConfigureProviderRequest, ConfigureProviderResponse, Provider};

use crate::api::{Client, RetryConfig, DEFAULT_API_VERSION};

#[derive(Default)]
pub struct VpcProvider;

impl VpcProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

fn config_string(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    config
        .get_optional_string(&AttributePath::new(name))
        .ok()
        .flatten()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var(env).ok().filter(|s| !s.is_empty()))
}

fn config_retries(config: &DynamicValue) -> u32 {
    config
        .get_optional_number(&AttributePath::new("max_retries"))
        .ok()
        .flatten()
        .map(|n| n as u32)
        .or_else(|| {
            std::env::var("VPC_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
        })
        .unwrap_or_else(|| RetryConfig::default().max_retries)
}

#[async_trait]
impl Provider for VpcProvider {
    fn type_name(&self) -> &str {
        "vpc"
    }

    async fn schema(&self, _ctx: Context) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages VPC networking: load balancers, reserved IPs and network attachments")
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description("Regional VPC API endpoint. Falls back to VPC_ENDPOINT")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_token", AttributeType::String)
                    .description("Bearer token. Falls back to VPC_API_TOKEN")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_version", AttributeType::String)
                    .description("Dated API version sent with every request")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_retries", AttributeType::Number)
                    .description("Retries for throttled or unavailable API calls")
                    .optional()
                    .validator(NumberRangeValidator {
                        min: Some(0.0),
                        max: Some(10.0),
                    })
                    .build(),
            )
            .build()
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = &request.config;
        let endpoint = config_string(config, "endpoint", "VPC_ENDPOINT");
        let api_token = config_string(config, "api_token", "VPC_API_TOKEN");
        let api_version = config_string(config, "api_version", "VPC_API_VERSION")
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let mut diagnostics = vec![];
        let (endpoint, api_token) = match (endpoint, api_token) {
            (Some(endpoint), Some(api_token)) => (endpoint, api_token),
            (None, _) => {
                diagnostics.push(Diagnostic::error(
                    "endpoint is required (set in provider config or VPC_ENDPOINT env var)",
                    "",
                ));
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
            (_, None) => {
                diagnostics.push(Diagnostic::error(
                    "api_token is required (set in provider config or VPC_API_TOKEN env var)",
                    "",
                ));
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
        };

        let retry = RetryConfig {
            max_retries: config_retries(config),
            ..RetryConfig::default()
        };
        match Client::with_config(&endpoint, &api_token, &api_version, retry) {
            Ok(client) => {
                tracing::info!(
                    "Configured VPC provider for {} (API version {})",
                    endpoint,
                    api_version
                );
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: Some(Arc::new(VpcProviderData::new(client))),
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert("vpc_lb_listener".to_string(), || {
            Box::new(resources::LbListenerResource::new()) as Box<dyn ConfigurableResource>
        });
        factories.insert("vpc_lb_listener_policy".to_string(), || {
            Box::new(resources::LbListenerPolicyResource::new()) as Box<dyn ConfigurableResource>
        });
        factories.insert("vpc_lb_pool".to_string(), || {
            Box::new(resources::LbPoolResource::new()) as Box<dyn ConfigurableResource>
        });
        factories.insert("vpc_lb_pool_member".to_string(), || {
            Box::new(resources::LbPoolMemberResource::new()) as Box<dyn ConfigurableResource>
        });
        factories.insert("vpc_subnet_reserved_ip".to_string(), || {
            Box::new(resources::SubnetReservedIpResource::new()) as Box<dyn ConfigurableResource>
        });
        factories.insert("vpc_virtual_network_interface".to_string(), || {
            Box::new(resources::VirtualNetworkInterfaceResource::new())
                as Box<dyn ConfigurableResource>
        });
        factories.insert("vpc_instance_network_attachment".to_string(), || {
            Box::new(resources::InstanceNetworkAttachmentResource::new())
                as Box<dyn ConfigurableResource>
        });
        factories.insert("vpc_bare_metal_server_network_interface".to_string(), || {
            Box::new(resources::BareMetalServerNetworkInterfaceResource::new())
                as Box<dyn ConfigurableResource>
        });
        factories.insert("vpc_bare_metal_server_network_attachment".to_string(), || {
            Box::new(resources::BareMetalServerNetworkAttachmentResource::new())
                as Box<dyn ConfigurableResource>
        });
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert("vpc_lb".to_string(), || {
            Box::new(data_sources::LbDataSource::new()) as Box<dyn DataSourceWithConfigure>
        });
        factories.insert("vpc_subnet_reserved_ips".to_string(), || {
            Box::new(data_sources::SubnetReservedIpsDataSource::new())
                as Box<dyn DataSourceWithConfigure>
        });
        factories.insert("vpc_virtual_network_interfaces".to_string(), || {
            Box::new(data_sources::VirtualNetworkInterfacesDataSource::new())
                as Box<dyn DataSourceWithConfigure>
        });
        factories.insert("vpc_bare_metal_server_network_interfaces".to_string(), || {
            Box::new(data_sources::BareMetalServerNetworkInterfacesDataSource::new())
                as Box<dyn DataSourceWithConfigure>
        });
        factories
    }
}
