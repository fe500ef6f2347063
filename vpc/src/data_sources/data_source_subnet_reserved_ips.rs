//! All reserved IPs of one subnet

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};

use crate::api::subnets::ReservedIp;
use crate::data_sources::list_of;
use crate::error::{ApiResultExt, Result};
use crate::resources::common::*;
use crate::VpcProviderData;

#[derive(Default)]
pub struct SubnetReservedIpsDataSource {
    provider_data: Option<VpcProviderData>,
}

impl SubnetReservedIpsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for SubnetReservedIpsDataSource {
    fn type_name(&self) -> &str {
        "vpc_subnet_reserved_ips"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let reserved_ip = list_of(&[
            ("reserved_ip", AttributeType::String),
            ("address", AttributeType::String),
            ("name", AttributeType::String),
            ("auto_delete", AttributeType::Bool),
            ("lifecycle_state", AttributeType::String),
            ("owner", AttributeType::String),
            ("target", AttributeType::String),
            ("href", AttributeType::String),
            ("created_at", AttributeType::String),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Lists the reserved IPs of a subnet")
            .attribute(
                AttributeBuilder::new("subnet", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("reserved_ips", reserved_ip).computed().build())
            .attribute(AttributeBuilder::new("total_count", AttributeType::Number).computed().build())
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![not_configured()],
            };
        };

        match read_reserved_ips(data, &request.config).await {
            Ok(state) => ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            },
            Err(e) => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![e.to_diagnostic("Failed to list subnet reserved IPs")],
            },
        }
    }
}

async fn read_reserved_ips(data: &VpcProviderData, config: &DynamicValue) -> Result<DynamicValue> {
    let subnet_id = required_string(config, "subnet")?;

    let reserved_ips = data
        .client
        .subnets()
        .reserved_ips(&subnet_id)
        .list_all()
        .await
        .context(format!("subnet {}", subnet_id))?;
    tracing::debug!("Subnet {} has {} reserved IPs", subnet_id, reserved_ips.len());

    let mut state = config.clone();
    put_string(&mut state, "id", subnet_id.as_str());
    put_i64(&mut state, "total_count", reserved_ips.len() as i64);
    let _ = state.set_list(
        &path("reserved_ips"),
        reserved_ips.iter().map(reserved_ip_object).collect(),
    );
    Ok(state)
}

fn reserved_ip_object(ip: &ReservedIp) -> Dynamic {
    let mut object = HashMap::new();
    object.insert("reserved_ip".to_string(), Dynamic::from(ip.id.as_str()));
    object.insert("address".to_string(), Dynamic::from(ip.address.as_str()));
    object.insert("name".to_string(), Dynamic::from(ip.name.as_str()));
    object.insert("auto_delete".to_string(), Dynamic::from(ip.auto_delete));
    object.insert(
        "lifecycle_state".to_string(),
        Dynamic::from(ip.lifecycle_state.as_str()),
    );
    object.insert("owner".to_string(), Dynamic::from(ip.owner.clone()));
    object.insert(
        "target".to_string(),
        Dynamic::from(ip.target.as_ref().map(|t| t.id.clone())),
    );
    object.insert("href".to_string(), Dynamic::from(ip.href.clone()));
    object.insert(
        "created_at".to_string(),
        Dynamic::from(ip.created_at.map(|t| t.to_rfc3339())),
    );
    Dynamic::Map(object)
}

#[async_trait]
impl DataSourceWithConfigure for SubnetReservedIpsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let (provider_data, diagnostics) = configure_provider_data(request.provider_data);
        self.provider_data = provider_data;
        ConfigureDataSourceResponse { diagnostics }
    }
}
