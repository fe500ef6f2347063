//! Every virtual network interface in the account, optionally narrowed to
//! one resource group

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

use crate::api::virtual_network_interfaces::VirtualNetworkInterface;
use crate::data_sources::list_of;
use crate::error::{ApiResultExt, Result};
use crate::resources::common::*;
use crate::resources::network::resource_virtual_network_interface::{target_object, TARGET_FIELDS};
use crate::VpcProviderData;

#[derive(Default)]
pub struct VirtualNetworkInterfacesDataSource {
    provider_data: Option<VpcProviderData>,
}

impl VirtualNetworkInterfacesDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for VirtualNetworkInterfacesDataSource {
    fn type_name(&self) -> &str {
        "vpc_virtual_network_interfaces"
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
        let interfaces = list_of(&[
            ("id", AttributeType::String),
            ("name", AttributeType::String),
            ("crn", AttributeType::String),
            ("lifecycle_state", AttributeType::String),
            ("allow_ip_spoofing", AttributeType::Bool),
            ("auto_delete", AttributeType::Bool),
            ("enable_infrastructure_nat", AttributeType::Bool),
            ("protocol_state_filtering_mode", AttributeType::String),
            ("primary_ip", object_type(&["address", "reserved_ip", "name"])),
            ("subnet", AttributeType::String),
            (
                "security_groups",
                AttributeType::List(Box::new(AttributeType::String)),
            ),
            ("vpc", AttributeType::String),
            ("zone", AttributeType::String),
            ("resource_group", AttributeType::String),
            ("mac_address", AttributeType::String),
            ("target", object_type(TARGET_FIELDS)),
            ("created_at", AttributeType::String),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Lists virtual network interfaces")
            .attribute(
                AttributeBuilder::new("resource_group", AttributeType::String)
                    .description("Only list interfaces in this resource group")
                    .optional()
                    .build(),
            )
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("virtual_network_interfaces", interfaces)
                    .computed()
                    .build(),
            )
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

        match read_interfaces(data, &request.config).await {
            Ok(state) => ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            },
            Err(e) => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![e.to_diagnostic("Failed to list virtual network interfaces")],
            },
        }
    }
}

async fn read_interfaces(data: &VpcProviderData, config: &DynamicValue) -> Result<DynamicValue> {
    let resource_group = config.get_optional_string(&path("resource_group"))?;

    let interfaces = data
        .client
        .virtual_network_interfaces()
        .list_all(resource_group.as_deref())
        .await
        .context("virtual network interfaces")?;

    let mut state = config.clone();
    put_string(
        &mut state,
        "id",
        resource_group.unwrap_or_else(|| "virtual_network_interfaces".to_string()),
    );
    let _ = state.set_list(
        &path("virtual_network_interfaces"),
        interfaces.iter().map(interface_object).collect(),
    );
    Ok(state)
}

fn fields_to_map(fields: Vec<(&str, Dynamic)>) -> Dynamic {
    Dynamic::Map(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn interface_object(vni: &VirtualNetworkInterface) -> Dynamic {
    let mut object: HashMap<String, Dynamic> = HashMap::new();
    object.insert("id".into(), Dynamic::from(vni.id.as_str()));
    object.insert("name".into(), Dynamic::from(vni.name.as_str()));
    object.insert("crn".into(), Dynamic::from(vni.crn.clone()));
    object.insert("lifecycle_state".into(), Dynamic::from(vni.lifecycle_state.as_str()));
    object.insert("allow_ip_spoofing".into(), Dynamic::from(vni.allow_ip_spoofing));
    object.insert("auto_delete".into(), Dynamic::from(vni.auto_delete));
    object.insert(
        "enable_infrastructure_nat".into(),
        Dynamic::from(vni.enable_infrastructure_nat),
    );
    object.insert(
        "protocol_state_filtering_mode".into(),
        Dynamic::from(vni.protocol_state_filtering_mode.clone()),
    );
    object.insert(
        "primary_ip".into(),
        vni.primary_ip.as_ref().map_or(Dynamic::Null, |ip| {
            fields_to_map(vec![
                ("address", Dynamic::from(ip.address.as_str())),
                ("reserved_ip", Dynamic::from(ip.id.as_str())),
                ("name", opt_dynamic(ip.name.as_deref())),
            ])
        }),
    );
    object.insert(
        "subnet".into(),
        Dynamic::from(vni.subnet.as_ref().map(|s| s.id.clone())),
    );
    object.insert(
        "security_groups".into(),
        Dynamic::from(
            vni.security_groups
                .iter()
                .map(|sg| sg.id.clone())
                .collect::<Vec<_>>(),
        ),
    );
    object.insert("vpc".into(), Dynamic::from(vni.vpc.as_ref().map(|v| v.id.clone())));
    object.insert(
        "zone".into(),
        Dynamic::from(vni.zone.as_ref().map(|z| z.name.clone())),
    );
    object.insert(
        "resource_group".into(),
        Dynamic::from(vni.resource_group.as_ref().map(|g| g.id.clone())),
    );
    object.insert("mac_address".into(), Dynamic::from(vni.mac_address.clone()));
    object.insert(
        "target".into(),
        target_object(vni).map_or(Dynamic::Null, fields_to_map),
    );
    object.insert(
        "created_at".into(),
        Dynamic::from(vni.created_at.map(|t| t.to_rfc3339())),
    );
    Dynamic::Map(object)
}

#[async_trait]
impl DataSourceWithConfigure for VirtualNetworkInterfacesDataSource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::provider_data;
    use mockito::{Matcher, Server};
    use std::any::Any;
    use std::sync::Arc;

    #[tokio::test]
    async fn lists_interfaces_in_resource_group() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/virtual_network_interfaces")
            .match_query(Matcher::UrlEncoded("resource_group.id".into(), "rg-1".into()))
            .with_body(
                serde_json::json!({
                    "virtual_network_interfaces": [
                        {
                            "id": "0717-vni-1",
                            "name": "attached",
                            "lifecycle_state": "stable",
                            "primary_ip": {"address": "10.240.0.4", "id": "0717-rip"},
                            "subnet": {"id": "0717-subnet"},
                            "zone": {"name": "us-south-1"},
                            "target": {
                                "id": "0717-ina",
                                "name": "eth1",
                                "resource_type": "instance_network_attachment"
                            }
                        },
                        {
                            "id": "0717-vni-2",
                            "name": "spare",
                            "lifecycle_state": "stable"
                        }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut data_source = VirtualNetworkInterfacesDataSource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(provider_data(&server.url()));
        data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;

        let mut config = DynamicValue::object();
        put_string(&mut config, "resource_group", "rg-1");
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vpc_virtual_network_interfaces".to_string(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let interfaces = response
            .state
            .get_list(&path("virtual_network_interfaces"))
            .unwrap();
        assert_eq!(interfaces.len(), 2);

        let attached = interfaces[0].as_map().unwrap();
        let target = attached.get("target").and_then(Dynamic::as_map).unwrap();
        assert_eq!(
            target.get("resource_type").and_then(Dynamic::as_str),
            Some("instance_network_attachment")
        );
        assert_eq!(attached.get("zone").and_then(Dynamic::as_str), Some("us-south-1"));

        let spare = interfaces[1].as_map().unwrap();
        assert!(spare.get("target").unwrap().is_null());
        mock.assert_async().await;
    }
}
