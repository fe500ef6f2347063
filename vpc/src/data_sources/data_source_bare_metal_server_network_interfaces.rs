//! Every network interface of one bare metal server

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

use crate::api::bare_metal_servers::BareMetalServerNetworkInterface;
use crate::data_sources::list_of;
use crate::error::{ApiResultExt, Result};
use crate::resources::common::*;
use crate::VpcProviderData;

#[derive(Default)]
pub struct BareMetalServerNetworkInterfacesDataSource {
    provider_data: Option<VpcProviderData>,
}

impl BareMetalServerNetworkInterfacesDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for BareMetalServerNetworkInterfacesDataSource {
    fn type_name(&self) -> &str {
        "vpc_bare_metal_server_network_interfaces"
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
            ("interface_type", AttributeType::String),
            ("status", AttributeType::String),
            ("type", AttributeType::String),
            ("allow_ip_spoofing", AttributeType::Bool),
            ("enable_infrastructure_nat", AttributeType::Bool),
            ("mac_address", AttributeType::String),
            ("port_speed", AttributeType::Number),
            ("subnet", AttributeType::String),
            ("primary_ip", object_type(&["address", "reserved_ip", "name"])),
            (
                "security_groups",
                AttributeType::List(Box::new(AttributeType::String)),
            ),
            (
                "allowed_vlans",
                AttributeType::List(Box::new(AttributeType::Number)),
            ),
            ("vlan", AttributeType::Number),
            ("allow_interface_to_float", AttributeType::Bool),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Lists the network interfaces of a bare metal server")
            .attribute(
                AttributeBuilder::new("bare_metal_server", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("network_interfaces", interfaces)
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
                diagnostics: vec![e.to_diagnostic("Failed to list bare metal server network interfaces")],
            },
        }
    }
}

async fn read_interfaces(data: &VpcProviderData, config: &DynamicValue) -> Result<DynamicValue> {
    let server_id = required_string(config, "bare_metal_server")?;

    let nics = data
        .client
        .bare_metal_servers()
        .network_interfaces(&server_id)
        .list_all()
        .await
        .context(format!("bare metal server {}", server_id))?;

    let mut state = config.clone();
    put_string(&mut state, "id", server_id.as_str());
    let _ = state.set_list(
        &path("network_interfaces"),
        nics.iter().map(interface_object).collect(),
    );
    Ok(state)
}

fn interface_object(nic: &BareMetalServerNetworkInterface) -> Dynamic {
    let common = nic.common();
    let mut object: HashMap<String, Dynamic> = HashMap::new();
    object.insert("id".into(), Dynamic::from(common.id.as_str()));
    object.insert("name".into(), Dynamic::from(common.name.as_str()));
    object.insert("interface_type".into(), Dynamic::from(nic.interface_type()));
    object.insert("status".into(), Dynamic::from(common.status.as_str()));
    object.insert("type".into(), Dynamic::from(common.interface_role.clone()));
    object.insert("allow_ip_spoofing".into(), Dynamic::from(common.allow_ip_spoofing));
    object.insert(
        "enable_infrastructure_nat".into(),
        Dynamic::from(common.enable_infrastructure_nat),
    );
    object.insert("mac_address".into(), Dynamic::from(common.mac_address.clone()));
    object.insert("port_speed".into(), Dynamic::from(common.port_speed));
    object.insert(
        "subnet".into(),
        Dynamic::from(common.subnet.as_ref().map(|s| s.id.clone())),
    );
    object.insert(
        "primary_ip".into(),
        common.primary_ip.as_ref().map_or(Dynamic::Null, |ip| {
            let mut primary_ip = HashMap::new();
            primary_ip.insert("address".to_string(), Dynamic::from(ip.address.as_str()));
            primary_ip.insert("reserved_ip".to_string(), Dynamic::from(ip.id.as_str()));
            primary_ip.insert("name".to_string(), opt_dynamic(ip.name.as_deref()));
            Dynamic::Map(primary_ip)
        }),
    );
    object.insert(
        "security_groups".into(),
        Dynamic::from(
            common
                .security_groups
                .iter()
                .map(|sg| sg.id.clone())
                .collect::<Vec<_>>(),
        ),
    );

    let (allowed_vlans, vlan, floats) = match nic {
        BareMetalServerNetworkInterface::Pci(pci) => (pci.allowed_vlans.clone(), None, None),
        BareMetalServerNetworkInterface::Vlan(vlan) => {
            (vec![], Some(vlan.vlan), Some(vlan.allow_interface_to_float))
        }
        BareMetalServerNetworkInterface::Hipersocket(_) => (vec![], None, None),
    };
    object.insert("allowed_vlans".into(), Dynamic::from(allowed_vlans));
    object.insert("vlan".into(), Dynamic::from(vlan));
    object.insert("allow_interface_to_float".into(), Dynamic::from(floats));
    Dynamic::Map(object)
}

#[async_trait]
impl DataSourceWithConfigure for BareMetalServerNetworkInterfacesDataSource {
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
