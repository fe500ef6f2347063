//! Subnet reserved IP resource

use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceMetadataRequest,
    ResourceMetadataResponse, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::Timeouts;

use crate::api::common::Identity;
use crate::api::subnets::{ReservedIp, ReservedIpPatch, ReservedIpPrototype};
use crate::error::{ApiResultExt, Result};
use crate::ids;
use crate::resources::common::*;
use crate::wait::{tables, wait_for_state, StateTable, WaitOutcome};
use crate::VpcProviderData;

#[derive(Default)]
pub struct SubnetReservedIpResource {
    provider_data: Option<VpcProviderData>,
}

impl SubnetReservedIpResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for SubnetReservedIpResource {
    fn type_name(&self) -> &str {
        "vpc_subnet_reserved_ip"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Reserves an IP address in a subnet")
            .attribute(id_attribute("Terraform ID in the form subnet/reserved_ip"))
            .attribute(
                AttributeBuilder::new("subnet", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(name_attribute("Reserved IP name").optional().computed().build())
            .attribute(
                AttributeBuilder::new("address", AttributeType::String)
                    .description("Address to reserve; picked by the subnet when omitted")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auto_delete", AttributeType::Bool)
                    .description("Release the address when its target is deleted")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("target", AttributeType::String)
                    .description("ID of the resource the address is bound to")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(AttributeBuilder::new("reserved_ip", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("lifecycle_state", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("owner", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("href", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("created_at", AttributeType::String).computed().build())
            .block(Timeouts::block())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        };

        let mut state = request.planned_state.clone();
        if let Err(e) = self.create_reserved_ip(&ctx, data, &request.config, &mut state).await {
            diagnostics.push(e.to_diagnostic("Failed to create reserved IP"));
        }

        CreateResourceResponse {
            new_state: state,
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];
        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
            };
        };

        match self.read_reserved_ip(data, &request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read reserved IP"));
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                }
            }
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];
        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        };

        let mut state = request.planned_state.clone();
        match self
            .update_reserved_ip(&ctx, data, &request.config, &request.prior_state, &mut state)
            .await
        {
            Ok(()) => UpdateResourceResponse {
                new_state: state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to update reserved IP"));
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];
        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return DeleteResourceResponse { diagnostics };
        };

        if let Err(e) = self.delete_reserved_ip(&ctx, data, &request.prior_state).await {
            diagnostics.push(e.to_diagnostic("Failed to delete reserved IP"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl SubnetReservedIpResource {
    async fn create_reserved_ip(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let subnet_id = required_string(config, "subnet")?;
        let timeout = timeouts(config)?.create;

        let prototype = ReservedIpPrototype {
            name: config.get_optional_string(&path("name"))?,
            address: config.get_optional_string(&path("address"))?,
            auto_delete: config.get_optional_bool(&path("auto_delete"))?,
            target: config.get_optional_string(&path("target"))?.map(Identity::new),
        };

        let ip = data
            .client
            .subnets()
            .reserved_ips(&subnet_id)
            .create(&prototype)
            .await
            .context(format!("subnet {}", subnet_id))?;
        tracing::info!("Reserved {} ({}) in subnet {}", ip.address, ip.id, subnet_id);
        let ip_id = ip.id.clone();
        put_string(state, "id", ids::make_id(&[subnet_id.as_str(), ip_id.as_str()]));
        put_string(state, "reserved_ip", ip_id.as_str());

        let ip = wait_reserved_ip(ctx, data, &subnet_id, &ip_id, &tables::LIFECYCLE_STABLE, timeout)
            .await?
            .reached()
            .unwrap_or(ip);

        flatten_reserved_ip(state, &subnet_id, &ip);
        Ok(())
    }

    async fn read_reserved_ip(
        &self,
        data: &VpcProviderData,
        state: &DynamicValue,
    ) -> Result<Option<DynamicValue>> {
        let (subnet_id, ip_id) = ids::parse_pair(&required_string(state, "id")?)?;

        match data
            .client
            .subnets()
            .reserved_ips(&subnet_id)
            .get(&ip_id)
            .await
            .context(format!("reserved IP {}", ip_id))
        {
            Ok(ip) => {
                let mut new_state = state.clone();
                flatten_reserved_ip(&mut new_state, &subnet_id, &ip);
                Ok(Some(new_state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Reserved IP {} no longer exists, removing from state", ip_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update_reserved_ip(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        prior: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let (subnet_id, ip_id) = ids::parse_pair(&required_string(prior, "id")?)?;
        let timeout = timeouts(config)?.update;

        let patch = ReservedIpPatch {
            name: changed_string(config, prior, "name")?,
            auto_delete: changed_bool(config, prior, "auto_delete")?,
        };
        if patch.name.is_none() && patch.auto_delete.is_none() {
            return Ok(());
        }

        data.client
            .subnets()
            .reserved_ips(&subnet_id)
            .update(&ip_id, &patch)
            .await
            .context(format!("reserved IP {}", ip_id))?;

        if let Some(ip) =
            wait_reserved_ip(ctx, data, &subnet_id, &ip_id, &tables::LIFECYCLE_STABLE, timeout)
                .await?
                .reached()
        {
            flatten_reserved_ip(state, &subnet_id, &ip);
        }
        Ok(())
    }

    async fn delete_reserved_ip(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        prior: &DynamicValue,
    ) -> Result<()> {
        let (subnet_id, ip_id) = ids::parse_pair(&required_string(prior, "id")?)?;
        let timeout = timeouts(prior)?.delete;

        match data
            .client
            .subnets()
            .reserved_ips(&subnet_id)
            .delete(&ip_id)
            .await
            .context(format!("reserved IP {}", ip_id))
        {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }

        wait_reserved_ip(ctx, data, &subnet_id, &ip_id, &tables::LIFECYCLE_DELETED, timeout).await?;
        Ok(())
    }
}

async fn wait_reserved_ip(
    ctx: &Context,
    data: &VpcProviderData,
    subnet_id: &str,
    ip_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<WaitOutcome<ReservedIp>> {
    let client = &data.client;
    wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("reserved IP {}", ip_id),
        || async move {
            let ip = client
                .subnets()
                .reserved_ips(subnet_id)
                .get(ip_id)
                .await
                .context(format!("reserved IP {}", ip_id))?;
            let state = ip.lifecycle_state.clone();
            Ok((ip, state))
        },
    )
    .await
}

fn flatten_reserved_ip(state: &mut DynamicValue, subnet_id: &str, ip: &ReservedIp) {
    put_string(state, "id", ids::make_id(&[subnet_id, ip.id.as_str()]));
    put_string(state, "subnet", subnet_id);
    put_string(state, "reserved_ip", &ip.id);
    put_string(state, "name", &ip.name);
    put_string(state, "address", &ip.address);
    put_bool(state, "auto_delete", ip.auto_delete);
    put_opt_string(state, "target", ip.target.as_ref().map(|t| t.id.as_str()));
    put_string(state, "lifecycle_state", &ip.lifecycle_state);
    put_opt_string(state, "owner", ip.owner.as_deref());
    put_opt_string(state, "href", ip.href.as_deref());
    put_opt_string(
        state,
        "created_at",
        ip.created_at.map(|t| t.to_rfc3339()).as_deref(),
    );
}

#[async_trait]
impl ResourceWithConfigure for SubnetReservedIpResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let (provider_data, diagnostics) = configure_provider_data(request.provider_data);
        self.provider_data = provider_data;
        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for SubnetReservedIpResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match ids::parse_pair(&request.id) {
            Ok((subnet_id, ip_id)) => {
                let mut state = DynamicValue::object();
                put_string(&mut state, "id", &request.id);
                put_string(&mut state, "subnet", subnet_id);
                put_string(&mut state, "reserved_ip", ip_id);
                ImportResourceStateResponse {
                    imported_resources: vec![ImportedResource {
                        type_name: request.type_name,
                        state,
                    }],
                    diagnostics: vec![],
                }
            }
            Err(e) => ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Invalid import ID",
                    format!("Expected subnet/reserved_ip: {}", e),
                )],
            },
        }
    }
}
