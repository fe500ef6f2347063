//! Virtual network interface resource

use async_trait::async_trait;
use std::collections::HashMap;
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{ListLengthValidator, OneOfValidator};
use tfplug::Timeouts;

use crate::api::common::{Identity, PrimaryIpPrototype};
use crate::api::virtual_network_interfaces::{
    VirtualNetworkInterface, VirtualNetworkInterfacePatch, VirtualNetworkInterfacePrototype,
};
use crate::error::{ApiResultExt, Result, VpcError};
use crate::resources::common::*;
use crate::wait::{tables, wait_for_state, StateTable, WaitOutcome};
use crate::VpcProviderData;

pub(crate) const FILTERING_MODES: &[&str] = &["auto", "enabled", "disabled"];

const PRIMARY_IP: &str = "primary_ip";

#[derive(Default)]
pub struct VirtualNetworkInterfaceResource {
    provider_data: Option<VpcProviderData>,
}

impl VirtualNetworkInterfaceResource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Attributes describing a VNI's target, shared with the list data source
pub(crate) const TARGET_FIELDS: &[&str] = &["id", "name", "resource_type"];

#[async_trait]
impl Resource for VirtualNetworkInterfaceResource {
    fn type_name(&self) -> &str {
        "vpc_virtual_network_interface"
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
        let primary_ip = NestedBlockBuilder::new(PRIMARY_IP, NestingMode::Single)
            .description("Primary IP: an existing reserved IP or a new address in the subnet")
            .max_items(1)
            .attribute(
                AttributeBuilder::new("address", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("reserved_ip", AttributeType::String)
                    .description("ID of an existing reserved IP to bind")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auto_delete", AttributeType::Bool)
                    .optional()
                    .computed()
                    .build(),
            )
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a virtual network interface")
            .attribute(id_attribute("Virtual network interface ID"))
            .attribute(name_attribute("Interface name").optional().computed().build())
            .attribute(
                AttributeBuilder::new("subnet", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("allow_ip_spoofing", AttributeType::Bool)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auto_delete", AttributeType::Bool)
                    .description("Delete the interface when its target is deleted")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_infrastructure_nat", AttributeType::Bool)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol_state_filtering_mode", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(OneOfValidator::new(FILTERING_MODES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "security_groups",
                    AttributeType::Set(Box::new(AttributeType::String)),
                )
                .description("At most five security groups")
                .optional()
                .computed()
                .force_new()
                .validator(ListLengthValidator {
                    min: None,
                    max: Some(5),
                })
                .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_group", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(AttributeBuilder::new("crn", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("href", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("lifecycle_state", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("mac_address", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("vpc", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("zone", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("target", object_type(TARGET_FIELDS))
                    .description("What the interface is attached to, if anything")
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("created_at", AttributeType::String).computed().build())
            .block(primary_ip)
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
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        let config = &request.config;

        let reserved = config
            .get_optional_string(&ip_path("reserved_ip"))
            .ok()
            .flatten();
        let address = config.get_optional_string(&ip_path("address")).ok().flatten();
        if reserved.is_some() && address.is_some() {
            diagnostics.push(
                Diagnostic::error(
                    "Conflicting primary IP",
                    "primary_ip.address cannot be combined with primary_ip.reserved_ip",
                )
                .with_attribute(ip_path("address")),
            );
        }

        ValidateResourceConfigResponse { diagnostics }
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
        if let Err(e) = self.create_interface(&ctx, data, &request.config, &mut state).await {
            diagnostics.push(e.to_diagnostic("Failed to create virtual network interface"));
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

        match self.read_interface(data, &request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read virtual network interface"));
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
            .update_interface(&ctx, data, &request.config, &request.prior_state, &mut state)
            .await
        {
            Ok(()) => UpdateResourceResponse {
                new_state: state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to update virtual network interface"));
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

        if let Err(e) = self.delete_interface(&ctx, data, &request.prior_state).await {
            diagnostics.push(e.to_diagnostic("Failed to delete virtual network interface"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl VirtualNetworkInterfaceResource {
    async fn create_interface(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let timeout = timeouts(config)?.create;
        let prototype = interface_prototype(config)?;

        let vni = data
            .client
            .virtual_network_interfaces()
            .create(&prototype)
            .await
            .context("virtual network interface")?;
        tracing::info!("Created virtual network interface {}", vni.id);
        let vni_id = vni.id.clone();
        put_string(state, "id", vni_id.as_str());

        let vni = wait_interface(ctx, data, &vni_id, &tables::LIFECYCLE_STABLE, timeout)
            .await?
            .reached()
            .unwrap_or(vni);

        flatten_interface(state, &vni);
        Ok(())
    }

    async fn read_interface(
        &self,
        data: &VpcProviderData,
        state: &DynamicValue,
    ) -> Result<Option<DynamicValue>> {
        let vni_id = required_string(state, "id")?;

        match data
            .client
            .virtual_network_interfaces()
            .get(&vni_id)
            .await
            .context(format!("virtual network interface {}", vni_id))
        {
            Ok(vni) => {
                let mut new_state = state.clone();
                flatten_interface(&mut new_state, &vni);
                Ok(Some(new_state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "Virtual network interface {} no longer exists, removing from state",
                    vni_id
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update_interface(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        prior: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let vni_id = required_string(prior, "id")?;
        let timeout = timeouts(config)?.update;

        let patch = interface_patch(config, prior)?;
        if !patch.is_empty() {
            data.client
                .virtual_network_interfaces()
                .update(&vni_id, &patch)
                .await
                .context(format!("virtual network interface {}", vni_id))?;
        }

        if let Some(vni) = wait_interface(ctx, data, &vni_id, &tables::LIFECYCLE_STABLE, timeout)
            .await?
            .reached()
        {
            flatten_interface(state, &vni);
        }
        Ok(())
    }

    async fn delete_interface(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        prior: &DynamicValue,
    ) -> Result<()> {
        let vni_id = required_string(prior, "id")?;
        let timeout = timeouts(prior)?.delete;

        match data
            .client
            .virtual_network_interfaces()
            .delete(&vni_id)
            .await
            .context(format!("virtual network interface {}", vni_id))
        {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }

        wait_interface(ctx, data, &vni_id, &tables::LIFECYCLE_DELETED, timeout).await?;
        Ok(())
    }
}

fn ip_path(name: &str) -> AttributePath {
    AttributePath::new(PRIMARY_IP).attribute(name)
}

/// Primary IP prototype from the `primary_ip` block; `None` when unset
pub(crate) fn primary_ip_from(config: &DynamicValue) -> Result<Option<PrimaryIpPrototype>> {
    let prototype = PrimaryIpPrototype {
        id: config.get_optional_string(&ip_path("reserved_ip")).ok().flatten(),
        address: config.get_optional_string(&ip_path("address")).ok().flatten(),
        name: config.get_optional_string(&ip_path("name")).ok().flatten(),
        auto_delete: config.get_optional_bool(&ip_path("auto_delete")).ok().flatten(),
    };
    if prototype.id.is_some() && prototype.address.is_some() {
        return Err(VpcError::precondition(
            "primary_ip.address cannot be combined with primary_ip.reserved_ip",
        ));
    }
    Ok((!prototype.is_empty()).then_some(prototype))
}

/// Interface prototype from the attributes this resource shares with the
/// inline `virtual_network_interface` blocks of attachments
pub(crate) fn interface_prototype(config: &DynamicValue) -> Result<VirtualNetworkInterfacePrototype> {
    let security_groups = match config.get_string_list(&path("security_groups")) {
        Ok(groups) => groups.into_iter().map(Identity::new).collect(),
        Err(e) if e.is_missing() => Vec::new(),
        Err(tfplug::TfplugError::TypeMismatch { .. }) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    Ok(VirtualNetworkInterfacePrototype {
        name: config.get_optional_string(&path("name"))?,
        subnet: config.get_optional_string(&path("subnet"))?.map(Identity::new),
        primary_ip: primary_ip_from(config)?,
        security_groups,
        allow_ip_spoofing: config.get_optional_bool(&path("allow_ip_spoofing"))?,
        auto_delete: config.get_optional_bool(&path("auto_delete"))?,
        enable_infrastructure_nat: config.get_optional_bool(&path("enable_infrastructure_nat"))?,
        protocol_state_filtering_mode: config
            .get_optional_string(&path("protocol_state_filtering_mode"))?,
        resource_group: config.get_optional_string(&path("resource_group"))?.map(Identity::new),
    })
}

pub(crate) fn interface_patch(
    config: &DynamicValue,
    prior: &DynamicValue,
) -> Result<VirtualNetworkInterfacePatch> {
    Ok(VirtualNetworkInterfacePatch {
        name: changed_string(config, prior, "name")?,
        allow_ip_spoofing: changed_bool(config, prior, "allow_ip_spoofing")?,
        auto_delete: changed_bool(config, prior, "auto_delete")?,
        enable_infrastructure_nat: changed_bool(config, prior, "enable_infrastructure_nat")?,
        protocol_state_filtering_mode: changed_string(config, prior, "protocol_state_filtering_mode")?,
    })
}

pub(crate) async fn wait_interface(
    ctx: &Context,
    data: &VpcProviderData,
    vni_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<WaitOutcome<VirtualNetworkInterface>> {
    let client = &data.client;
    wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("virtual network interface {}", vni_id),
        || async move {
            let vni = client
                .virtual_network_interfaces()
                .get(vni_id)
                .await
                .context(format!("virtual network interface {}", vni_id))?;
            let state = vni.lifecycle_state.clone();
            Ok((vni, state))
        },
    )
    .await
}

/// The target sum type as a `{ id, name, resource_type }` object
pub(crate) fn target_object(vni: &VirtualNetworkInterface) -> Option<Vec<(&'static str, Dynamic)>> {
    vni.target.as_ref().map(|target| {
        let reference = target.reference();
        vec![
            ("id", Dynamic::String(reference.id.clone())),
            ("name", opt_dynamic(reference.name.as_deref())),
            ("resource_type", Dynamic::String(target.resource_type().to_string())),
        ]
    })
}

pub(crate) fn flatten_interface(state: &mut DynamicValue, vni: &VirtualNetworkInterface) {
    put_string(state, "id", &vni.id);
    put_string(state, "name", &vni.name);
    put_opt_string(state, "crn", vni.crn.as_deref());
    put_opt_string(state, "href", vni.href.as_deref());
    put_string(state, "lifecycle_state", &vni.lifecycle_state);
    put_bool(state, "allow_ip_spoofing", vni.allow_ip_spoofing);
    put_bool(state, "auto_delete", vni.auto_delete);
    put_bool(state, "enable_infrastructure_nat", vni.enable_infrastructure_nat);
    put_opt_string(
        state,
        "protocol_state_filtering_mode",
        vni.protocol_state_filtering_mode.as_deref(),
    );
    put_opt_string(state, "subnet", vni.subnet.as_ref().map(|s| s.id.as_str()));
    put_strings(state, "security_groups", vni.security_groups.iter().map(|sg| sg.id.clone()));
    put_opt_string(state, "resource_group", vni.resource_group.as_ref().map(|g| g.id.as_str()));
    put_opt_string(state, "mac_address", vni.mac_address.as_deref());
    put_opt_string(state, "vpc", vni.vpc.as_ref().map(|v| v.id.as_str()));
    put_opt_string(state, "zone", vni.zone.as_ref().map(|z| z.name.as_str()));
    put_object(state, "target", target_object(vni));
    put_opt_string(
        state,
        "created_at",
        vni.created_at.map(|t| t.to_rfc3339()).as_deref(),
    );

    match &vni.primary_ip {
        Some(ip) => {
            let prior_auto_delete = state
                .get_optional_bool(&ip_path("auto_delete"))
                .ok()
                .flatten();
            let mut block = HashMap::new();
            block.insert("address".to_string(), Dynamic::String(ip.address.clone()));
            block.insert("reserved_ip".to_string(), Dynamic::String(ip.id.clone()));
            block.insert("name".to_string(), opt_dynamic(ip.name.as_deref()));
            block.insert(
                "auto_delete".to_string(),
                prior_auto_delete.map_or(Dynamic::Null, Dynamic::Bool),
            );
            let _ = state.set_map(&path(PRIMARY_IP), block);
        }
        None => {
            let _ = state.set_null(&path(PRIMARY_IP));
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for VirtualNetworkInterfaceResource {
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
impl ResourceWithImportState for VirtualNetworkInterfaceResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        if request.id.is_empty() || request.id.contains('/') {
            return ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Invalid import ID",
                    format!("Expected a virtual network interface ID, got {:?}", request.id),
                )],
            };
        }

        let mut state = DynamicValue::object();
        put_string(&mut state, "id", &request.id);
        ImportResourceStateResponse {
            imported_resources: vec![ImportedResource {
                type_name: request.type_name,
                state,
            }],
            diagnostics: vec![],
        }
    }
}
