//! Bare metal server network interface resource
//!
//! Setting `allowed_vlans` makes a PCI interface, which the server only
//! accepts while stopped. Otherwise a VLAN interface is created on top of
//! the server's PCI interfaces and `vlan` is required.

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
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{ListLengthValidator, NumberRangeValidator};
use tfplug::Timeouts;

use crate::api::bare_metal_servers::{
    BareMetalServerNetworkInterface, NetworkInterfacePatch, NetworkInterfacePrototype,
    NetworkInterfaceSettings,
};
use crate::api::common::Identity;
use crate::api::Client;
use crate::error::{ApiResultExt, Result, VpcError};
use crate::ids;
use crate::locks::bare_metal_server_key;
use crate::resources::bare_metal::server::{start_after_pci, stop_for_pci, PciChange, HARD_STOP};
use crate::resources::common::*;
use crate::resources::network::resource_virtual_network_interface::primary_ip_from;
use crate::wait::{tables, wait_for_state, StateTable, WaitOutcome};
use crate::VpcProviderData;

const WHAT: &str = "network interface";

/// Reported in place of the interface status while a PCI interface waits
/// on a stopped server
const PCI_PENDING: &str = "pci_pending";

const VLAN_ONLY: &[&str] = &["vlan", "allow_interface_to_float"];

#[derive(Default)]
pub struct BareMetalServerNetworkInterfaceResource {
    provider_data: Option<VpcProviderData>,
}

impl BareMetalServerNetworkInterfaceResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for BareMetalServerNetworkInterfaceResource {
    fn type_name(&self) -> &str {
        "vpc_bare_metal_server_network_interface"
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
            .description("Network interface of a bare metal server")
            .attribute(id_attribute("Terraform ID in the form server/network_interface"))
            .attribute(
                AttributeBuilder::new("bare_metal_server", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(name_attribute("Interface name").optional().computed().build())
            .attribute(
                AttributeBuilder::new("subnet", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("primary_ip", object_type(&["address", "reserved_ip", "name"]))
                    .optional()
                    .computed()
                    .force_new()
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
                AttributeBuilder::new("allow_ip_spoofing", AttributeType::Bool)
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
                AttributeBuilder::new(
                    "allowed_vlans",
                    AttributeType::Set(Box::new(AttributeType::Number)),
                )
                .description("VLAN IDs a PCI interface accepts; makes this a PCI interface")
                .optional()
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("vlan", AttributeType::Number)
                    .description("VLAN ID of a VLAN interface")
                    .optional()
                    .computed()
                    .force_new()
                    .validator(NumberRangeValidator {
                        min: Some(1.0),
                        max: Some(4094.0),
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("allow_interface_to_float", AttributeType::Bool)
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(HARD_STOP, AttributeType::Bool)
                    .description("Stop the server with a hard stop for PCI changes (default true)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("network_interface", AttributeType::String)
                    .description("Interface ID")
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("interface_type", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("status", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("mac_address", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("port_speed", AttributeType::Number).computed().build())
            .attribute(AttributeBuilder::new("type", AttributeType::String).computed().build())
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
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: validate_interface_config(&request.config),
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
        if let Err(e) = self.create_interface(&ctx, data, &request.config, &mut state).await {
            diagnostics.push(e.to_diagnostic("Failed to create bare metal server network interface"));
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
                diagnostics.push(e.to_diagnostic("Failed to read bare metal server network interface"));
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
                diagnostics.push(e.to_diagnostic("Failed to update bare metal server network interface"));
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
            diagnostics.push(e.to_diagnostic("Failed to delete bare metal server network interface"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl BareMetalServerNetworkInterfaceResource {
    async fn create_interface(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let server_id = required_string(config, "bare_metal_server")?;
        let timeout = timeouts(config)?.create;
        let prototype = interface_prototype(config)?;
        let pci = matches!(prototype, NetworkInterfacePrototype::Pci { .. });

        let _guard = data.locks.lock(&bare_metal_server_key(&server_id)).await;

        if pci {
            stop_for_pci(ctx, data, &server_id, hard_stop(config)?, PciChange::Attach, WHAT, timeout)
                .await?;
        }

        let created = data
            .client
            .bare_metal_servers()
            .network_interfaces(&server_id)
            .create(&prototype)
            .await
            .context(format!("bare metal server {}", server_id));
        let nic = match created {
            Ok(nic) => nic,
            Err(e) => {
                if pci {
                    // leave the server the way we found it
                    if let Err(start_err) = start_after_pci(ctx, data, &server_id, timeout).await {
                        tracing::warn!(
                            "Could not start bare metal server {} after failed interface creation: {}",
                            server_id,
                            start_err
                        );
                    }
                }
                return Err(e);
            }
        };
        tracing::info!(
            "Created {} network interface {} on bare metal server {}",
            nic.interface_type(),
            nic.id(),
            server_id
        );
        let nic_id = nic.id().to_string();
        put_string(state, "id", ids::make_nic_id(&server_id, &nic_id));
        put_string(state, "network_interface", nic_id.as_str());

        let nic = wait_interface(
            ctx,
            data,
            &server_id,
            &nic_id,
            &tables::BMS_NIC_AVAILABLE,
            timeout,
        )
        .await?
        .reached()
        .unwrap_or(nic);

        if pci {
            start_after_pci(ctx, data, &server_id, timeout).await?;
        }

        flatten_interface(state, &server_id, &nic);
        Ok(())
    }

    async fn read_interface(
        &self,
        data: &VpcProviderData,
        state: &DynamicValue,
    ) -> Result<Option<DynamicValue>> {
        let (server_id, nic_id) = ids::parse_nic_id(&required_string(state, "id")?)?;

        match get_interface(&data.client, &server_id, &nic_id).await {
            Ok(nic) => {
                let mut new_state = state.clone();
                flatten_interface(&mut new_state, &server_id, &nic);
                Ok(Some(new_state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "Bare metal server network interface {} no longer exists, removing from state",
                    nic_id
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
        let (server_id, nic_id) = ids::parse_nic_id(&required_string(prior, "id")?)?;
        let timeout = timeouts(config)?.update;

        let patch = interface_patch(config, prior)?;
        let _guard = data.locks.lock(&bare_metal_server_key(&server_id)).await;

        if !patch_is_empty(&patch) {
            data.client
                .bare_metal_servers()
                .network_interfaces(&server_id)
                .update(&nic_id, &patch)
                .await
                .context(format!("bare metal server network interface {}", nic_id))?;
        }

        if let Some(nic) = wait_interface(
            ctx,
            data,
            &server_id,
            &nic_id,
            &tables::BMS_NIC_AVAILABLE,
            timeout,
        )
        .await?
        .reached()
        {
            flatten_interface(state, &server_id, &nic);
        }
        Ok(())
    }

    async fn delete_interface(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        prior: &DynamicValue,
    ) -> Result<()> {
        let (server_id, nic_id) = ids::parse_nic_id(&required_string(prior, "id")?)?;
        let timeout = timeouts(prior)?.delete;

        let _guard = data.locks.lock(&bare_metal_server_key(&server_id)).await;

        let nic = match get_interface(&data.client, &server_id, &nic_id).await {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        };
        let pci = nic.is_pci();

        if pci {
            stop_for_pci(ctx, data, &server_id, hard_stop(prior)?, PciChange::Detach, WHAT, timeout)
                .await?;
        }

        match data
            .client
            .bare_metal_servers()
            .network_interfaces(&server_id)
            .delete(&nic_id)
            .await
            .context(format!("bare metal server network interface {}", nic_id))
        {
            Err(e) if e.is_not_found() => {}
            other => other?,
        }

        wait_interface(
            ctx,
            data,
            &server_id,
            &nic_id,
            &tables::BMS_NIC_DELETED,
            timeout,
        )
        .await?;

        if pci {
            start_after_pci(ctx, data, &server_id, timeout).await?;
        }
        Ok(())
    }
}

pub(crate) fn validate_interface_config(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    if is_set(config, "allowed_vlans") {
        for name in VLAN_ONLY {
            if is_set(config, name) {
                diagnostics.push(
                    Diagnostic::error(
                        "Conflicting interface type",
                        format!(
                            "{} only applies to VLAN interfaces and cannot be combined with allowed_vlans",
                            name
                        ),
                    )
                    .with_attribute(path(name)),
                );
            }
        }
    } else if !is_unknown(config, "allowed_vlans")
        && !is_unknown(config, "vlan")
        && !is_set(config, "vlan")
    {
        diagnostics.push(
            Diagnostic::error(
                "Missing interface type",
                "set allowed_vlans for a PCI interface or vlan for a VLAN interface",
            )
            .with_attribute(path("vlan")),
        );
    }

    diagnostics
}

fn is_set(config: &DynamicValue, name: &str) -> bool {
    config
        .get(&path(name))
        .is_ok_and(|v| !v.is_null() && !matches!(v, Dynamic::Unknown))
}

fn is_unknown(config: &DynamicValue, name: &str) -> bool {
    matches!(config.get(&path(name)), Ok(Dynamic::Unknown))
}

fn hard_stop(config: &DynamicValue) -> Result<bool> {
    Ok(config.get_optional_bool(&path(HARD_STOP))?.unwrap_or(true))
}

pub(crate) fn interface_prototype(config: &DynamicValue) -> Result<NetworkInterfacePrototype> {
    let security_groups = match config.get_string_list(&path("security_groups")) {
        Ok(groups) => groups.into_iter().map(Identity::new).collect(),
        Err(e) if e.is_missing() => Vec::new(),
        Err(tfplug::TfplugError::TypeMismatch { .. }) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let settings = NetworkInterfaceSettings {
        name: config.get_optional_string(&path("name"))?,
        subnet: Identity::new(required_string(config, "subnet")?),
        primary_ip: primary_ip_from(config)?,
        security_groups,
        allow_ip_spoofing: config.get_optional_bool(&path("allow_ip_spoofing"))?,
        enable_infrastructure_nat: config.get_optional_bool(&path("enable_infrastructure_nat"))?,
    };

    if is_set(config, "allowed_vlans") {
        return Ok(NetworkInterfacePrototype::Pci {
            settings,
            allowed_vlans: i64_list(config, "allowed_vlans")?,
        });
    }

    let vlan = optional_i64(config, "vlan")?.ok_or_else(|| {
        VpcError::precondition("vlan is required unless allowed_vlans makes this a PCI interface")
    })?;
    Ok(NetworkInterfacePrototype::Vlan {
        settings,
        vlan,
        allow_interface_to_float: config.get_optional_bool(&path("allow_interface_to_float"))?,
    })
}

pub(crate) fn interface_patch(config: &DynamicValue, prior: &DynamicValue) -> Result<NetworkInterfacePatch> {
    let allowed_vlans = if is_set(config, "allowed_vlans") {
        let mut new = i64_list(config, "allowed_vlans")?;
        let mut old = i64_list(prior, "allowed_vlans").unwrap_or_default();
        new.sort_unstable();
        old.sort_unstable();
        (new != old).then_some(new)
    } else {
        None
    };

    Ok(NetworkInterfacePatch {
        name: changed_string(config, prior, "name")?,
        allow_ip_spoofing: changed_bool(config, prior, "allow_ip_spoofing")?,
        enable_infrastructure_nat: changed_bool(config, prior, "enable_infrastructure_nat")?,
        allowed_vlans,
        allow_interface_to_float: None,
    })
}

fn patch_is_empty(patch: &NetworkInterfacePatch) -> bool {
    patch.name.is_none()
        && patch.allow_ip_spoofing.is_none()
        && patch.enable_infrastructure_nat.is_none()
        && patch.allowed_vlans.is_none()
        && patch.allow_interface_to_float.is_none()
}

async fn get_interface(
    client: &Client,
    server_id: &str,
    nic_id: &str,
) -> Result<BareMetalServerNetworkInterface> {
    client
        .bare_metal_servers()
        .network_interfaces(server_id)
        .get(nic_id)
        .await
        .context(format!("bare metal server network interface {}", nic_id))
}

/// Interface status as the waiters see it.
///
/// A PCI interface that is not yet available on a stopped server reports
/// `pci_pending`; it only comes up once the server starts. A VLAN interface
/// being deleted cannot go away while its server is stopped.
async fn interface_status(
    client: &Client,
    server_id: &str,
    nic_id: &str,
    deleting: bool,
) -> Result<(BareMetalServerNetworkInterface, String)> {
    let nic = get_interface(client, server_id, nic_id).await?;
    let status = nic.status().to_string();

    let check_server = match (nic.is_pci(), deleting) {
        (true, false) => status != "available" && status != "failed",
        (false, true) => true,
        _ => false,
    };
    if !check_server {
        return Ok((nic, status));
    }

    let server = client
        .bare_metal_servers()
        .get(server_id)
        .await
        .context(format!("bare metal server {}", server_id))?;
    if server.status != "stopped" {
        return Ok((nic, status));
    }

    if deleting {
        Err(VpcError::precondition(format!(
            "VLAN network interface {} cannot be deleted while bare metal server {} is stopped",
            nic_id, server_id
        )))
    } else {
        Ok((nic, PCI_PENDING.to_string()))
    }
}

async fn wait_interface(
    ctx: &Context,
    data: &VpcProviderData,
    server_id: &str,
    nic_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<WaitOutcome<BareMetalServerNetworkInterface>> {
    let client = &data.client;
    let deleting = table.gone_is_target;
    wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("bare metal server network interface {}", nic_id),
        || interface_status(client, server_id, nic_id, deleting),
    )
    .await
}

pub(crate) fn flatten_interface(
    state: &mut DynamicValue,
    server_id: &str,
    nic: &BareMetalServerNetworkInterface,
) {
    let common = nic.common();
    put_string(state, "id", ids::make_nic_id(server_id, &common.id));
    put_string(state, "bare_metal_server", server_id);
    put_string(state, "network_interface", &common.id);
    put_string(state, "name", &common.name);
    put_string(state, "interface_type", nic.interface_type());
    put_string(state, "status", &common.status);
    put_bool(state, "allow_ip_spoofing", common.allow_ip_spoofing);
    put_bool(state, "enable_infrastructure_nat", common.enable_infrastructure_nat);
    put_opt_string(state, "mac_address", common.mac_address.as_deref());
    put_opt_i64(state, "port_speed", common.port_speed);
    put_opt_string(state, "type", common.interface_role.as_deref());
    put_opt_string(state, "href", common.href.as_deref());
    put_opt_string(
        state,
        "created_at",
        common.created_at.map(|t| t.to_rfc3339()).as_deref(),
    );
    if let Some(subnet) = &common.subnet {
        put_string(state, "subnet", subnet.id.as_str());
    }
    put_strings(
        state,
        "security_groups",
        common.security_groups.iter().map(|sg| sg.id.clone()),
    );
    put_object(
        state,
        "primary_ip",
        common.primary_ip.as_ref().map(|ip| {
            vec![
                ("address", Dynamic::String(ip.address.clone())),
                ("reserved_ip", Dynamic::String(ip.id.clone())),
                ("name", opt_dynamic(ip.name.as_deref())),
            ]
        }),
    );

    match nic {
        BareMetalServerNetworkInterface::Pci(pci) => {
            put_i64s(state, "allowed_vlans", &pci.allowed_vlans);
            put_opt_i64(state, "vlan", None);
            put_bool(state, "allow_interface_to_float", false);
        }
        BareMetalServerNetworkInterface::Vlan(vlan) => {
            put_i64s(state, "allowed_vlans", &[]);
            put_i64(state, "vlan", vlan.vlan);
            put_bool(state, "allow_interface_to_float", vlan.allow_interface_to_float);
        }
        BareMetalServerNetworkInterface::Hipersocket(_) => {}
    }
}

#[async_trait]
impl ResourceWithConfigure for BareMetalServerNetworkInterfaceResource {
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
impl ResourceWithImportState for BareMetalServerNetworkInterfaceResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match ids::parse_nic_id(&request.id) {
            Ok((server_id, nic_id)) => {
                let mut state = DynamicValue::object();
                put_string(&mut state, "id", &request.id);
                put_string(&mut state, "bare_metal_server", server_id);
                put_string(&mut state, "network_interface", nic_id);
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
                    format!("Expected server/network_interface: {}", e),
                )],
            },
        }
    }
}

#[cfg(test)]
#[path = "./resource_network_interface_test.rs"]
mod resource_network_interface_test;
