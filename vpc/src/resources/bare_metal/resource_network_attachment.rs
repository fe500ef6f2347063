//! Bare metal server network attachment resource
//!
//! Attachments connect a virtual network interface to the server. PCI
//! attachments follow the same stop/start rules as PCI network interfaces.

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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberRangeValidator, OneOfValidator};
use tfplug::Timeouts;

use crate::api::bare_metal_servers::{
    BareMetalServerNetworkAttachment, NetworkAttachmentPatch, NetworkAttachmentPrototype,
};
use crate::error::{ApiResultExt, Result, VpcError};
use crate::ids;
use crate::locks::bare_metal_server_key;
use crate::resources::bare_metal::server::{start_after_pci, stop_for_pci, PciChange, HARD_STOP};
use crate::resources::common::*;
use crate::resources::network::interface_block::{
    attachment_interface, interface_block, interface_block_patch, validate_interface_block,
    INTERFACE_BLOCK,
};
use crate::wait::{tables, wait_for_state, StateTable, WaitOutcome};
use crate::VpcProviderData;

const WHAT: &str = "network attachment";

#[derive(Default)]
pub struct BareMetalServerNetworkAttachmentResource {
    provider_data: Option<VpcProviderData>,
}

impl BareMetalServerNetworkAttachmentResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for BareMetalServerNetworkAttachmentResource {
    fn type_name(&self) -> &str {
        "vpc_bare_metal_server_network_attachment"
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
            .description("Attaches a virtual network interface to a bare metal server")
            .attribute(id_attribute("Terraform ID in the form server/attachment"))
            .attribute(
                AttributeBuilder::new("bare_metal_server", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("interface_type", AttributeType::String)
                    .required()
                    .force_new()
                    .validator(OneOfValidator::new(&["pci", "vlan"]))
                    .build(),
            )
            .attribute(name_attribute("Attachment name").optional().computed().build())
            .attribute(
                AttributeBuilder::new(
                    "allowed_vlans",
                    AttributeType::Set(Box::new(AttributeType::Number)),
                )
                .description("VLAN IDs the PCI attachment accepts")
                .optional()
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("vlan", AttributeType::Number)
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
                AttributeBuilder::new("allow_to_float", AttributeType::Bool)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(HARD_STOP, AttributeType::Bool)
                    .description("Stop the server with a hard stop for PCI changes (default true)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("network_attachment", AttributeType::String)
                    .description("Attachment ID")
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("lifecycle_state", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("port_speed", AttributeType::Number).computed().build())
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("primary or secondary")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("primary_ip", object_type(&["address", "reserved_ip", "name"]))
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("subnet", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("href", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("created_at", AttributeType::String).computed().build())
            .block(interface_block(NestedBlockBuilder::new(INTERFACE_BLOCK, NestingMode::Single)))
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
        let mut diagnostics = validate_interface_block(&request.config);
        diagnostics.extend(validate_attachment_type(&request.config));
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
        if let Err(e) = self.create_attachment(&ctx, data, &request.config, &mut state).await {
            diagnostics.push(e.to_diagnostic("Failed to create bare metal server network attachment"));
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

        match self.read_attachment(data, &request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read bare metal server network attachment"));
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
            .update_attachment(&ctx, data, &request.config, &request.prior_state, &mut state)
            .await
        {
            Ok(()) => UpdateResourceResponse {
                new_state: state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to update bare metal server network attachment"));
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

        if let Err(e) = self.delete_attachment(&ctx, data, &request.prior_state).await {
            diagnostics.push(e.to_diagnostic("Failed to delete bare metal server network attachment"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl BareMetalServerNetworkAttachmentResource {
    async fn create_attachment(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let server_id = required_string(config, "bare_metal_server")?;
        let timeout = timeouts(config)?.create;
        let prototype = attachment_prototype(config)?;
        let pci = matches!(prototype, NetworkAttachmentPrototype::Pci { .. });

        let _guard = data.locks.lock(&bare_metal_server_key(&server_id)).await;

        if pci {
            stop_for_pci(ctx, data, &server_id, hard_stop(config)?, PciChange::Attach, WHAT, timeout)
                .await?;
        }

        let created = data
            .client
            .bare_metal_servers()
            .network_attachments(&server_id)
            .create(&prototype)
            .await
            .context(format!("bare metal server {}", server_id));
        let attachment = match created {
            Ok(attachment) => attachment,
            Err(e) => {
                if pci {
                    if let Err(start_err) = start_after_pci(ctx, data, &server_id, timeout).await {
                        tracing::warn!(
                            "Could not start bare metal server {} after failed attachment creation: {}",
                            server_id,
                            start_err
                        );
                    }
                }
                return Err(e);
            }
        };
        let attachment_id = attachment.common().id.clone();
        tracing::info!(
            "Created {} network attachment {} on bare metal server {}",
            attachment.interface_type(),
            attachment_id,
            server_id
        );
        put_string(
            state,
            "id",
            ids::make_id(&[server_id.as_str(), attachment_id.as_str()]),
        );
        put_string(state, "network_attachment", attachment_id.as_str());

        let attachment = wait_attachment(
            ctx,
            data,
            &server_id,
            &attachment_id,
            &tables::LIFECYCLE_STABLE,
            timeout,
        )
        .await?
        .reached()
        .unwrap_or(attachment);

        if pci {
            start_after_pci(ctx, data, &server_id, timeout).await?;
        }

        flatten_attachment(state, &server_id, &attachment);
        Ok(())
    }

    async fn read_attachment(
        &self,
        data: &VpcProviderData,
        state: &DynamicValue,
    ) -> Result<Option<DynamicValue>> {
        let (server_id, attachment_id) = ids::parse_pair(&required_string(state, "id")?)?;

        match data
            .client
            .bare_metal_servers()
            .network_attachments(&server_id)
            .get(&attachment_id)
            .await
            .context(format!("bare metal server network attachment {}", attachment_id))
        {
            Ok(attachment) => {
                let mut new_state = state.clone();
                flatten_attachment(&mut new_state, &server_id, &attachment);
                Ok(Some(new_state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "Bare metal server network attachment {} no longer exists, removing from state",
                    attachment_id
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update_attachment(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        prior: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let (server_id, attachment_id) = ids::parse_pair(&required_string(prior, "id")?)?;
        let timeout = timeouts(config)?.update;

        let patch = attachment_patch(config, prior)?;
        let _guard = data.locks.lock(&bare_metal_server_key(&server_id)).await;

        if patch.name.is_some() || patch.allowed_vlans.is_some() || patch.allow_to_float.is_some() {
            data.client
                .bare_metal_servers()
                .network_attachments(&server_id)
                .update(&attachment_id, &patch)
                .await
                .context(format!("bare metal server network attachment {}", attachment_id))?;
        }

        if let Some((vni_id, vni_patch)) = interface_block_patch(config, prior)? {
            data.client
                .virtual_network_interfaces()
                .update(&vni_id, &vni_patch)
                .await
                .context(format!("virtual network interface {}", vni_id))?;
        }

        if let Some(attachment) = wait_attachment(
            ctx,
            data,
            &server_id,
            &attachment_id,
            &tables::LIFECYCLE_STABLE,
            timeout,
        )
        .await?
        .reached()
        {
            flatten_attachment(state, &server_id, &attachment);
        }
        Ok(())
    }

    async fn delete_attachment(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        prior: &DynamicValue,
    ) -> Result<()> {
        let (server_id, attachment_id) = ids::parse_pair(&required_string(prior, "id")?)?;
        let timeout = timeouts(prior)?.delete;
        let attachments = data.client.bare_metal_servers().network_attachments(&server_id);

        let _guard = data.locks.lock(&bare_metal_server_key(&server_id)).await;

        let attachment = match attachments
            .get(&attachment_id)
            .await
            .context(format!("bare metal server network attachment {}", attachment_id))
        {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        };
        let pci = matches!(attachment, BareMetalServerNetworkAttachment::Pci(_));

        if pci {
            stop_for_pci(ctx, data, &server_id, hard_stop(prior)?, PciChange::Detach, WHAT, timeout)
                .await?;
        }

        match attachments
            .delete(&attachment_id)
            .await
            .context(format!("bare metal server network attachment {}", attachment_id))
        {
            Err(e) if e.is_not_found() => {}
            other => other?,
        }

        wait_attachment(
            ctx,
            data,
            &server_id,
            &attachment_id,
            &tables::LIFECYCLE_DELETED,
            timeout,
        )
        .await?;

        if pci {
            start_after_pci(ctx, data, &server_id, timeout).await?;
        }
        Ok(())
    }
}

fn validate_attachment_type(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    let Some(interface_type) = state_string(config, "interface_type") else {
        return diagnostics;
    };
    let set = |name: &str| {
        config
            .get(&path(name))
            .is_ok_and(|v| !v.is_null() && !matches!(v, Dynamic::Unknown))
    };

    let (own, foreign): (&[&str], &[&str]) = match interface_type.as_str() {
        "pci" => (&[], &["vlan", "allow_to_float"]),
        _ => (&["vlan"], &["allowed_vlans"]),
    };
    for name in foreign {
        if set(name) {
            diagnostics.push(
                Diagnostic::error(
                    "Conflicting attachment settings",
                    format!("{} cannot be set on a {} attachment", name, interface_type),
                )
                .with_attribute(path(name)),
            );
        }
    }
    for name in own {
        if !set(name) && !matches!(config.get(&path(name)), Ok(Dynamic::Unknown)) {
            diagnostics.push(
                Diagnostic::error(
                    "Missing attachment setting",
                    format!("{} is required on a {} attachment", name, interface_type),
                )
                .with_attribute(path(name)),
            );
        }
    }
    diagnostics
}

fn hard_stop(config: &DynamicValue) -> Result<bool> {
    Ok(config.get_optional_bool(&path(HARD_STOP))?.unwrap_or(true))
}

pub(crate) fn attachment_prototype(config: &DynamicValue) -> Result<NetworkAttachmentPrototype> {
    let name = config.get_optional_string(&path("name"))?;
    let virtual_network_interface = attachment_interface(config)?;

    match required_string(config, "interface_type")?.as_str() {
        "pci" => Ok(NetworkAttachmentPrototype::Pci {
            name,
            allowed_vlans: i64_list(config, "allowed_vlans")?,
            virtual_network_interface,
        }),
        "vlan" => Ok(NetworkAttachmentPrototype::Vlan {
            name,
            vlan: optional_i64(config, "vlan")?
                .ok_or_else(|| VpcError::precondition("vlan is required on a vlan attachment"))?,
            allow_to_float: config.get_optional_bool(&path("allow_to_float"))?,
            virtual_network_interface,
        }),
        other => Err(VpcError::precondition(format!(
            "unsupported interface_type '{}'",
            other
        ))),
    }
}

pub(crate) fn attachment_patch(config: &DynamicValue, prior: &DynamicValue) -> Result<NetworkAttachmentPatch> {
    let pci = state_string(prior, "interface_type").as_deref() == Some("pci");

    let allowed_vlans = if pci {
        let mut new = i64_list(config, "allowed_vlans")?;
        let mut old = i64_list(prior, "allowed_vlans").unwrap_or_default();
        new.sort_unstable();
        old.sort_unstable();
        (new != old).then_some(new)
    } else {
        None
    };

    Ok(NetworkAttachmentPatch {
        name: changed_string(config, prior, "name")?,
        allowed_vlans,
        allow_to_float: if pci {
            None
        } else {
            changed_bool(config, prior, "allow_to_float")?
        },
    })
}

async fn wait_attachment(
    ctx: &Context,
    data: &VpcProviderData,
    server_id: &str,
    attachment_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<WaitOutcome<BareMetalServerNetworkAttachment>> {
    let client = &data.client;
    wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("bare metal server network attachment {}", attachment_id),
        || async move {
            let attachment = client
                .bare_metal_servers()
                .network_attachments(server_id)
                .get(attachment_id)
                .await
                .context(format!("bare metal server network attachment {}", attachment_id))?;
            let state = attachment.common().lifecycle_state.clone();
            Ok((attachment, state))
        },
    )
    .await
}

fn flatten_attachment(
    state: &mut DynamicValue,
    server_id: &str,
    attachment: &BareMetalServerNetworkAttachment,
) {
    let common = attachment.common();
    put_string(state, "id", ids::make_id(&[server_id, common.id.as_str()]));
    put_string(state, "bare_metal_server", server_id);
    put_string(state, "network_attachment", &common.id);
    put_string(state, "interface_type", attachment.interface_type());
    put_string(state, "name", &common.name);
    put_string(state, "lifecycle_state", &common.lifecycle_state);
    put_opt_i64(state, "port_speed", common.port_speed);
    put_opt_string(state, "type", common.attachment_role.as_deref());
    put_opt_string(state, "subnet", common.subnet.as_ref().map(|s| s.id.as_str()));
    put_opt_string(state, "href", common.href.as_deref());
    put_opt_string(
        state,
        "created_at",
        common.created_at.map(|t| t.to_rfc3339()).as_deref(),
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
    match attachment {
        BareMetalServerNetworkAttachment::Pci(pci) => {
            put_i64s(state, "allowed_vlans", &pci.allowed_vlans);
            put_opt_i64(state, "vlan", None);
        }
        BareMetalServerNetworkAttachment::Vlan(vlan) => {
            put_i64s(state, "allowed_vlans", &[]);
            put_i64(state, "vlan", vlan.vlan);
            put_bool(state, "allow_to_float", vlan.allow_to_float);
        }
    }
    let _ = state.set_string(
        &AttributePath::new(INTERFACE_BLOCK).attribute("id"),
        common.virtual_network_interface.id.clone(),
    );
}

#[async_trait]
impl ResourceWithConfigure for BareMetalServerNetworkAttachmentResource {
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
impl ResourceWithImportState for BareMetalServerNetworkAttachmentResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match ids::parse_pair(&request.id) {
            Ok((server_id, attachment_id)) => {
                let mut state = DynamicValue::object();
                put_string(&mut state, "id", &request.id);
                put_string(&mut state, "bare_metal_server", server_id);
                put_string(&mut state, "network_attachment", attachment_id);
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
                    format!("Expected server/attachment: {}", e),
                )],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::provider_data;
    use mockito::{Matcher, Server};
    use std::any::Any;
    use std::collections::HashMap;
    use std::sync::Arc;

    const SERVER_PATH: &str = "/v1/bare_metal_servers/0717-bms";
    const ATTACHMENTS_PATH: &str = "/v1/bare_metal_servers/0717-bms/network_attachments";
    const ATTACHMENT_PATH: &str = "/v1/bare_metal_servers/0717-bms/network_attachments/0717-bna";

    fn attachment_json(interface_type: &str, state: &str) -> String {
        let mut body = serde_json::json!({
            "id": "0717-bna",
            "name": "eth3",
            "lifecycle_state": state,
            "interface_type": interface_type,
            "type": "secondary",
            "virtual_network_interface": {"id": "0717-vni"}
        });
        if interface_type == "vlan" {
            body["vlan"] = serde_json::json!(200);
            body["allow_to_float"] = serde_json::json!(true);
        } else {
            body["allowed_vlans"] = serde_json::json!([200]);
        }
        body.to_string()
    }

    fn config(interface_type: &str) -> DynamicValue {
        let mut block = HashMap::new();
        block.insert("id".to_string(), Dynamic::String("0717-vni".to_string()));
        let mut config = DynamicValue::object();
        put_string(&mut config, "bare_metal_server", "0717-bms");
        put_string(&mut config, "interface_type", interface_type);
        put_string(&mut config, "name", "eth3");
        config.set_map(&path(INTERFACE_BLOCK), block).unwrap();
        config
    }

    async fn configured(url: &str) -> BareMetalServerNetworkAttachmentResource {
        let mut resource = BareMetalServerNetworkAttachmentResource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(provider_data(url));
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;
        resource
    }

    #[test]
    fn vlan_attachment_needs_vlan() {
        let diagnostics = validate_attachment_type(&config("vlan"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Missing attachment setting");

        let mut pci = config("pci");
        put_i64(&mut pci, "vlan", 200);
        let diagnostics = validate_attachment_type(&pci);
        assert_eq!(diagnostics[0].summary, "Conflicting attachment settings");
    }

    #[test]
    fn prototype_by_interface_type() {
        let mut vlan = config("vlan");
        put_i64(&mut vlan, "vlan", 200);
        let body = serde_json::to_value(attachment_prototype(&vlan).unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "interface_type": "vlan",
                "name": "eth3",
                "vlan": 200,
                "virtual_network_interface": {"id": "0717-vni"}
            })
        );

        assert!(attachment_prototype(&config("vlan")).is_err());
    }

    #[test]
    fn patch_only_sends_settings_of_the_attachment_type() {
        let mut prior = config("vlan");
        put_bool(&mut prior, "allow_to_float", false);
        let mut new = config("vlan");
        put_bool(&mut new, "allow_to_float", true);
        put_i64s(&mut new, "allowed_vlans", &[300]);

        let patch = attachment_patch(&new, &prior).unwrap();
        assert_eq!(patch.allow_to_float, Some(true));
        assert!(patch.allowed_vlans.is_none());
    }

    #[tokio::test]
    async fn vlan_attachment_create_does_not_touch_server() {
        let mut server = Server::new_async().await;
        let server_calls = server
            .mock("GET", SERVER_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let create = server
            .mock("POST", ATTACHMENTS_PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({"interface_type": "vlan", "vlan": 200})))
            .with_status(201)
            .with_body(attachment_json("vlan", "pending"))
            .create_async()
            .await;
        server
            .mock("GET", ATTACHMENT_PATH)
            .match_query(Matcher::Any)
            .with_body(attachment_json("vlan", "stable"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let mut config = config("vlan");
        put_i64(&mut config, "vlan", 200);
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vpc_bare_metal_server_network_attachment".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state_string(&state, "id").as_deref(), Some("0717-bms/0717-bna"));
        assert_eq!(state_string(&state, "lifecycle_state").as_deref(), Some("stable"));
        assert!(state.get_bool(&path("allow_to_float")).unwrap());
        create.assert_async().await;
        server_calls.assert_async().await;
    }

    #[tokio::test]
    async fn pci_attachment_delete_restarts_server() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", ATTACHMENT_PATH)
            .match_query(Matcher::Any)
            .with_body(attachment_json("pci", "stable"))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", ATTACHMENT_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errors":[{"code":"not_found","message":"gone"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", SERVER_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"id":"0717-bms","name":"bms","status":"stopped"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", SERVER_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"id":"0717-bms","name":"bms","status":"running"}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", ATTACHMENT_PATH)
            .match_query(Matcher::Any)
            .with_status(202)
            .create_async()
            .await;
        let start = server
            .mock("POST", format!("{}/start", SERVER_PATH).as_str())
            .match_query(Matcher::Any)
            .with_status(204)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let mut prior = config("pci");
        put_string(&mut prior, "id", "0717-bms/0717-bna");
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vpc_bare_metal_server_network_attachment".to_string(),
                    prior_state: prior,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        delete.assert_async().await;
        start.assert_async().await;
    }
}
