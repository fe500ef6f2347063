//! Instance network attachment resource
//!
//! The attachment either reuses an existing virtual network interface
//! (`virtual_network_interface.id`) or has the API create one inline from
//! the remaining attributes of that block.

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
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::Timeouts;

use crate::api::instances::{
    InstanceNetworkAttachment, InstanceNetworkAttachmentPatch, InstanceNetworkAttachmentPrototype,
};
use crate::error::{ApiResultExt, Result};
use crate::ids;
use crate::locks::instance_key;
use crate::resources::common::*;
use crate::resources::network::interface_block::{
    attachment_interface, interface_block, interface_block_patch, validate_interface_block,
    INTERFACE_BLOCK,
};
use crate::wait::{tables, wait_for_state, StateTable, WaitOutcome};
use crate::VpcProviderData;

#[derive(Default)]
pub struct InstanceNetworkAttachmentResource {
    provider_data: Option<VpcProviderData>,
}

impl InstanceNetworkAttachmentResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for InstanceNetworkAttachmentResource {
    fn type_name(&self) -> &str {
        "vpc_instance_network_attachment"
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
            .description("Attaches a virtual network interface to an instance")
            .attribute(id_attribute("Terraform ID in the form instance/attachment"))
            .attribute(
                AttributeBuilder::new("instance", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(name_attribute("Attachment name").optional().computed().build())
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
        ValidateResourceConfigResponse {
            diagnostics: validate_interface_block(&request.config),
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
        if let Err(e) = self.create_attachment(&ctx, data, &request.config, &mut state).await {
            diagnostics.push(e.to_diagnostic("Failed to create instance network attachment"));
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
                diagnostics.push(e.to_diagnostic("Failed to read instance network attachment"));
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
                diagnostics.push(e.to_diagnostic("Failed to update instance network attachment"));
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
            diagnostics.push(e.to_diagnostic("Failed to delete instance network attachment"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl InstanceNetworkAttachmentResource {
    async fn create_attachment(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let instance_id = required_string(config, "instance")?;
        let timeout = timeouts(config)?.create;

        let prototype = InstanceNetworkAttachmentPrototype {
            name: config.get_optional_string(&path("name"))?,
            virtual_network_interface: attachment_interface(config)?,
        };

        let _guard = data.locks.lock(&instance_key(&instance_id)).await;
        let attachment = data
            .client
            .instances()
            .network_attachments(&instance_id)
            .create(&prototype)
            .await
            .context(format!("instance {}", instance_id))?;
        tracing::info!(
            "Created network attachment {} on instance {}",
            attachment.id,
            instance_id
        );
        let attachment_id = attachment.id.clone();
        put_string(
            state,
            "id",
            ids::make_id(&[instance_id.as_str(), attachment_id.as_str()]),
        );
        put_string(state, "network_attachment", attachment_id.as_str());

        let attachment = wait_attachment(
            ctx,
            data,
            &instance_id,
            &attachment_id,
            &tables::LIFECYCLE_STABLE,
            timeout,
        )
        .await?
        .reached()
        .unwrap_or(attachment);

        flatten_attachment(state, &instance_id, &attachment);
        Ok(())
    }

    async fn read_attachment(
        &self,
        data: &VpcProviderData,
        state: &DynamicValue,
    ) -> Result<Option<DynamicValue>> {
        let (instance_id, attachment_id) = ids::parse_pair(&required_string(state, "id")?)?;

        match data
            .client
            .instances()
            .network_attachments(&instance_id)
            .get(&attachment_id)
            .await
            .context(format!("instance network attachment {}", attachment_id))
        {
            Ok(attachment) => {
                let mut new_state = state.clone();
                flatten_attachment(&mut new_state, &instance_id, &attachment);
                Ok(Some(new_state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "Instance network attachment {} no longer exists, removing from state",
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
        let (instance_id, attachment_id) = ids::parse_pair(&required_string(prior, "id")?)?;
        let timeout = timeouts(config)?.update;

        let _guard = data.locks.lock(&instance_key(&instance_id)).await;

        if let Some(name) = changed_string(config, prior, "name")? {
            data.client
                .instances()
                .network_attachments(&instance_id)
                .update(
                    &attachment_id,
                    &InstanceNetworkAttachmentPatch { name: Some(name) },
                )
                .await
                .context(format!("instance network attachment {}", attachment_id))?;
        }

        if let Some((vni_id, patch)) = interface_block_patch(config, prior)? {
            data.client
                .virtual_network_interfaces()
                .update(&vni_id, &patch)
                .await
                .context(format!("virtual network interface {}", vni_id))?;
        }

        if let Some(attachment) = wait_attachment(
            ctx,
            data,
            &instance_id,
            &attachment_id,
            &tables::LIFECYCLE_STABLE,
            timeout,
        )
        .await?
        .reached()
        {
            flatten_attachment(state, &instance_id, &attachment);
        }
        Ok(())
    }

    async fn delete_attachment(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        prior: &DynamicValue,
    ) -> Result<()> {
        let (instance_id, attachment_id) = ids::parse_pair(&required_string(prior, "id")?)?;
        let timeout = timeouts(prior)?.delete;

        let _guard = data.locks.lock(&instance_key(&instance_id)).await;
        match data
            .client
            .instances()
            .network_attachments(&instance_id)
            .delete(&attachment_id)
            .await
            .context(format!("instance network attachment {}", attachment_id))
        {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }

        wait_attachment(
            ctx,
            data,
            &instance_id,
            &attachment_id,
            &tables::LIFECYCLE_DELETED,
            timeout,
        )
        .await?;
        Ok(())
    }
}

async fn wait_attachment(
    ctx: &Context,
    data: &VpcProviderData,
    instance_id: &str,
    attachment_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<WaitOutcome<InstanceNetworkAttachment>> {
    let client = &data.client;
    wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("instance network attachment {}", attachment_id),
        || async move {
            let attachment = client
                .instances()
                .network_attachments(instance_id)
                .get(attachment_id)
                .await
                .context(format!("instance network attachment {}", attachment_id))?;
            let state = attachment.lifecycle_state.clone();
            Ok((attachment, state))
        },
    )
    .await
}

fn flatten_attachment(state: &mut DynamicValue, instance_id: &str, attachment: &InstanceNetworkAttachment) {
    put_string(
        state,
        "id",
        ids::make_id(&[instance_id, attachment.id.as_str()]),
    );
    put_string(state, "instance", instance_id);
    put_string(state, "network_attachment", &attachment.id);
    put_string(state, "name", &attachment.name);
    put_string(state, "lifecycle_state", &attachment.lifecycle_state);
    put_opt_i64(state, "port_speed", attachment.port_speed);
    put_opt_string(state, "type", attachment.attachment_type.as_deref());
    put_opt_string(state, "subnet", attachment.subnet.as_ref().map(|s| s.id.as_str()));
    put_opt_string(state, "href", attachment.href.as_deref());
    put_opt_string(
        state,
        "created_at",
        attachment.created_at.map(|t| t.to_rfc3339()).as_deref(),
    );
    put_object(
        state,
        "primary_ip",
        attachment.primary_ip.as_ref().map(|ip| {
            vec![
                ("address", tfplug::Dynamic::String(ip.address.clone())),
                ("reserved_ip", tfplug::Dynamic::String(ip.id.clone())),
                ("name", opt_dynamic(ip.name.as_deref())),
            ]
        }),
    );
    let _ = state.set_string(
        &AttributePath::new(INTERFACE_BLOCK).attribute("id"),
        attachment.virtual_network_interface.id.clone(),
    );
}

#[async_trait]
impl ResourceWithConfigure for InstanceNetworkAttachmentResource {
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
impl ResourceWithImportState for InstanceNetworkAttachmentResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match ids::parse_pair(&request.id) {
            Ok((instance_id, attachment_id)) => {
                let mut state = DynamicValue::object();
                put_string(&mut state, "id", &request.id);
                put_string(&mut state, "instance", instance_id);
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
                    format!("Expected instance/attachment: {}", e),
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
    use tfplug::Dynamic;

    fn attachment_json(state: &str) -> String {
        serde_json::json!({
            "id": "0717-ina",
            "name": "eth1",
            "lifecycle_state": state,
            "port_speed": 1000,
            "type": "secondary",
            "primary_ip": {"address": "10.240.0.8", "id": "0717-rip"},
            "subnet": {"id": "0717-subnet"},
            "virtual_network_interface": {"id": "0717-vni"}
        })
        .to_string()
    }

    #[tokio::test]
    async fn create_with_inline_interface() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v1/instances/0717-inst/network_attachments")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(serde_json::json!({
                "name": "eth1",
                "virtual_network_interface": {
                    "name": "app-vni",
                    "subnet": {"id": "0717-subnet"},
                    "primary_ip": {"address": "10.240.0.8"}
                }
            })))
            .with_status(201)
            .with_body(attachment_json("pending"))
            .create_async()
            .await;
        server
            .mock("GET", "/v1/instances/0717-inst/network_attachments/0717-ina")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(attachment_json("stable"))
            .create_async()
            .await;

        let mut resource = InstanceNetworkAttachmentResource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(provider_data(&server.url()));
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;

        let mut primary_ip = HashMap::new();
        primary_ip.insert("address".to_string(), Dynamic::String("10.240.0.8".to_string()));
        let mut block = HashMap::new();
        block.insert("name".to_string(), Dynamic::String("app-vni".to_string()));
        block.insert("subnet".to_string(), Dynamic::String("0717-subnet".to_string()));
        block.insert("primary_ip".to_string(), Dynamic::Map(primary_ip));

        let mut config = DynamicValue::object();
        put_string(&mut config, "instance", "0717-inst");
        put_string(&mut config, "name", "eth1");
        config.set_map(&path(INTERFACE_BLOCK), block).unwrap();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vpc_instance_network_attachment".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state_string(&state, "id").as_deref(), Some("0717-inst/0717-ina"));
        assert_eq!(
            state
                .get_string(&AttributePath::new(INTERFACE_BLOCK).attribute("id"))
                .unwrap(),
            "0717-vni"
        );
        assert_eq!(state.get_number(&path("port_speed")).unwrap(), 1000.0);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn same_instance_mutations_share_a_lock() {
        let data = provider_data("http://127.0.0.1:1");
        let guard = data.locks.lock(&instance_key("0717-inst")).await;

        let locks = data.locks.clone();
        let mut waiter = tokio_test::task::spawn(async move {
            let _guard = locks.lock(&instance_key("0717-inst")).await;
        });
        tokio_test::assert_pending!(waiter.poll());

        drop(guard);
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }
}
