//! Load balancer listener resource

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
use tfplug::validator::{NumberRangeValidator, OneOfValidator};
use tfplug::Timeouts;

use crate::api::common::Identity;
use crate::api::load_balancers::{Listener, ListenerPatch, ListenerPrototype};
use crate::error::{ApiResultExt, Result};
use crate::ids;
use crate::locks::load_balancer_key;
use crate::resources::common::*;
use crate::wait::{tables, wait_for_state, StateTable, WaitOutcome};
use crate::VpcProviderData;

const PROTOCOLS: &[&str] = &["http", "https", "tcp", "udp"];

#[derive(Default)]
pub struct LbListenerResource {
    provider_data: Option<VpcProviderData>,
}

impl LbListenerResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for LbListenerResource {
    fn type_name(&self) -> &str {
        "vpc_lb_listener"
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
            .description("Manages a listener of a VPC load balancer")
            .attribute(id_attribute("Terraform ID in the form lb/listener"))
            .attribute(
                AttributeBuilder::new("lb", AttributeType::String)
                    .description("Load balancer ID")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .description("Listener protocol")
                    .required()
                    .validator(OneOfValidator::new(PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("port", AttributeType::Number)
                    .description("Listener port")
                    .optional()
                    .validator(NumberRangeValidator {
                        min: Some(1.0),
                        max: Some(65535.0),
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("default_pool", AttributeType::String)
                    .description("Default pool ID, or the pool's lb/pool Terraform ID")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("connection_limit", AttributeType::Number)
                    .description("Maximum concurrent connections")
                    .optional()
                    .validator(NumberRangeValidator {
                        min: Some(1.0),
                        max: Some(15000.0),
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("idle_connection_timeout", AttributeType::Number)
                    .description("Idle connection timeout in seconds")
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator {
                        min: Some(50.0),
                        max: Some(7200.0),
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("listener_id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("Provisioning status")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("policies", AttributeType::List(Box::new(AttributeType::String)))
                    .description("IDs of the listener's policies")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::String)
                    .computed()
                    .build(),
            )
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

        if let Ok(Some(pool)) = request.config.get_optional_string(&path("default_pool")) {
            if let Err(e) = ids::pool_id_from_target(&pool) {
                diagnostics.push(
                    e.to_diagnostic("Invalid default pool").with_attribute(path("default_pool")),
                );
            }
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
        if let Err(e) = self.create_listener(&ctx, data, &request.config, &mut state).await {
            diagnostics.push(e.to_diagnostic("Failed to create load balancer listener"));
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

        match self.read_listener(data, &request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read load balancer listener"));
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
            .update_listener(&ctx, data, &request.config, &request.prior_state, &mut state)
            .await
        {
            Ok(()) => UpdateResourceResponse {
                new_state: state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to update load balancer listener"));
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

        if let Err(e) = self.delete_listener(&ctx, data, &request.prior_state).await {
            diagnostics.push(e.to_diagnostic("Failed to delete load balancer listener"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl LbListenerResource {
    async fn create_listener(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let lb_id = required_string(config, "lb")?;
        let timeout = timeouts(config)?.create;
        let default_pool = config
            .get_optional_string(&path("default_pool"))?
            .map(|p| ids::pool_id_from_target(&p))
            .transpose()?;

        let prototype = ListenerPrototype {
            protocol: required_string(config, "protocol")?,
            port: optional_i64(config, "port")?,
            default_pool: default_pool.map(Identity::new),
            connection_limit: optional_i64(config, "connection_limit")?,
            idle_connection_timeout: optional_i64(config, "idle_connection_timeout")?,
        };

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        let listener = data
            .client
            .load_balancers()
            .listeners(&lb_id)
            .create(&prototype)
            .await
            .context(format!("load balancer {}", lb_id))?;
        tracing::info!("Created listener {} on load balancer {}", listener.id, lb_id);
        let listener_id = listener.id.clone();
        put_string(state, "id", ids::make_id(&[lb_id.as_str(), listener_id.as_str()]));
        put_string(state, "listener_id", listener_id.as_str());

        let listener = wait_listener(ctx, data, &lb_id, &listener_id, &tables::LB_CHILD_ACTIVE, timeout)
            .await?
            .reached()
            .unwrap_or(listener);
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        flatten_listener(state, &lb_id, &listener);
        Ok(())
    }

    async fn read_listener(
        &self,
        data: &VpcProviderData,
        state: &DynamicValue,
    ) -> Result<Option<DynamicValue>> {
        let (lb_id, listener_id) = ids::parse_pair(&required_string(state, "id")?)?;

        match data
            .client
            .load_balancers()
            .listeners(&lb_id)
            .get(&listener_id)
            .await
            .context(format!("listener {}", listener_id))
        {
            Ok(listener) => {
                let mut new_state = state.clone();
                flatten_listener(&mut new_state, &lb_id, &listener);
                Ok(Some(new_state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Listener {} no longer exists, removing from state", listener_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update_listener(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        prior: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let (lb_id, listener_id) = ids::parse_pair(&required_string(prior, "id")?)?;
        let timeout = timeouts(config)?.update;

        let default_pool = match changed_string(config, prior, "default_pool")? {
            Some(pool) => Some(Identity::new(ids::pool_id_from_target(&pool)?)),
            None => None,
        };
        let patch = ListenerPatch {
            protocol: changed_string(config, prior, "protocol")?,
            port: changed_i64(config, prior, "port")?,
            default_pool,
            connection_limit: changed_i64(config, prior, "connection_limit")?,
            idle_connection_timeout: changed_i64(config, prior, "idle_connection_timeout")?,
        };

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        data.client
            .load_balancers()
            .listeners(&lb_id)
            .update(&listener_id, &patch)
            .await
            .context(format!("listener {}", listener_id))?;

        let listener = wait_listener(ctx, data, &lb_id, &listener_id, &tables::LB_CHILD_ACTIVE, timeout)
            .await?
            .reached();
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        if let Some(listener) = listener {
            flatten_listener(state, &lb_id, &listener);
        }
        Ok(())
    }

    async fn delete_listener(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        prior: &DynamicValue,
    ) -> Result<()> {
        let (lb_id, listener_id) = ids::parse_pair(&required_string(prior, "id")?)?;
        let timeout = timeouts(prior)?.delete;

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        match wait_load_balancer_active(ctx, data, &lb_id, timeout).await {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        };

        match data
            .client
            .load_balancers()
            .listeners(&lb_id)
            .delete(&listener_id)
            .await
            .context(format!("listener {}", listener_id))
        {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }

        wait_listener(ctx, data, &lb_id, &listener_id, &tables::LB_CHILD_DELETED, timeout).await?;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;
        Ok(())
    }
}

async fn wait_listener(
    ctx: &Context,
    data: &VpcProviderData,
    lb_id: &str,
    listener_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<WaitOutcome<Listener>> {
    let client = &data.client;
    wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("listener {}", listener_id),
        || async move {
            let listener = client
                .load_balancers()
                .listeners(lb_id)
                .get(listener_id)
                .await
                .context(format!("listener {}", listener_id))?;
            let status = listener.provisioning_status.clone();
            Ok((listener, status))
        },
    )
    .await
}

fn flatten_listener(state: &mut DynamicValue, lb_id: &str, listener: &Listener) {
    put_string(state, "id", ids::make_id(&[lb_id, listener.id.as_str()]));
    put_string(state, "lb", lb_id);
    put_string(state, "listener_id", &listener.id);
    put_string(state, "protocol", &listener.protocol);
    put_opt_i64(state, "port", listener.port);
    put_opt_i64(state, "connection_limit", listener.connection_limit);
    put_opt_i64(state, "idle_connection_timeout", listener.idle_connection_timeout);
    put_string(state, "status", &listener.provisioning_status);
    put_strings(state, "policies", listener.policies.iter().map(|p| p.id.clone()));
    put_opt_string(
        state,
        "created_at",
        listener.created_at.map(|t| t.to_rfc3339()).as_deref(),
    );

    // Keep the configured spelling (bare ID or lb/pool) when it names the same pool
    let configured = state_string(state, "default_pool");
    match (&listener.default_pool, configured) {
        (Some(pool), Some(current))
            if ids::pool_id_from_target(&current).ok().as_deref() == Some(pool.id.as_str()) => {}
        (Some(pool), _) => put_string(state, "default_pool", &pool.id),
        (None, _) => put_opt_string(state, "default_pool", None),
    }
}

#[async_trait]
impl ResourceWithConfigure for LbListenerResource {
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
impl ResourceWithImportState for LbListenerResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match ids::parse_pair(&request.id) {
            Ok((lb_id, listener_id)) => {
                let mut state = DynamicValue::object();
                put_string(&mut state, "id", &request.id);
                put_string(&mut state, "lb", lb_id);
                put_string(&mut state, "listener_id", listener_id);
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
                    format!("Expected lb/listener: {}", e),
                )],
            },
        }
    }
}

#[cfg(test)]
#[path = "./resource_lb_listener_test.rs"]
mod resource_lb_listener_test;
