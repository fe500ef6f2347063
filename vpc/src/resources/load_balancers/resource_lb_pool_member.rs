//! Load balancer pool member resource

use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ExistsResourceRequest, ExistsResourceResponse, ImportResourceStateRequest,
    ImportResourceStateResponse, ImportedResource, ReadResourceRequest, ReadResourceResponse,
    Resource, ResourceMetadataRequest, ResourceMetadataResponse, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, ResourceWithExists,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::NumberRangeValidator;
use tfplug::Timeouts;

use crate::api::common::Identity;
use crate::api::load_balancers::{
    MemberTarget, MemberTargetPrototype, PoolMember, PoolMemberPatch, PoolMemberPrototype,
};
use crate::error::{ApiResultExt, Result, VpcError};
use crate::ids;
use crate::locks::load_balancer_key;
use crate::resources::common::*;
use crate::wait::{tables, wait_for_state, StateTable, WaitOutcome};
use crate::VpcProviderData;

#[derive(Default)]
pub struct LbPoolMemberResource {
    provider_data: Option<VpcProviderData>,
}

impl LbPoolMemberResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for LbPoolMemberResource {
    fn type_name(&self) -> &str {
        "vpc_lb_pool_member"
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
            .description("Manages a member of a VPC load balancer pool")
            .attribute(id_attribute("Terraform ID in the form lb/pool/member"))
            .attribute(
                AttributeBuilder::new("lb", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("pool", AttributeType::String)
                    .description("Pool ID, either bare or as lb/pool")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("port", AttributeType::Number)
                    .required()
                    .validator(NumberRangeValidator {
                        min: Some(1.0),
                        max: Some(65535.0),
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("target_address", AttributeType::String)
                    .description("IP address of the member; conflicts with target_id")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("target_id", AttributeType::String)
                    .description("Instance ID of the member; conflicts with target_address")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("weight", AttributeType::Number)
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator {
                        min: Some(0.0),
                        max: Some(100.0),
                    })
                    .build(),
            )
            .attribute(AttributeBuilder::new("member_id", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("health", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("Provisioning status")
                    .computed()
                    .build(),
            )
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
        let mut diagnostics = vec![];

        if let Err(e) = target_from(&request.config) {
            diagnostics.push(
                Diagnostic::error("Invalid member target", e.to_string())
                    .with_attribute(path("target_address")),
            );
        }
        if let Ok(Some(pool)) = request.config.get_optional_string(&path("pool")) {
            if let Err(e) = ids::child_id(&pool) {
                diagnostics.push(
                    Diagnostic::error("Invalid pool", e.to_string()).with_attribute(path("pool")),
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
        if let Err(e) = self.create_member(&ctx, data, &request.config, &mut state).await {
            diagnostics.push(e.to_diagnostic("Failed to create pool member"));
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

        match self.read_member(data, &request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read pool member"));
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
            .update_member(&ctx, data, &request.config, &request.prior_state, &mut state)
            .await
        {
            Ok(()) => UpdateResourceResponse {
                new_state: state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to update pool member"));
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

        if let Err(e) = self.delete_member(&ctx, data, &request.prior_state).await {
            diagnostics.push(e.to_diagnostic("Failed to delete pool member"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl LbPoolMemberResource {
    async fn create_member(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let lb_id = required_string(config, "lb")?;
        let pool_id = ids::child_id(&required_string(config, "pool")?)?;
        let timeout = timeouts(config)?.create;

        let prototype = PoolMemberPrototype {
            port: optional_i64(config, "port")?
                .ok_or_else(|| VpcError::precondition("the 'port' attribute is required"))?,
            target: target_from(config)?,
            weight: optional_i64(config, "weight")?,
        };

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        let member = data
            .client
            .load_balancers()
            .pools(&lb_id)
            .members(&pool_id)
            .create(&prototype)
            .await
            .context(format!("pool {}", pool_id))?;
        tracing::info!("Created member {} in pool {}", member.id, pool_id);
        let member_id = member.id.clone();
        put_string(
            state,
            "id",
            ids::make_id(&[lb_id.as_str(), pool_id.as_str(), member_id.as_str()]),
        );
        put_string(state, "member_id", member_id.as_str());

        let member = wait_member(
            ctx,
            data,
            &lb_id,
            &pool_id,
            &member_id,
            &tables::LB_CHILD_ACTIVE,
            timeout,
        )
        .await?
        .reached()
        .unwrap_or(member);
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        flatten_member(state, &lb_id, &pool_id, &member);
        Ok(())
    }

    async fn read_member(&self, data: &VpcProviderData, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let (lb_id, pool_id, member_id) = ids::parse_triple(&required_string(state, "id")?)?;

        match data
            .client
            .load_balancers()
            .pools(&lb_id)
            .members(&pool_id)
            .get(&member_id)
            .await
            .context(format!("pool member {}", member_id))
        {
            Ok(member) => {
                let mut new_state = state.clone();
                flatten_member(&mut new_state, &lb_id, &pool_id, &member);
                Ok(Some(new_state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Pool member {} no longer exists, removing from state", member_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update_member(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        prior: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let (lb_id, pool_id, member_id) = ids::parse_triple(&required_string(prior, "id")?)?;
        let timeout = timeouts(config)?.update;

        let target = target_from(config)?;
        let target_changed = target_from(prior).ok().as_ref() != Some(&target);
        let patch = PoolMemberPatch {
            port: changed_i64(config, prior, "port")?,
            target: target_changed.then_some(target),
            weight: changed_i64(config, prior, "weight")?,
        };

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        data.client
            .load_balancers()
            .pools(&lb_id)
            .members(&pool_id)
            .update(&member_id, &patch)
            .await
            .context(format!("pool member {}", member_id))?;

        let member = wait_member(
            ctx,
            data,
            &lb_id,
            &pool_id,
            &member_id,
            &tables::LB_CHILD_ACTIVE,
            timeout,
        )
        .await?
        .reached();
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        if let Some(member) = member {
            flatten_member(state, &lb_id, &pool_id, &member);
        }
        Ok(())
    }

    async fn delete_member(&self, ctx: &Context, data: &VpcProviderData, prior: &DynamicValue) -> Result<()> {
        let (lb_id, pool_id, member_id) = ids::parse_triple(&required_string(prior, "id")?)?;
        let timeout = timeouts(prior)?.delete;

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        match wait_load_balancer_active(ctx, data, &lb_id, timeout).await {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        };

        match data
            .client
            .load_balancers()
            .pools(&lb_id)
            .members(&pool_id)
            .delete(&member_id)
            .await
            .context(format!("pool member {}", member_id))
        {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }

        wait_member(
            ctx,
            data,
            &lb_id,
            &pool_id,
            &member_id,
            &tables::LB_CHILD_DELETED,
            timeout,
        )
        .await?;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;
        Ok(())
    }
}

/// Exactly one of `target_address` and `target_id` names the member
fn target_from(config: &DynamicValue) -> Result<MemberTargetPrototype> {
    let address = config.get_optional_string(&path("target_address"))?;
    let instance = config.get_optional_string(&path("target_id"))?;
    match (address, instance) {
        (Some(address), None) => Ok(MemberTargetPrototype::Address { address }),
        (None, Some(id)) => Ok(MemberTargetPrototype::Instance(Identity::new(id))),
        (Some(_), Some(_)) => Err(VpcError::precondition(
            "only one of target_address and target_id may be set",
        )),
        (None, None) => Err(VpcError::precondition(
            "one of target_address or target_id must be set",
        )),
    }
}

async fn wait_member(
    ctx: &Context,
    data: &VpcProviderData,
    lb_id: &str,
    pool_id: &str,
    member_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<WaitOutcome<PoolMember>> {
    let client = &data.client;
    wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("pool member {}", member_id),
        || async move {
            let member = client
                .load_balancers()
                .pools(lb_id)
                .members(pool_id)
                .get(member_id)
                .await
                .context(format!("pool member {}", member_id))?;
            let status = member.provisioning_status.clone();
            Ok((member, status))
        },
    )
    .await
}

fn flatten_member(state: &mut DynamicValue, lb_id: &str, pool_id: &str, member: &PoolMember) {
    put_string(
        state,
        "id",
        ids::make_id(&[lb_id, pool_id, member.id.as_str()]),
    );
    put_string(state, "lb", lb_id);
    // Keep `pool` as configured when it already names this pool
    let configured_pool = state_string(state, "pool");
    let pool_matches = configured_pool
        .as_deref()
        .and_then(|p| ids::child_id(p).ok())
        .is_some_and(|p| p == pool_id);
    if !pool_matches {
        put_string(state, "pool", pool_id);
    }
    put_string(state, "member_id", &member.id);
    put_i64(state, "port", member.port);
    put_opt_i64(state, "weight", member.weight);
    put_opt_string(state, "health", member.health.as_deref());
    put_string(state, "status", &member.provisioning_status);
    put_opt_string(
        state,
        "created_at",
        member.created_at.map(|t| t.to_rfc3339()).as_deref(),
    );

    match &member.target {
        MemberTarget::Address { address } => {
            put_string(state, "target_address", address.as_str());
            put_opt_string(state, "target_id", None);
        }
        MemberTarget::Instance(reference) => {
            put_string(state, "target_id", reference.id.as_str());
            put_opt_string(state, "target_address", None);
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for LbPoolMemberResource {
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
impl ResourceWithImportState for LbPoolMemberResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match ids::parse_triple(&request.id) {
            Ok((lb_id, pool_id, member_id)) => {
                let mut state = DynamicValue::object();
                put_string(&mut state, "id", &request.id);
                put_string(&mut state, "lb", lb_id);
                put_string(&mut state, "pool", pool_id);
                put_string(&mut state, "member_id", member_id);
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
                    format!("Expected lb/pool/member: {}", e),
                )],
            },
        }
    }
}

#[async_trait]
impl ResourceWithExists for LbPoolMemberResource {
    async fn exists(&self, _ctx: Context, request: ExistsResourceRequest) -> ExistsResourceResponse {
        let Some(data) = &self.provider_data else {
            return ExistsResourceResponse {
                exists: false,
                diagnostics: vec![not_configured()],
            };
        };

        match self.read_member(data, &request.current_state).await {
            Ok(state) => ExistsResourceResponse {
                exists: state.is_some(),
                diagnostics: vec![],
            },
            Err(e) => ExistsResourceResponse {
                exists: false,
                diagnostics: vec![e.to_diagnostic("Failed to check pool member")],
            },
        }
    }
}
