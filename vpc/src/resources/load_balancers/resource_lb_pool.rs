//! Load balancer pool resource

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
use tfplug::validator::{NumberRangeValidator, OneOfValidator};
use tfplug::Timeouts;

use crate::api::load_balancers::{HealthMonitor, Pool, PoolPatch, PoolPrototype, SessionPersistence};
use crate::error::{ApiResultExt, Result, VpcError};
use crate::ids;
use crate::locks::load_balancer_key;
use crate::resources::common::*;
use crate::wait::{tables, wait_for_state, StateTable, WaitOutcome};
use crate::VpcProviderData;

const ALGORITHMS: &[&str] = &["round_robin", "weighted_round_robin", "least_connections"];
const PROTOCOLS: &[&str] = &["http", "https", "tcp", "udp"];
const HEALTH_TYPES: &[&str] = &["http", "https", "tcp"];
const PROXY_PROTOCOLS: &[&str] = &["disabled", "v1", "v2"];
const PERSISTENCE_TYPES: &[&str] = &["source_ip", "app_cookie", "http_cookie"];

const HEALTH_MONITOR: &str = "health_monitor";

#[derive(Default)]
pub struct LbPoolResource {
    provider_data: Option<VpcProviderData>,
}

impl LbPoolResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for LbPoolResource {
    fn type_name(&self) -> &str {
        "vpc_lb_pool"
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
        let health_monitor = NestedBlockBuilder::new(HEALTH_MONITOR, NestingMode::Single)
            .description("Health checks run against pool members")
            .min_items(1)
            .attribute(
                AttributeBuilder::new("delay", AttributeType::Number)
                    .description("Seconds between checks")
                    .required()
                    .validator(NumberRangeValidator {
                        min: Some(2.0),
                        max: Some(60.0),
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_retries", AttributeType::Number)
                    .required()
                    .validator(NumberRangeValidator {
                        min: Some(1.0),
                        max: Some(10.0),
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("timeout", AttributeType::Number)
                    .description("Seconds to wait for a check response")
                    .required()
                    .validator(NumberRangeValidator {
                        min: Some(1.0),
                        max: Some(59.0),
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .required()
                    .validator(OneOfValidator::new(HEALTH_TYPES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url_path", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("port", AttributeType::Number)
                    .optional()
                    .build(),
            )
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a pool of a VPC load balancer")
            .attribute(id_attribute("Terraform ID in the form lb/pool"))
            .attribute(
                AttributeBuilder::new("lb", AttributeType::String)
                    .description("Load balancer ID")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(name_attribute("Pool name").required().build())
            .attribute(
                AttributeBuilder::new("algorithm", AttributeType::String)
                    .required()
                    .validator(OneOfValidator::new(ALGORITHMS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .required()
                    .validator(OneOfValidator::new(PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("proxy_protocol", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(OneOfValidator::new(PROXY_PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("session_persistence_type", AttributeType::String)
                    .optional()
                    .validator(OneOfValidator::new(PERSISTENCE_TYPES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("session_persistence_cookie_name", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(AttributeBuilder::new("pool_id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("Provisioning status")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("members", AttributeType::List(Box::new(AttributeType::String)))
                    .description("IDs of the pool's members")
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("created_at", AttributeType::String).computed().build())
            .block(health_monitor)
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

        let persistence = config
            .get_optional_string(&path("session_persistence_type"))
            .ok()
            .flatten();
        let cookie = config
            .get_optional_string(&path("session_persistence_cookie_name"))
            .ok()
            .flatten();
        if cookie.is_some() && persistence.as_deref() != Some("app_cookie") {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid session persistence",
                    "session_persistence_cookie_name requires session_persistence_type = \"app_cookie\"",
                )
                .with_attribute(path("session_persistence_cookie_name")),
            );
        }

        let health_type = config
            .get_optional_string(&AttributePath::new(HEALTH_MONITOR).attribute("type"))
            .ok()
            .flatten();
        let url_path = config
            .get_optional_string(&AttributePath::new(HEALTH_MONITOR).attribute("url_path"))
            .ok()
            .flatten();
        if health_type.as_deref() == Some("tcp") && url_path.is_some() {
            diagnostics.push(Diagnostic::error(
                "Invalid health monitor",
                "url_path cannot be set for tcp health checks",
            ));
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
        if let Err(e) = self.create_pool(&ctx, data, &request.config, &mut state).await {
            diagnostics.push(e.to_diagnostic("Failed to create load balancer pool"));
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

        match self.read_pool(data, &request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read load balancer pool"));
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
            .update_pool(&ctx, data, &request.config, &request.prior_state, &mut state)
            .await
        {
            Ok(()) => UpdateResourceResponse {
                new_state: state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to update load balancer pool"));
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

        if let Err(e) = self.delete_pool(&ctx, data, &request.prior_state).await {
            diagnostics.push(e.to_diagnostic("Failed to delete load balancer pool"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl LbPoolResource {
    async fn create_pool(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let lb_id = required_string(config, "lb")?;
        let timeout = timeouts(config)?.create;

        let prototype = PoolPrototype {
            name: Some(required_string(config, "name")?),
            algorithm: required_string(config, "algorithm")?,
            protocol: required_string(config, "protocol")?,
            health_monitor: health_monitor_from(config)?,
            proxy_protocol: config.get_optional_string(&path("proxy_protocol"))?,
            session_persistence: session_persistence_from(config)?,
        };

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        let pool = data
            .client
            .load_balancers()
            .pools(&lb_id)
            .create(&prototype)
            .await
            .context(format!("load balancer {}", lb_id))?;
        tracing::info!("Created pool {} on load balancer {}", pool.id, lb_id);
        let pool_id = pool.id.clone();
        put_string(state, "id", ids::make_id(&[lb_id.as_str(), pool_id.as_str()]));
        put_string(state, "pool_id", pool_id.as_str());

        let pool = wait_pool(ctx, data, &lb_id, &pool_id, &tables::LB_CHILD_ACTIVE, timeout)
            .await?
            .reached()
            .unwrap_or(pool);
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        flatten_pool(state, &lb_id, &pool);
        Ok(())
    }

    async fn read_pool(&self, data: &VpcProviderData, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let (lb_id, pool_id) = ids::parse_pair(&required_string(state, "id")?)?;

        match data
            .client
            .load_balancers()
            .pools(&lb_id)
            .get(&pool_id)
            .await
            .context(format!("pool {}", pool_id))
        {
            Ok(pool) => {
                let mut new_state = state.clone();
                flatten_pool(&mut new_state, &lb_id, &pool);
                Ok(Some(new_state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Pool {} no longer exists, removing from state", pool_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update_pool(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        prior: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let (lb_id, pool_id) = ids::parse_pair(&required_string(prior, "id")?)?;
        let timeout = timeouts(config)?.update;

        let monitor = health_monitor_from(config)?;
        let prior_monitor = health_monitor_from(prior).ok();
        let patch = PoolPatch {
            name: changed_string(config, prior, "name")?,
            algorithm: changed_string(config, prior, "algorithm")?,
            protocol: changed_string(config, prior, "protocol")?,
            health_monitor: (prior_monitor.as_ref() != Some(&monitor)).then_some(monitor),
            proxy_protocol: changed_string(config, prior, "proxy_protocol")?,
        };

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        data.client
            .load_balancers()
            .pools(&lb_id)
            .update(&pool_id, &patch)
            .await
            .context(format!("pool {}", pool_id))?;

        let pool = wait_pool(ctx, data, &lb_id, &pool_id, &tables::LB_CHILD_ACTIVE, timeout)
            .await?
            .reached();
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        if let Some(pool) = pool {
            flatten_pool(state, &lb_id, &pool);
        }
        Ok(())
    }

    async fn delete_pool(&self, ctx: &Context, data: &VpcProviderData, prior: &DynamicValue) -> Result<()> {
        let (lb_id, pool_id) = ids::parse_pair(&required_string(prior, "id")?)?;
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
            .delete(&pool_id)
            .await
            .context(format!("pool {}", pool_id))
        {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }

        wait_pool(ctx, data, &lb_id, &pool_id, &tables::LB_CHILD_DELETED, timeout).await?;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;
        Ok(())
    }
}

fn health_monitor_from(config: &DynamicValue) -> Result<HealthMonitor> {
    let attr = |name: &str| AttributePath::new(HEALTH_MONITOR).attribute(name);
    let number = |name: &str| -> Result<i64> {
        config
            .get_number(&attr(name))
            .map(|n| n as i64)
            .map_err(|_| VpcError::precondition(format!("{}.{} is required", HEALTH_MONITOR, name)))
    };

    Ok(HealthMonitor {
        delay: number("delay")?,
        max_retries: number("max_retries")?,
        timeout: number("timeout")?,
        monitor_type: config
            .get_string(&attr("type"))
            .map_err(|_| VpcError::precondition("health_monitor.type is required"))?,
        url_path: config.get_optional_string(&attr("url_path"))?,
        port: config.get_optional_number(&attr("port"))?.map(|n| n as i64),
    })
}

fn session_persistence_from(config: &DynamicValue) -> Result<Option<SessionPersistence>> {
    Ok(config
        .get_optional_string(&path("session_persistence_type"))?
        .map(|persistence_type| -> Result<SessionPersistence> {
            Ok(SessionPersistence {
                persistence_type,
                cookie_name: config.get_optional_string(&path("session_persistence_cookie_name"))?,
            })
        })
        .transpose()?)
}

async fn wait_pool(
    ctx: &Context,
    data: &VpcProviderData,
    lb_id: &str,
    pool_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<WaitOutcome<Pool>> {
    let client = &data.client;
    wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("pool {}", pool_id),
        || async move {
            let pool = client
                .load_balancers()
                .pools(lb_id)
                .get(pool_id)
                .await
                .context(format!("pool {}", pool_id))?;
            let status = pool.provisioning_status.clone();
            Ok((pool, status))
        },
    )
    .await
}

fn flatten_pool(state: &mut DynamicValue, lb_id: &str, pool: &Pool) {
    put_string(state, "id", ids::make_id(&[lb_id, pool.id.as_str()]));
    put_string(state, "lb", lb_id);
    put_string(state, "pool_id", &pool.id);
    put_string(state, "name", &pool.name);
    put_string(state, "algorithm", &pool.algorithm);
    put_string(state, "protocol", &pool.protocol);
    put_opt_string(state, "proxy_protocol", pool.proxy_protocol.as_deref());
    put_string(state, "status", &pool.provisioning_status);
    put_strings(state, "members", pool.members.iter().map(|m| m.id.clone()));
    put_opt_string(
        state,
        "created_at",
        pool.created_at.map(|t| t.to_rfc3339()).as_deref(),
    );

    let persistence = pool.session_persistence.as_ref();
    put_opt_string(
        state,
        "session_persistence_type",
        persistence.map(|p| p.persistence_type.as_str()),
    );
    put_opt_string(
        state,
        "session_persistence_cookie_name",
        persistence.and_then(|p| p.cookie_name.as_deref()),
    );

    let monitor = &pool.health_monitor;
    let mut block = HashMap::new();
    block.insert("delay".to_string(), Dynamic::Number(monitor.delay as f64));
    block.insert("max_retries".to_string(), Dynamic::Number(monitor.max_retries as f64));
    block.insert("timeout".to_string(), Dynamic::Number(monitor.timeout as f64));
    block.insert("type".to_string(), Dynamic::String(monitor.monitor_type.clone()));
    block.insert("url_path".to_string(), opt_dynamic(monitor.url_path.as_deref()));
    block.insert(
        "port".to_string(),
        monitor.port.map_or(Dynamic::Null, |p| Dynamic::Number(p as f64)),
    );
    let _ = state.set_map(&path(HEALTH_MONITOR), block);
}

#[async_trait]
impl ResourceWithConfigure for LbPoolResource {
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
impl ResourceWithImportState for LbPoolResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match ids::parse_pair(&request.id) {
            Ok((lb_id, pool_id)) => {
                let mut state = DynamicValue::object();
                put_string(&mut state, "id", &request.id);
                put_string(&mut state, "lb", lb_id);
                put_string(&mut state, "pool_id", pool_id);
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
                    format!("Expected lb/pool: {}", e),
                )],
            },
        }
    }
}
