//! Load balancer listener policy resource
//!
//! A policy routes requests matching all of its rules. What happens to the
//! request depends on `action`:
//!
//! - `forward` sends it to the pool named by `target_id`
//! - `redirect` answers with `target_http_status_code` and `target_url`
//! - `https_redirect` sends it to another listener of the same load balancer
//! - `reject` drops it
//!
//! Rules cannot be edited in place; changing any of them replaces the policy.

use async_trait::async_trait;
use std::collections::HashMap;
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberRangeValidator, OneOfValidator};
use tfplug::Timeouts;

use crate::api::common::Identity;
use crate::api::load_balancers::{
    ListenerPolicy, ListenerPolicyPatch, ListenerPolicyPrototype, ListenerPolicyRule,
    ListenerPolicyRulePrototype, ListenerPolicyTarget, ListenerPolicyTargetPrototype,
};
use crate::error::{ApiResultExt, Result, VpcError};
use crate::ids;
use crate::locks::load_balancer_key;
use crate::resources::common::*;
use crate::wait::{tables, wait_for_state, StateTable, WaitOutcome};
use crate::VpcProviderData;

const ACTIONS: &[&str] = &["forward", "redirect", "reject", "https_redirect"];
const RULE_CONDITIONS: &[&str] = &["contains", "equals", "matches_regex"];
const RULE_TYPES: &[&str] = &["header", "hostname", "path", "query", "body"];
const REDIRECT_STATUS_CODES: &[i64] = &[301, 302, 303, 307, 308];

const RULES: &str = "rules";

const TARGET_ATTRIBUTES: &[&str] = &[
    "target_id",
    "target_http_status_code",
    "target_url",
    "target_https_redirect_listener",
    "target_https_redirect_status_code",
    "target_https_redirect_uri",
];

#[derive(Default)]
pub struct LbListenerPolicyResource {
    provider_data: Option<VpcProviderData>,
}

impl LbListenerPolicyResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for LbListenerPolicyResource {
    fn type_name(&self) -> &str {
        "vpc_lb_listener_policy"
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
        let rules = NestedBlockBuilder::new(RULES, NestingMode::List)
            .description("Conditions a request must match; all rules must hold")
            .attribute(
                AttributeBuilder::new("condition", AttributeType::String)
                    .required()
                    .force_new()
                    .validator(OneOfValidator::new(RULE_CONDITIONS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .required()
                    .force_new()
                    .validator(OneOfValidator::new(RULE_TYPES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("field", AttributeType::String)
                    .description("Header, query or body parameter name")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("value", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(AttributeBuilder::new("rule_id", AttributeType::String).computed().build())
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a policy of a VPC load balancer listener")
            .attribute(id_attribute("Terraform ID in the form lb/listener/policy"))
            .attribute(
                AttributeBuilder::new("lb", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("listener", AttributeType::String)
                    .description("Listener ID, either bare or as lb/listener")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("action", AttributeType::String)
                    .required()
                    .force_new()
                    .validator(OneOfValidator::new(ACTIONS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("priority", AttributeType::Number)
                    .description("Evaluation order; lower values are evaluated first")
                    .required()
                    .validator(NumberRangeValidator {
                        min: Some(1.0),
                        max: Some(10.0),
                    })
                    .build(),
            )
            .attribute(name_attribute("Policy name").optional().computed().build())
            .attribute(
                AttributeBuilder::new("target_id", AttributeType::String)
                    .description("Pool to forward to, either bare or as lb/pool")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("target_http_status_code", AttributeType::Number)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("target_url", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("target_https_redirect_listener", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("target_https_redirect_status_code", AttributeType::Number)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("target_https_redirect_uri", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(AttributeBuilder::new("policy_id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("Provisioning status")
                    .computed()
                    .build(),
            )
            .attribute(AttributeBuilder::new("created_at", AttributeType::String).computed().build())
            .block(rules)
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
            diagnostics: validate_policy_config(&request.config),
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
        if let Err(e) = self.create_policy(&ctx, data, &request.config, &mut state).await {
            diagnostics.push(e.to_diagnostic("Failed to create listener policy"));
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

        match self.read_policy(data, &request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read listener policy"));
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
            .update_policy(&ctx, data, &request.config, &request.prior_state, &mut state)
            .await
        {
            Ok(()) => UpdateResourceResponse {
                new_state: state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to update listener policy"));
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

        if let Err(e) = self.delete_policy(&ctx, data, &request.prior_state).await {
            diagnostics.push(e.to_diagnostic("Failed to delete listener policy"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl LbListenerPolicyResource {
    async fn create_policy(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let lb_id = required_string(config, "lb")?;
        let listener_id = ids::child_id(&required_string(config, "listener")?)?;
        let timeout = timeouts(config)?.create;

        let action = required_string(config, "action")?;
        let prototype = ListenerPolicyPrototype {
            target: target_from(config, &action)?,
            action,
            priority: optional_i64(config, "priority")?
                .ok_or_else(|| VpcError::precondition("the 'priority' attribute is required"))?,
            name: config.get_optional_string(&path("name"))?,
            rules: rules_from(config)?,
        };

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        let policy = data
            .client
            .load_balancers()
            .listeners(&lb_id)
            .policies(&listener_id)
            .create(&prototype)
            .await
            .context(format!("listener {}", listener_id))?;
        tracing::info!("Created policy {} on listener {}", policy.id, listener_id);
        let policy_id = policy.id.clone();
        put_string(
            state,
            "id",
            ids::make_id(&[lb_id.as_str(), listener_id.as_str(), policy_id.as_str()]),
        );
        put_string(state, "policy_id", policy_id.as_str());

        let policy = wait_policy(
            ctx,
            data,
            &lb_id,
            &listener_id,
            &policy_id,
            &tables::LB_CHILD_ACTIVE,
            timeout,
        )
        .await?
        .reached()
        .unwrap_or(policy);
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        flatten_policy(state, &lb_id, &listener_id, &policy);
        Ok(())
    }

    async fn read_policy(&self, data: &VpcProviderData, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let (lb_id, listener_id, policy_id) = ids::parse_triple(&required_string(state, "id")?)?;

        match data
            .client
            .load_balancers()
            .listeners(&lb_id)
            .policies(&listener_id)
            .get(&policy_id)
            .await
            .context(format!("listener policy {}", policy_id))
        {
            Ok(policy) => {
                let mut new_state = state.clone();
                flatten_policy(&mut new_state, &lb_id, &listener_id, &policy);
                Ok(Some(new_state))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Listener policy {} no longer exists, removing from state", policy_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update_policy(
        &self,
        ctx: &Context,
        data: &VpcProviderData,
        config: &DynamicValue,
        prior: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Result<()> {
        let (lb_id, listener_id, policy_id) = ids::parse_triple(&required_string(prior, "id")?)?;
        let timeout = timeouts(config)?.update;

        let action = required_string(config, "action")?;
        let target = target_from(config, &action)?;
        let prior_target = target_from(prior, &action).ok().flatten();
        let patch = ListenerPolicyPatch {
            name: changed_string(config, prior, "name")?,
            priority: changed_i64(config, prior, "priority")?,
            target: target.filter(|t| Some(t) != prior_target.as_ref()),
        };

        let _guard = data.locks.lock(&load_balancer_key(&lb_id)).await;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        data.client
            .load_balancers()
            .listeners(&lb_id)
            .policies(&listener_id)
            .update(&policy_id, &patch)
            .await
            .context(format!("listener policy {}", policy_id))?;

        let policy = wait_policy(
            ctx,
            data,
            &lb_id,
            &listener_id,
            &policy_id,
            &tables::LB_CHILD_ACTIVE,
            timeout,
        )
        .await?
        .reached();
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;

        if let Some(policy) = policy {
            flatten_policy(state, &lb_id, &listener_id, &policy);
        }
        Ok(())
    }

    async fn delete_policy(&self, ctx: &Context, data: &VpcProviderData, prior: &DynamicValue) -> Result<()> {
        let (lb_id, listener_id, policy_id) = ids::parse_triple(&required_string(prior, "id")?)?;
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
            .policies(&listener_id)
            .delete(&policy_id)
            .await
            .context(format!("listener policy {}", policy_id))
        {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }

        wait_policy(
            ctx,
            data,
            &lb_id,
            &listener_id,
            &policy_id,
            &tables::LB_CHILD_DELETED,
            timeout,
        )
        .await?;
        wait_load_balancer_active(ctx, data, &lb_id, timeout).await?;
        Ok(())
    }
}

fn is_set(config: &DynamicValue, name: &str) -> bool {
    match config.get(&path(name)) {
        Ok(Dynamic::Null) | Err(_) => false,
        Ok(_) => true,
    }
}

fn is_known(config: &DynamicValue, name: &str) -> bool {
    !matches!(config.get(&path(name)), Ok(Dynamic::Unknown))
}

/// Cross-attribute checks on the action and its target attributes
pub(crate) fn validate_policy_config(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    let Ok(Some(action)) = config.get_optional_string(&path("action")) else {
        return diagnostics;
    };

    let required: &[&str] = match action.as_str() {
        "forward" => &["target_id"],
        "redirect" => &["target_http_status_code", "target_url"],
        "https_redirect" => &["target_https_redirect_listener", "target_https_redirect_status_code"],
        _ => &[],
    };
    let allowed: &[&str] = match action.as_str() {
        "https_redirect" => &[
            "target_https_redirect_listener",
            "target_https_redirect_status_code",
            "target_https_redirect_uri",
        ],
        _ => required,
    };

    for name in required {
        if is_known(config, name) && !is_set(config, name) {
            diagnostics.push(
                Diagnostic::error(
                    "Missing policy target",
                    format!("action \"{}\" requires {}", action, name),
                )
                .with_attribute(path(name)),
            );
        }
    }
    for name in TARGET_ATTRIBUTES {
        if !allowed.contains(name) && is_set(config, name) {
            diagnostics.push(
                Diagnostic::error(
                    "Conflicting policy target",
                    format!("{} cannot be set when action is \"{}\"", name, action),
                )
                .with_attribute(path(name)),
            );
        }
    }

    let status_attr = match action.as_str() {
        "redirect" => Some("target_http_status_code"),
        "https_redirect" => Some("target_https_redirect_status_code"),
        _ => None,
    };
    if let Some(name) = status_attr {
        if let Ok(Some(code)) = optional_i64(config, name) {
            if !REDIRECT_STATUS_CODES.contains(&code) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid redirect status code",
                        format!("{} must be one of {:?}, got {}", name, REDIRECT_STATUS_CODES, code),
                    )
                    .with_attribute(path(name)),
                );
            }
        }
    }

    if action == "forward" {
        if let Ok(Some(target)) = config.get_optional_string(&path("target_id")) {
            if let Err(e) = ids::pool_id_from_target(&target) {
                diagnostics.push(
                    Diagnostic::error("Invalid target_id", e.to_string())
                        .with_attribute(path("target_id")),
                );
            }
        }
    }

    if let Ok(rules) = config.get_list(&path(RULES)) {
        for (idx, rule) in rules.iter().enumerate() {
            let Some(fields) = rule.as_map() else { continue };
            let rule_type = fields.get("type").and_then(|v| v.as_str());
            let has_field = fields.get("field").and_then(|v| v.as_str()).is_some();
            if matches!(rule_type, Some("header" | "query" | "body")) && !has_field {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing rule field",
                        format!("rules of type \"{}\" require field", rule_type.unwrap_or_default()),
                    )
                    .with_attribute(AttributePath::new(RULES).index(idx as i64).attribute("field")),
                );
            }
        }
    }

    diagnostics
}

fn target_from(config: &DynamicValue, action: &str) -> Result<Option<ListenerPolicyTargetPrototype>> {
    let status = |name: &str| -> Result<i64> {
        optional_i64(config, name)?
            .ok_or_else(|| VpcError::precondition(format!("action \"{}\" requires {}", action, name)))
    };

    Ok(match action {
        "forward" => {
            let pool = ids::pool_id_from_target(&required_string(config, "target_id")?)?;
            Some(ListenerPolicyTargetPrototype::Pool(Identity::new(pool)))
        }
        "redirect" => Some(ListenerPolicyTargetPrototype::Redirect {
            http_status_code: status("target_http_status_code")?,
            url: required_string(config, "target_url")?,
        }),
        "https_redirect" => {
            let listener =
                ids::child_id(&required_string(config, "target_https_redirect_listener")?)?;
            Some(ListenerPolicyTargetPrototype::HttpsRedirect {
                http_status_code: status("target_https_redirect_status_code")?,
                listener: Identity::new(listener),
                uri: config.get_optional_string(&path("target_https_redirect_uri"))?,
            })
        }
        _ => None,
    })
}

fn rules_from(config: &DynamicValue) -> Result<Vec<ListenerPolicyRulePrototype>> {
    let items = match config.get_list(&path(RULES)) {
        Ok(items) => items,
        Err(e) if e.is_missing() => return Ok(Vec::new()),
        Err(tfplug::TfplugError::TypeMismatch { .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    items
        .iter()
        .map(|item| {
            let fields = item
                .as_map()
                .ok_or_else(|| VpcError::precondition("each rule must be an object"))?;
            let text = |name: &str| fields.get(name).and_then(|v| v.as_str()).map(str::to_string);
            Ok(ListenerPolicyRulePrototype {
                condition: text("condition")
                    .ok_or_else(|| VpcError::precondition("rule condition is required"))?,
                rule_type: text("type").ok_or_else(|| VpcError::precondition("rule type is required"))?,
                field: text("field"),
                value: text("value").ok_or_else(|| VpcError::precondition("rule value is required"))?,
            })
        })
        .collect()
}

async fn wait_policy(
    ctx: &Context,
    data: &VpcProviderData,
    lb_id: &str,
    listener_id: &str,
    policy_id: &str,
    table: &StateTable,
    timeout: Duration,
) -> Result<WaitOutcome<ListenerPolicy>> {
    let client = &data.client;
    wait_for_state(
        ctx,
        table,
        &data.poll,
        timeout,
        &format!("listener policy {}", policy_id),
        || async move {
            let policy = client
                .load_balancers()
                .listeners(lb_id)
                .policies(listener_id)
                .get(policy_id)
                .await
                .context(format!("listener policy {}", policy_id))?;
            let status = policy.provisioning_status.clone();
            Ok((policy, status))
        },
    )
    .await
}

fn rule_to_dynamic(rule: &ListenerPolicyRule) -> Dynamic {
    let mut fields = HashMap::new();
    fields.insert("rule_id".to_string(), Dynamic::String(rule.id.clone()));
    fields.insert("condition".to_string(), Dynamic::String(rule.condition.clone()));
    fields.insert("type".to_string(), Dynamic::String(rule.rule_type.clone()));
    fields.insert("field".to_string(), opt_dynamic(rule.field.as_deref()));
    fields.insert("value".to_string(), Dynamic::String(rule.value.clone()));
    Dynamic::Map(fields)
}

pub(crate) fn flatten_policy(
    state: &mut DynamicValue,
    lb_id: &str,
    listener_id: &str,
    policy: &ListenerPolicy,
) {
    put_string(
        state,
        "id",
        ids::make_id(&[lb_id, listener_id, policy.id.as_str()]),
    );
    put_string(state, "lb", lb_id);
    if state_string(state, "listener")
        .and_then(|l| ids::child_id(&l).ok())
        .as_deref()
        != Some(listener_id)
    {
        put_string(state, "listener", listener_id);
    }
    put_string(state, "policy_id", &policy.id);
    put_string(state, "name", &policy.name);
    put_string(state, "action", &policy.action);
    put_i64(state, "priority", policy.priority);
    put_string(state, "status", &policy.provisioning_status);
    put_opt_string(
        state,
        "created_at",
        policy.created_at.map(|t| t.to_rfc3339()).as_deref(),
    );

    let rules = policy.rules.iter().map(rule_to_dynamic).collect();
    let _ = state.set_list(&path(RULES), rules);

    let configured_pool = state_string(state, "target_id");
    for name in TARGET_ATTRIBUTES {
        let _ = state.set_null(&path(name));
    }
    match &policy.target {
        Some(ListenerPolicyTarget::Pool(pool)) => {
            // `lb/pool` and the bare pool ID name the same target
            let matches = configured_pool
                .as_deref()
                .and_then(|t| ids::pool_id_from_target(t).ok())
                .is_some_and(|p| p == pool.id);
            match configured_pool {
                Some(configured) if matches => put_string(state, "target_id", configured),
                _ => put_string(state, "target_id", pool.id.as_str()),
            }
        }
        Some(ListenerPolicyTarget::Redirect { http_status_code, url }) => {
            put_i64(state, "target_http_status_code", *http_status_code);
            put_string(state, "target_url", url.as_str());
        }
        Some(ListenerPolicyTarget::HttpsRedirect {
            http_status_code,
            listener,
            uri,
        }) => {
            put_string(state, "target_https_redirect_listener", listener.id.as_str());
            put_i64(state, "target_https_redirect_status_code", *http_status_code);
            put_opt_string(state, "target_https_redirect_uri", uri.as_deref());
        }
        None => {}
    }
}

#[async_trait]
impl ResourceWithConfigure for LbListenerPolicyResource {
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
impl ResourceWithImportState for LbListenerPolicyResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match ids::parse_triple(&request.id) {
            Ok((lb_id, listener_id, policy_id)) => {
                let mut state = DynamicValue::object();
                put_string(&mut state, "id", &request.id);
                put_string(&mut state, "lb", lb_id);
                put_string(&mut state, "listener", listener_id);
                put_string(&mut state, "policy_id", policy_id);
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
                    format!("Expected lb/listener/policy: {}", e),
                )],
            },
        }
    }
}

#[async_trait]
impl ResourceWithExists for LbListenerPolicyResource {
    async fn exists(&self, _ctx: Context, request: ExistsResourceRequest) -> ExistsResourceResponse {
        let Some(data) = &self.provider_data else {
            return ExistsResourceResponse {
                exists: false,
                diagnostics: vec![not_configured()],
            };
        };

        match self.read_policy(data, &request.current_state).await {
            Ok(state) => ExistsResourceResponse {
                exists: state.is_some(),
                diagnostics: vec![],
            },
            Err(e) => ExistsResourceResponse {
                exists: false,
                diagnostics: vec![e.to_diagnostic("Failed to check listener policy")],
            },
        }
    }
}

#[cfg(test)]
#[path = "./resource_lb_listener_policy_test.rs"]
mod resource_lb_listener_policy_test;
