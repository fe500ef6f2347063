//! Helpers shared by every resource: provider data plumbing, state
//! flattening and the load balancer guard sequence.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tfplug::schema::{AttributeBuilder, AttributeType};
use tfplug::validator::{StringLengthValidator, StringPatternValidator};
use tfplug::{AttributePath, Context, Diagnostic, Dynamic, DynamicValue, Timeouts};

use crate::api::load_balancers::LoadBalancer;
use crate::error::{ApiResultExt, Result, VpcError};
use crate::provider_data::VpcProviderData;
use crate::wait::{tables, wait_for_state};

pub const NAME_PATTERN: &str = r"^([a-z]|[a-z][-a-z0-9]*[a-z0-9])$";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub fn default_timeouts() -> Timeouts {
    Timeouts::uniform(DEFAULT_TIMEOUT)
}

/// Resolve operation timeouts from the `timeouts` block of `config`
pub fn timeouts(config: &DynamicValue) -> Result<Timeouts> {
    Ok(default_timeouts().resolve(config)?)
}

/// A `name` attribute validated against the VPC naming rules
pub fn name_attribute(description: &str) -> AttributeBuilder {
    let builder = AttributeBuilder::new("name", AttributeType::String)
        .description(description)
        .validator(StringLengthValidator {
            min: Some(1),
            max: Some(63),
        });
    match StringPatternValidator::new(
        NAME_PATTERN,
        "lowercase letters, digits and hyphens, starting with a letter",
    ) {
        Ok(pattern) => builder.validator(pattern),
        Err(_) => builder,
    }
}

pub fn id_attribute(description: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description(description)
        .computed()
        .build()
}

pub fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

/// Downcast provider data handed to `configure`
pub fn configure_provider_data(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
) -> (Option<VpcProviderData>, Vec<Diagnostic>) {
    match provider_data {
        Some(data) => match data.downcast_ref::<VpcProviderData>() {
            Some(provider_data) => (Some(provider_data.clone()), vec![]),
            None => (
                None,
                vec![Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract VpcProviderData from provider data",
                )],
            ),
        },
        None => (
            None,
            vec![Diagnostic::error(
                "No provider data",
                "No provider data was provided",
            )],
        ),
    }
}

pub fn path(name: &str) -> AttributePath {
    AttributePath::new(name)
}

pub fn required_string(config: &DynamicValue, name: &str) -> Result<String> {
    config
        .get_string(&path(name))
        .map_err(|_| VpcError::precondition(format!("the '{}' attribute is required", name)))
}

pub fn optional_i64(config: &DynamicValue, name: &str) -> Result<Option<i64>> {
    Ok(config.get_optional_number(&path(name))?.map(|n| n as i64))
}

pub fn i64_list(config: &DynamicValue, name: &str) -> Result<Vec<i64>> {
    match config.get_list(&path(name)) {
        Ok(items) => items
            .iter()
            .map(|item| {
                item.as_number().map(|n| n as i64).ok_or_else(|| {
                    VpcError::precondition(format!("'{}' must be a list of numbers", name))
                })
            })
            .collect(),
        Err(e) if e.is_missing() => Ok(Vec::new()),
        Err(tfplug::TfplugError::TypeMismatch { .. }) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

pub fn put_string(state: &mut DynamicValue, name: &str, value: impl Into<String>) {
    let _ = state.set_string(&path(name), value.into());
}

pub fn put_opt_string(state: &mut DynamicValue, name: &str, value: Option<&str>) {
    match value {
        Some(v) => put_string(state, name, v),
        None => {
            let _ = state.set_null(&path(name));
        }
    }
}

pub fn put_bool(state: &mut DynamicValue, name: &str, value: bool) {
    let _ = state.set_bool(&path(name), value);
}

pub fn put_i64(state: &mut DynamicValue, name: &str, value: i64) {
    let _ = state.set_number(&path(name), value as f64);
}

pub fn put_opt_i64(state: &mut DynamicValue, name: &str, value: Option<i64>) {
    match value {
        Some(v) => put_i64(state, name, v),
        None => {
            let _ = state.set_null(&path(name));
        }
    }
}

pub fn put_strings<I, S>(state: &mut DynamicValue, name: &str, values: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let list = values
        .into_iter()
        .map(|v| Dynamic::String(v.into()))
        .collect();
    let _ = state.set_list(&path(name), list);
}

pub fn put_i64s(state: &mut DynamicValue, name: &str, values: &[i64]) {
    let list = values.iter().map(|v| Dynamic::Number(*v as f64)).collect();
    let _ = state.set_list(&path(name), list);
}

/// Computed object attribute; `None` stores null
pub fn put_object(state: &mut DynamicValue, name: &str, fields: Option<Vec<(&str, Dynamic)>>) {
    match fields {
        Some(fields) => {
            let map: HashMap<String, Dynamic> = fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            let _ = state.set_map(&path(name), map);
        }
        None => {
            let _ = state.set_null(&path(name));
        }
    }
}

pub fn object_type(fields: &[&str]) -> AttributeType {
    AttributeType::Object(
        fields
            .iter()
            .map(|f| (f.to_string(), AttributeType::String))
            .collect(),
    )
}

/// String attribute of a previous state, if set
pub fn state_string(state: &DynamicValue, name: &str) -> Option<String> {
    state.get_optional_string(&path(name)).ok().flatten()
}

pub fn opt_dynamic(value: Option<&str>) -> Dynamic {
    value.map_or(Dynamic::Null, |v| Dynamic::String(v.to_string()))
}

/// Value of `name` in `config` when it differs from `prior`
pub fn changed_string(config: &DynamicValue, prior: &DynamicValue, name: &str) -> Result<Option<String>> {
    let new = config.get_optional_string(&path(name))?;
    Ok(match new {
        Some(v) if state_string(prior, name).as_deref() != Some(v.as_str()) => Some(v),
        _ => None,
    })
}

pub fn changed_bool(config: &DynamicValue, prior: &DynamicValue, name: &str) -> Result<Option<bool>> {
    let new = config.get_optional_bool(&path(name))?;
    let old = prior.get_optional_bool(&path(name)).ok().flatten();
    Ok(new.filter(|v| Some(*v) != old))
}

pub fn changed_i64(config: &DynamicValue, prior: &DynamicValue, name: &str) -> Result<Option<i64>> {
    let new = optional_i64(config, name)?;
    let old = optional_i64(prior, name).ok().flatten();
    Ok(new.filter(|v| Some(*v) != old))
}

/// Wait until the load balancer accepts configuration changes
pub async fn wait_load_balancer_active(
    ctx: &Context,
    data: &VpcProviderData,
    lb_id: &str,
    timeout: Duration,
) -> Result<LoadBalancer> {
    let client = &data.client;
    let what = format!("load balancer {}", lb_id);
    let outcome = wait_for_state(
        ctx,
        &tables::LOAD_BALANCER_ACTIVE,
        &data.poll,
        timeout,
        &what,
        || async move {
            let lb = client
                .load_balancers()
                .get(lb_id)
                .await
                .context(format!("load balancer {}", lb_id))?;
            let status = lb.provisioning_status.clone();
            Ok((lb, status))
        },
    )
    .await?;

    outcome.reached().ok_or(VpcError::NotFound { what })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_attribute_rejects_bad_names() {
        let schema = tfplug::SchemaBuilder::new()
            .attribute(name_attribute("name").optional().build())
            .build();

        let too_long = "a".repeat(64);
        for bad in ["Upper", "-lead", "trail-", "under_score", too_long.as_str()] {
            let mut config = DynamicValue::object();
            put_string(&mut config, "name", bad);
            assert!(!schema.validate(&config).is_empty(), "{} should be rejected", bad);
        }

        let longest = "a".repeat(63);
        for good in ["a", "web-listener-1", longest.as_str()] {
            let mut config = DynamicValue::object();
            put_string(&mut config, "name", good);
            assert!(schema.validate(&config).is_empty(), "{} should pass", good);
        }
    }

    #[test]
    fn changed_values_compare_with_prior() {
        let mut prior = DynamicValue::object();
        put_string(&mut prior, "name", "old");
        put_bool(&mut prior, "flag", true);
        put_i64(&mut prior, "port", 80);

        let mut config = prior.clone();
        assert_eq!(changed_string(&config, &prior, "name").unwrap(), None);

        put_string(&mut config, "name", "new");
        put_bool(&mut config, "flag", false);
        put_i64(&mut config, "port", 8080);

        assert_eq!(changed_string(&config, &prior, "name").unwrap(), Some("new".to_string()));
        assert_eq!(changed_bool(&config, &prior, "flag").unwrap(), Some(false));
        assert_eq!(changed_i64(&config, &prior, "port").unwrap(), Some(8080));
    }

    #[test]
    fn i64_list_reads_numbers() {
        let mut config = DynamicValue::object();
        put_i64s(&mut config, "allowed_vlans", &[100, 200]);
        assert_eq!(i64_list(&config, "allowed_vlans").unwrap(), vec![100, 200]);
        assert!(i64_list(&config, "missing").unwrap().is_empty());
    }

    #[test]
    fn configure_rejects_foreign_provider_data() {
        let (data, diags) = configure_provider_data(Some(Arc::new(42_u32)));
        assert!(data.is_none());
        assert_eq!(diags[0].summary, "Invalid provider data");

        let (_, diags) = configure_provider_data(None);
        assert_eq!(diags[0].summary, "No provider data");
    }
}
