//! Shapes shared across the VPC API: references, error bodies and pagination

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::ApiError;

/// Error body returned with every non-2xx response
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
    pub trace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorItem {
    pub code: String,
    pub message: String,
    pub more_info: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("{}", summarize(.errors))]
pub struct ApiErrorDetails {
    pub errors: Vec<ApiErrorItem>,
    pub trace: Option<String>,
}

fn summarize(errors: &[ApiErrorItem]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ApiErrorResponse> for ApiErrorDetails {
    fn from(resp: ApiErrorResponse) -> Self {
        Self {
            errors: resp.errors,
            trace: resp.trace,
        }
    }
}

/// Reference to another resource as embedded in API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceReference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NameReference {
    pub name: String,
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReservedIpReference {
    pub address: String,
    pub id: String,
    pub name: Option<String>,
    pub href: Option<String>,
}

/// Identity of an existing resource in request bodies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: String,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Primary IP for a new interface: bind an existing reserved IP by `id`,
/// or reserve a new one (optionally at `address`)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimaryIpPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete: Option<bool>,
}

impl PrimaryIpPrototype {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.address.is_none() && self.name.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Href {
    pub href: String,
}

/// A page of a paginated collection
pub trait Paginated: DeserializeOwned {
    type Item;

    fn into_page(self) -> (Vec<Self::Item>, Option<Href>);
}

/// Extract the `start` token from a `next.href` link
pub fn start_token(next: &Href) -> Result<Option<String>, ApiError> {
    let url = url::Url::parse(&next.href)
        .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", next.href, e)))?;
    Ok(url
        .query_pairs()
        .find(|(k, _)| k == "start")
        .map(|(_, v)| v.into_owned()))
}

/// Percent-encode a user supplied identifier for use as a path segment
pub fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Timestamps come back as RFC 3339 strings
pub type Timestamp = DateTime<Utc>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_token_read_from_next_href() {
        let next = Href {
            href: "https://us-south.iaas.cloud.ibm.com/v1/virtual_network_interfaces?limit=50&start=r006-abc%2Fdef".to_string(),
        };
        assert_eq!(start_token(&next).unwrap(), Some("r006-abc/def".to_string()));

        let last = Href {
            href: "https://example.com/v1/subnets/s/reserved_ips?limit=50".to_string(),
        };
        assert_eq!(start_token(&last).unwrap(), None);
    }

    #[test]
    fn start_token_rejects_relative_href() {
        let next = Href {
            href: "/v1/virtual_network_interfaces?start=x".to_string(),
        };
        assert!(matches!(start_token(&next), Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn error_details_display_joins_codes() {
        let body = r#"{"errors":[{"code":"not_found","message":"Listener not found","more_info":"https://cloud.ibm.com/docs"}],"trace":"abc"}"#;
        let resp: ApiErrorResponse = serde_json::from_str(body).unwrap();
        let details = ApiErrorDetails::from(resp);

        assert_eq!(details.to_string(), "not_found: Listener not found");
        assert_eq!(details.trace.as_deref(), Some("abc"));
    }

    #[test]
    fn query_params_skip_none() {
        let params = ApiQueryParams::new()
            .add("limit", 50)
            .add_optional("start", None::<String>);
        assert_eq!(params.pairs(), &[("limit".to_string(), "50".to_string())]);
    }

    #[test]
    fn segment_encodes_slashes() {
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
    }
}
