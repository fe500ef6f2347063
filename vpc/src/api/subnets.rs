use serde::{Deserialize, Serialize};

use super::common::{segment, ApiQueryParams, Href, Identity, Paginated, ResourceReference, Timestamp};
use super::error::ApiError;
use super::Client;

#[derive(Debug, Clone, Deserialize)]
pub struct ReservedIp {
    pub id: String,
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub auto_delete: bool,
    pub lifecycle_state: String,
    pub owner: Option<String>,
    pub target: Option<ResourceReference>,
    pub href: Option<String>,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReservedIpPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Identity>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReservedIpPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ReservedIpCollection {
    pub reserved_ips: Vec<ReservedIp>,
    pub next: Option<Href>,
}

impl Paginated for ReservedIpCollection {
    type Item = ReservedIp;

    fn into_page(self) -> (Vec<ReservedIp>, Option<Href>) {
        (self.reserved_ips, self.next)
    }
}

pub struct SubnetsApi<'a> {
    client: &'a Client,
}

impl<'a> SubnetsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn reserved_ips(&self, subnet_id: &str) -> ReservedIpsApi<'a> {
        ReservedIpsApi {
            client: self.client,
            base: format!("/v1/subnets/{}/reserved_ips", segment(subnet_id)),
        }
    }
}

pub struct ReservedIpsApi<'a> {
    client: &'a Client,
    base: String,
}

impl ReservedIpsApi<'_> {
    pub async fn list_all(&self) -> Result<Vec<ReservedIp>, ApiError> {
        self.client
            .list_all::<ReservedIpCollection>(&self.base, &ApiQueryParams::new())
            .await
    }

    pub async fn get(&self, reserved_ip_id: &str) -> Result<ReservedIp, ApiError> {
        self.client.get(&self.path(reserved_ip_id)).await
    }

    pub async fn create(&self, prototype: &ReservedIpPrototype) -> Result<ReservedIp, ApiError> {
        self.client.post(&self.base, prototype).await
    }

    pub async fn update(&self, reserved_ip_id: &str, patch: &ReservedIpPatch) -> Result<ReservedIp, ApiError> {
        self.client.patch(&self.path(reserved_ip_id), patch).await
    }

    pub async fn delete(&self, reserved_ip_id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.path(reserved_ip_id)).await
    }

    fn path(&self, reserved_ip_id: &str) -> String {
        format!("{}/{}", self.base, segment(reserved_ip_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn create_reserved_ip_omits_unset_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/subnets/0717-subnet/reserved_ips")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(serde_json::json!({
                "name": "db-ip",
                "auto_delete": false
            })))
            .with_status(201)
            .with_body(
                r#"{"id":"0717-rip","address":"10.240.0.7","name":"db-ip","auto_delete":false,"lifecycle_state":"pending","owner":"user","created_at":"2024-03-01T10:00:00Z"}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let ip = client
            .subnets()
            .reserved_ips("0717-subnet")
            .create(&ReservedIpPrototype {
                name: Some("db-ip".to_string()),
                auto_delete: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(ip.address, "10.240.0.7");
        assert_eq!(ip.lifecycle_state, "pending");
        assert!(ip.created_at.is_some());
        mock.assert_async().await;
    }
}
