//! Load balancer API: the balancer itself plus its listeners, pools, pool
//! members and listener policies

use serde::{Deserialize, Serialize};

use super::common::{segment, Identity, ResourceReference, Timestamp};
use super::error::ApiError;
use super::Client;

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    pub crn: Option<String>,
    pub hostname: Option<String>,
    pub provisioning_status: String,
    pub operating_status: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub listeners: Vec<ResourceReference>,
    #[serde(default)]
    pub pools: Vec<ResourceReference>,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listener {
    pub id: String,
    pub protocol: String,
    pub port: Option<i64>,
    pub port_min: Option<i64>,
    pub port_max: Option<i64>,
    pub default_pool: Option<ResourceReference>,
    pub connection_limit: Option<i64>,
    pub idle_connection_timeout: Option<i64>,
    pub provisioning_status: String,
    #[serde(default)]
    pub policies: Vec<ResourceReference>,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListenerPrototype {
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_pool: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_connection_timeout: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListenerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_pool: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_connection_timeout: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMonitor {
    pub delay: i64,
    pub max_retries: i64,
    pub timeout: i64,
    #[serde(rename = "type")]
    pub monitor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPersistence {
    #[serde(rename = "type")]
    pub persistence_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pool {
    pub id: String,
    pub name: String,
    pub algorithm: String,
    pub protocol: String,
    pub health_monitor: HealthMonitor,
    pub proxy_protocol: Option<String>,
    pub session_persistence: Option<SessionPersistence>,
    #[serde(default)]
    pub members: Vec<ResourceReference>,
    pub provisioning_status: String,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub algorithm: String,
    pub protocol: String,
    pub health_monitor: HealthMonitor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_persistence: Option<SessionPersistence>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_monitor: Option<HealthMonitor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_protocol: Option<String>,
}

/// What a pool member forwards to: a bare IP address or an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberTarget {
    Address { address: String },
    Instance(ResourceReference),
}

/// Pool member target in request bodies
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MemberTargetPrototype {
    Address { address: String },
    Instance(Identity),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolMember {
    pub id: String,
    pub port: i64,
    pub target: MemberTarget,
    pub weight: Option<i64>,
    pub health: Option<String>,
    pub provisioning_status: String,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolMemberPrototype {
    pub port: i64,
    pub target: MemberTargetPrototype,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolMemberPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<MemberTargetPrototype>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

/// Where a listener policy sends matching traffic. The API does not tag
/// the variants, so they are told apart by shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListenerPolicyTarget {
    HttpsRedirect {
        http_status_code: i64,
        listener: ResourceReference,
        uri: Option<String>,
    },
    Redirect {
        http_status_code: i64,
        url: String,
    },
    Pool(ResourceReference),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListenerPolicyTargetPrototype {
    HttpsRedirect {
        http_status_code: i64,
        listener: Identity,
        #[serde(skip_serializing_if = "Option::is_none")]
        uri: Option<String>,
    },
    Redirect {
        http_status_code: i64,
        url: String,
    },
    Pool(Identity),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListenerPolicyRule {
    pub id: String,
    pub condition: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub field: Option<String>,
    pub value: String,
    pub provisioning_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerPolicyRulePrototype {
    pub condition: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenerPolicy {
    pub id: String,
    pub name: String,
    pub action: String,
    pub priority: i64,
    pub provisioning_status: String,
    #[serde(default)]
    pub rules: Vec<ListenerPolicyRule>,
    pub target: Option<ListenerPolicyTarget>,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListenerPolicyPrototype {
    pub action: String,
    pub priority: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ListenerPolicyRulePrototype>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ListenerPolicyTargetPrototype>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListenerPolicyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ListenerPolicyTargetPrototype>,
}

#[derive(Debug, Deserialize)]
struct LoadBalancerCollection {
    load_balancers: Vec<LoadBalancer>,
}

#[derive(Debug, Deserialize)]
struct ListenerCollection {
    listeners: Vec<Listener>,
}

pub struct LoadBalancersApi<'a> {
    client: &'a Client,
}

impl<'a> LoadBalancersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<LoadBalancer>, ApiError> {
        let collection: LoadBalancerCollection = self.client.get("/v1/load_balancers").await?;
        Ok(collection.load_balancers)
    }

    pub async fn get(&self, lb_id: &str) -> Result<LoadBalancer, ApiError> {
        self.client
            .get(&format!("/v1/load_balancers/{}", segment(lb_id)))
            .await
    }

    pub fn listeners(&self, lb_id: &str) -> ListenersApi<'a> {
        ListenersApi {
            client: self.client,
            base: format!("/v1/load_balancers/{}/listeners", segment(lb_id)),
        }
    }

    pub fn pools(&self, lb_id: &str) -> PoolsApi<'a> {
        PoolsApi {
            client: self.client,
            base: format!("/v1/load_balancers/{}/pools", segment(lb_id)),
        }
    }
}

pub struct ListenersApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> ListenersApi<'a> {
    pub async fn list(&self) -> Result<Vec<Listener>, ApiError> {
        let collection: ListenerCollection = self.client.get(&self.base).await?;
        Ok(collection.listeners)
    }

    pub async fn get(&self, listener_id: &str) -> Result<Listener, ApiError> {
        self.client.get(&self.path(listener_id)).await
    }

    pub async fn create(&self, prototype: &ListenerPrototype) -> Result<Listener, ApiError> {
        self.client.post(&self.base, prototype).await
    }

    pub async fn update(&self, listener_id: &str, patch: &ListenerPatch) -> Result<Listener, ApiError> {
        self.client.patch(&self.path(listener_id), patch).await
    }

    pub async fn delete(&self, listener_id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.path(listener_id)).await
    }

    pub fn policies(&self, listener_id: &str) -> PoliciesApi<'a> {
        PoliciesApi {
            client: self.client,
            base: format!("{}/policies", self.path(listener_id)),
        }
    }

    fn path(&self, listener_id: &str) -> String {
        format!("{}/{}", self.base, segment(listener_id))
    }
}

pub struct PoolsApi<'a> {
    client: &'a Client,
    base: String,
}

impl<'a> PoolsApi<'a> {
    pub async fn get(&self, pool_id: &str) -> Result<Pool, ApiError> {
        self.client.get(&self.path(pool_id)).await
    }

    pub async fn create(&self, prototype: &PoolPrototype) -> Result<Pool, ApiError> {
        self.client.post(&self.base, prototype).await
    }

    pub async fn update(&self, pool_id: &str, patch: &PoolPatch) -> Result<Pool, ApiError> {
        self.client.patch(&self.path(pool_id), patch).await
    }

    pub async fn delete(&self, pool_id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.path(pool_id)).await
    }

    pub fn members(&self, pool_id: &str) -> MembersApi<'a> {
        MembersApi {
            client: self.client,
            base: format!("{}/members", self.path(pool_id)),
        }
    }

    fn path(&self, pool_id: &str) -> String {
        format!("{}/{}", self.base, segment(pool_id))
    }
}

pub struct MembersApi<'a> {
    client: &'a Client,
    base: String,
}

impl MembersApi<'_> {
    pub async fn get(&self, member_id: &str) -> Result<PoolMember, ApiError> {
        self.client.get(&self.path(member_id)).await
    }

    pub async fn create(&self, prototype: &PoolMemberPrototype) -> Result<PoolMember, ApiError> {
        self.client.post(&self.base, prototype).await
    }

    pub async fn update(&self, member_id: &str, patch: &PoolMemberPatch) -> Result<PoolMember, ApiError> {
        self.client.patch(&self.path(member_id), patch).await
    }

    pub async fn delete(&self, member_id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.path(member_id)).await
    }

    fn path(&self, member_id: &str) -> String {
        format!("{}/{}", self.base, segment(member_id))
    }
}

pub struct PoliciesApi<'a> {
    client: &'a Client,
    base: String,
}

impl PoliciesApi<'_> {
    pub async fn get(&self, policy_id: &str) -> Result<ListenerPolicy, ApiError> {
        self.client.get(&self.path(policy_id)).await
    }

    pub async fn create(&self, prototype: &ListenerPolicyPrototype) -> Result<ListenerPolicy, ApiError> {
        self.client.post(&self.base, prototype).await
    }

    pub async fn update(
        &self,
        policy_id: &str,
        patch: &ListenerPolicyPatch,
    ) -> Result<ListenerPolicy, ApiError> {
        self.client.patch(&self.path(policy_id), patch).await
    }

    pub async fn delete(&self, policy_id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.path(policy_id)).await
    }

    fn path(&self, policy_id: &str) -> String {
        format!("{}/{}", self.base, segment(policy_id))
    }
}
