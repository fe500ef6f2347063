use serde::{Deserialize, Serialize};

use super::common::{
    segment, ApiQueryParams, Href, Identity, NameReference, Paginated, PrimaryIpPrototype,
    ReservedIpReference, ResourceReference, Timestamp,
};
use super::error::ApiError;
use super::Client;

/// Reference to whatever a virtual network interface is attached to
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetReference {
    pub id: String,
    pub name: Option<String>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resource_type", rename_all = "snake_case")]
pub enum VirtualNetworkInterfaceTarget {
    InstanceNetworkAttachment(TargetReference),
    BareMetalServerNetworkAttachment(TargetReference),
    ShareMountTarget(TargetReference),
}

impl VirtualNetworkInterfaceTarget {
    pub fn reference(&self) -> &TargetReference {
        match self {
            Self::InstanceNetworkAttachment(r)
            | Self::BareMetalServerNetworkAttachment(r)
            | Self::ShareMountTarget(r) => r,
        }
    }

    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::InstanceNetworkAttachment(_) => "instance_network_attachment",
            Self::BareMetalServerNetworkAttachment(_) => "bare_metal_server_network_attachment",
            Self::ShareMountTarget(_) => "share_mount_target",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualNetworkInterface {
    pub id: String,
    pub name: String,
    pub crn: Option<String>,
    pub href: Option<String>,
    pub lifecycle_state: String,
    #[serde(default)]
    pub allow_ip_spoofing: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub enable_infrastructure_nat: bool,
    pub protocol_state_filtering_mode: Option<String>,
    pub primary_ip: Option<ReservedIpReference>,
    pub subnet: Option<ResourceReference>,
    #[serde(default)]
    pub security_groups: Vec<ResourceReference>,
    pub target: Option<VirtualNetworkInterfaceTarget>,
    pub vpc: Option<ResourceReference>,
    pub zone: Option<NameReference>,
    pub resource_group: Option<ResourceReference>,
    pub mac_address: Option<String>,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VirtualNetworkInterfacePrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ip: Option<PrimaryIpPrototype>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_ip_spoofing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_infrastructure_nat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_state_filtering_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<Identity>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VirtualNetworkInterfacePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_ip_spoofing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_infrastructure_nat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_state_filtering_mode: Option<String>,
}

impl VirtualNetworkInterfacePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.allow_ip_spoofing.is_none()
            && self.auto_delete.is_none()
            && self.enable_infrastructure_nat.is_none()
            && self.protocol_state_filtering_mode.is_none()
    }
}

/// Virtual network interface for a new attachment: reuse one by ID or
/// have the API create it inline
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AttachmentInterfacePrototype {
    Existing(Identity),
    New(VirtualNetworkInterfacePrototype),
}

#[derive(Debug, Deserialize)]
pub struct VirtualNetworkInterfaceCollection {
    pub virtual_network_interfaces: Vec<VirtualNetworkInterface>,
    pub next: Option<Href>,
}

impl Paginated for VirtualNetworkInterfaceCollection {
    type Item = VirtualNetworkInterface;

    fn into_page(self) -> (Vec<VirtualNetworkInterface>, Option<Href>) {
        (self.virtual_network_interfaces, self.next)
    }
}

pub struct VirtualNetworkInterfacesApi<'a> {
    client: &'a Client,
}

impl<'a> VirtualNetworkInterfacesApi<'a> {
    const BASE: &'static str = "/v1/virtual_network_interfaces";

    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list_all(&self, resource_group: Option<&str>) -> Result<Vec<VirtualNetworkInterface>, ApiError> {
        let params = ApiQueryParams::new().add_optional("resource_group.id", resource_group);
        self.client
            .list_all::<VirtualNetworkInterfaceCollection>(Self::BASE, &params)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<VirtualNetworkInterface, ApiError> {
        self.client.get(&Self::path(id)).await
    }

    pub async fn create(
        &self,
        prototype: &VirtualNetworkInterfacePrototype,
    ) -> Result<VirtualNetworkInterface, ApiError> {
        self.client.post(Self::BASE, prototype).await
    }

    pub async fn update(
        &self,
        id: &str,
        patch: &VirtualNetworkInterfacePatch,
    ) -> Result<VirtualNetworkInterface, ApiError> {
        self.client.patch(&Self::path(id), patch).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(id)).await
    }

    fn path(id: &str) -> String {
        format!("{}/{}", Self::BASE, segment(id))
    }
}
