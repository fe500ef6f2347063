//! Bare metal servers: power control, network interfaces and network
//! attachments

use serde::{Deserialize, Serialize};

use super::common::{
    segment, ApiQueryParams, Href, Identity, Paginated, PrimaryIpPrototype, ReservedIpReference,
    ResourceReference, Timestamp,
};
use super::error::ApiError;
use super::virtual_network_interfaces::AttachmentInterfacePrototype;
use super::Client;

#[derive(Debug, Clone, Deserialize)]
pub struct BareMetalServer {
    pub id: String,
    pub name: String,
    pub status: String,
    pub crn: Option<String>,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    Hard,
    Soft,
}

#[derive(Debug, Serialize)]
struct StopRequest {
    #[serde(rename = "type")]
    stop_type: StopType,
}

/// Fields every network interface carries regardless of interface type
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInterfaceCommon {
    pub id: String,
    pub name: String,
    pub href: Option<String>,
    pub status: String,
    #[serde(default)]
    pub allow_ip_spoofing: bool,
    #[serde(default)]
    pub enable_infrastructure_nat: bool,
    pub mac_address: Option<String>,
    pub port_speed: Option<i64>,
    pub primary_ip: Option<ReservedIpReference>,
    pub subnet: Option<ResourceReference>,
    #[serde(default)]
    pub security_groups: Vec<ResourceReference>,
    #[serde(rename = "type")]
    pub interface_role: Option<String>,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PciNetworkInterface {
    #[serde(flatten)]
    pub common: NetworkInterfaceCommon,
    #[serde(default)]
    pub allowed_vlans: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VlanNetworkInterface {
    #[serde(flatten)]
    pub common: NetworkInterfaceCommon,
    pub vlan: i64,
    #[serde(default)]
    pub allow_interface_to_float: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "interface_type", rename_all = "snake_case")]
pub enum BareMetalServerNetworkInterface {
    Pci(PciNetworkInterface),
    Vlan(VlanNetworkInterface),
    Hipersocket(NetworkInterfaceCommon),
}

impl BareMetalServerNetworkInterface {
    pub fn common(&self) -> &NetworkInterfaceCommon {
        match self {
            Self::Pci(nic) => &nic.common,
            Self::Vlan(nic) => &nic.common,
            Self::Hipersocket(common) => common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn status(&self) -> &str {
        &self.common().status
    }

    pub fn interface_type(&self) -> &'static str {
        match self {
            Self::Pci(_) => "pci",
            Self::Vlan(_) => "vlan",
            Self::Hipersocket(_) => "hipersocket",
        }
    }

    pub fn is_pci(&self) -> bool {
        matches!(self, Self::Pci(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInterfaceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub subnet: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ip: Option<PrimaryIpPrototype>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_ip_spoofing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_infrastructure_nat: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "interface_type", rename_all = "snake_case")]
pub enum NetworkInterfacePrototype {
    Pci {
        #[serde(flatten)]
        settings: NetworkInterfaceSettings,
        allowed_vlans: Vec<i64>,
    },
    Vlan {
        #[serde(flatten)]
        settings: NetworkInterfaceSettings,
        vlan: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        allow_interface_to_float: Option<bool>,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkInterfacePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_ip_spoofing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_infrastructure_nat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_vlans: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_interface_to_float: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkAttachmentCommon {
    pub id: String,
    pub name: String,
    pub href: Option<String>,
    pub lifecycle_state: String,
    pub port_speed: Option<i64>,
    pub primary_ip: Option<ReservedIpReference>,
    pub subnet: Option<ResourceReference>,
    #[serde(rename = "type")]
    pub attachment_role: Option<String>,
    pub virtual_network_interface: ResourceReference,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PciNetworkAttachment {
    #[serde(flatten)]
    pub common: NetworkAttachmentCommon,
    #[serde(default)]
    pub allowed_vlans: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VlanNetworkAttachment {
    #[serde(flatten)]
    pub common: NetworkAttachmentCommon,
    pub vlan: i64,
    #[serde(default)]
    pub allow_to_float: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "interface_type", rename_all = "snake_case")]
pub enum BareMetalServerNetworkAttachment {
    Pci(PciNetworkAttachment),
    Vlan(VlanNetworkAttachment),
}

impl BareMetalServerNetworkAttachment {
    pub fn common(&self) -> &NetworkAttachmentCommon {
        match self {
            Self::Pci(att) => &att.common,
            Self::Vlan(att) => &att.common,
        }
    }

    pub fn interface_type(&self) -> &'static str {
        match self {
            Self::Pci(_) => "pci",
            Self::Vlan(_) => "vlan",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "interface_type", rename_all = "snake_case")]
pub enum NetworkAttachmentPrototype {
    Pci {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        allowed_vlans: Vec<i64>,
        virtual_network_interface: AttachmentInterfacePrototype,
    },
    Vlan {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        vlan: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        allow_to_float: Option<bool>,
        virtual_network_interface: AttachmentInterfacePrototype,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkAttachmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_vlans: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_to_float: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct NetworkInterfaceCollection {
    pub network_interfaces: Vec<BareMetalServerNetworkInterface>,
    pub next: Option<Href>,
}

impl Paginated for NetworkInterfaceCollection {
    type Item = BareMetalServerNetworkInterface;

    fn into_page(self) -> (Vec<Self::Item>, Option<Href>) {
        (self.network_interfaces, self.next)
    }
}

#[derive(Debug, Deserialize)]
pub struct NetworkAttachmentCollection {
    pub network_attachments: Vec<BareMetalServerNetworkAttachment>,
    pub next: Option<Href>,
}

impl Paginated for NetworkAttachmentCollection {
    type Item = BareMetalServerNetworkAttachment;

    fn into_page(self) -> (Vec<Self::Item>, Option<Href>) {
        (self.network_attachments, self.next)
    }
}

pub struct BareMetalServersApi<'a> {
    client: &'a Client,
}

impl<'a> BareMetalServersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, server_id: &str) -> Result<BareMetalServer, ApiError> {
        self.client.get(&Self::path(server_id)).await
    }

    pub async fn start(&self, server_id: &str) -> Result<(), ApiError> {
        tracing::debug!("Starting bare metal server {}", server_id);
        self.client
            .post_action(&format!("{}/start", Self::path(server_id)), &serde_json::json!({}))
            .await
    }

    pub async fn stop(&self, server_id: &str, stop_type: StopType) -> Result<(), ApiError> {
        tracing::debug!("Stopping bare metal server {} ({:?})", server_id, stop_type);
        self.client
            .post_action(
                &format!("{}/stop", Self::path(server_id)),
                &StopRequest { stop_type },
            )
            .await
    }

    pub fn network_interfaces(&self, server_id: &str) -> NetworkInterfacesApi<'a> {
        NetworkInterfacesApi {
            client: self.client,
            base: format!("{}/network_interfaces", Self::path(server_id)),
        }
    }

    pub fn network_attachments(&self, server_id: &str) -> NetworkAttachmentsApi<'a> {
        NetworkAttachmentsApi {
            client: self.client,
            base: format!("{}/network_attachments", Self::path(server_id)),
        }
    }

    fn path(server_id: &str) -> String {
        format!("/v1/bare_metal_servers/{}", segment(server_id))
    }
}

pub struct NetworkInterfacesApi<'a> {
    client: &'a Client,
    base: String,
}

impl NetworkInterfacesApi<'_> {
    pub async fn list_all(&self) -> Result<Vec<BareMetalServerNetworkInterface>, ApiError> {
        self.client
            .list_all::<NetworkInterfaceCollection>(&self.base, &ApiQueryParams::new())
            .await
    }

    pub async fn get(&self, nic_id: &str) -> Result<BareMetalServerNetworkInterface, ApiError> {
        self.client.get(&self.path(nic_id)).await
    }

    pub async fn create(
        &self,
        prototype: &NetworkInterfacePrototype,
    ) -> Result<BareMetalServerNetworkInterface, ApiError> {
        self.client.post(&self.base, prototype).await
    }

    pub async fn update(
        &self,
        nic_id: &str,
        patch: &NetworkInterfacePatch,
    ) -> Result<BareMetalServerNetworkInterface, ApiError> {
        self.client.patch(&self.path(nic_id), patch).await
    }

    pub async fn delete(&self, nic_id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.path(nic_id)).await
    }

    fn path(&self, nic_id: &str) -> String {
        format!("{}/{}", self.base, segment(nic_id))
    }
}

pub struct NetworkAttachmentsApi<'a> {
    client: &'a Client,
    base: String,
}

impl NetworkAttachmentsApi<'_> {
    pub async fn list_all(&self) -> Result<Vec<BareMetalServerNetworkAttachment>, ApiError> {
        self.client
            .list_all::<NetworkAttachmentCollection>(&self.base, &ApiQueryParams::new())
            .await
    }

    pub async fn get(&self, attachment_id: &str) -> Result<BareMetalServerNetworkAttachment, ApiError> {
        self.client.get(&self.path(attachment_id)).await
    }

    pub async fn create(
        &self,
        prototype: &NetworkAttachmentPrototype,
    ) -> Result<BareMetalServerNetworkAttachment, ApiError> {
        self.client.post(&self.base, prototype).await
    }

    pub async fn update(
        &self,
        attachment_id: &str,
        patch: &NetworkAttachmentPatch,
    ) -> Result<BareMetalServerNetworkAttachment, ApiError> {
        self.client.patch(&self.path(attachment_id), patch).await
    }

    pub async fn delete(&self, attachment_id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.path(attachment_id)).await
    }

    fn path(&self, attachment_id: &str) -> String {
        format!("{}/{}", self.base, segment(attachment_id))
    }
}
