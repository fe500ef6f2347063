use serde::{Deserialize, Serialize};

use super::common::{segment, ReservedIpReference, ResourceReference, Timestamp};
use super::error::ApiError;
use super::virtual_network_interfaces::AttachmentInterfacePrototype;
use super::Client;

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceNetworkAttachment {
    pub id: String,
    pub name: String,
    pub href: Option<String>,
    pub lifecycle_state: String,
    pub port_speed: Option<i64>,
    pub primary_ip: Option<ReservedIpReference>,
    pub subnet: Option<ResourceReference>,
    #[serde(rename = "type")]
    pub attachment_type: Option<String>,
    pub virtual_network_interface: ResourceReference,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceNetworkAttachmentPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub virtual_network_interface: AttachmentInterfacePrototype,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstanceNetworkAttachmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstanceNetworkAttachmentCollection {
    network_attachments: Vec<InstanceNetworkAttachment>,
}

pub struct InstancesApi<'a> {
    client: &'a Client,
}

impl<'a> InstancesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn network_attachments(&self, instance_id: &str) -> InstanceNetworkAttachmentsApi<'a> {
        InstanceNetworkAttachmentsApi {
            client: self.client,
            base: format!("/v1/instances/{}/network_attachments", segment(instance_id)),
        }
    }
}

pub struct InstanceNetworkAttachmentsApi<'a> {
    client: &'a Client,
    base: String,
}

impl InstanceNetworkAttachmentsApi<'_> {
    pub async fn list(&self) -> Result<Vec<InstanceNetworkAttachment>, ApiError> {
        let collection: InstanceNetworkAttachmentCollection = self.client.get(&self.base).await?;
        Ok(collection.network_attachments)
    }

    pub async fn get(&self, attachment_id: &str) -> Result<InstanceNetworkAttachment, ApiError> {
        self.client.get(&self.path(attachment_id)).await
    }

    pub async fn create(
        &self,
        prototype: &InstanceNetworkAttachmentPrototype,
    ) -> Result<InstanceNetworkAttachment, ApiError> {
        self.client.post(&self.base, prototype).await
    }

    pub async fn update(
        &self,
        attachment_id: &str,
        patch: &InstanceNetworkAttachmentPatch,
    ) -> Result<InstanceNetworkAttachment, ApiError> {
        self.client.patch(&self.path(attachment_id), patch).await
    }

    pub async fn delete(&self, attachment_id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.path(attachment_id)).await
    }

    fn path(&self, attachment_id: &str) -> String {
        format!("{}/{}", self.base, segment(attachment_id))
    }
}
