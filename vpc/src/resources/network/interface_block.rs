//! The `virtual_network_interface` block shared by instance and bare metal
//! server network attachments.

use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::OneOfValidator;

use crate::api::common::Identity;
use crate::api::virtual_network_interfaces::{
    AttachmentInterfacePrototype, VirtualNetworkInterfacePatch,
};
use crate::error::{Result, VpcError};
use crate::resources::common::*;
use crate::resources::network::resource_virtual_network_interface::{
    interface_patch, interface_prototype, FILTERING_MODES,
};

pub const INTERFACE_BLOCK: &str = "virtual_network_interface";

/// Settings that only apply when the interface is created inline
const INLINE_ONLY: &[&str] = &["subnet", "primary_ip", "security_groups", "resource_group"];

pub fn interface_block(builder: NestedBlockBuilder) -> NestedBlock {
    builder
        .description("Existing interface to attach, or settings for a new one")
        .min_items(1)
        .max_items(1)
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .description("ID of an existing virtual network interface")
                .optional()
                .computed()
                .force_new()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("subnet", AttributeType::String)
                .optional()
                .computed()
                .force_new()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("primary_ip", object_type(&["address", "reserved_ip", "name"]))
                .optional()
                .computed()
                .force_new()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "security_groups",
                AttributeType::Set(Box::new(AttributeType::String)),
            )
            .optional()
            .computed()
            .force_new()
            .build(),
        )
        .attribute(
            AttributeBuilder::new("resource_group", AttributeType::String)
                .optional()
                .computed()
                .force_new()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("allow_ip_spoofing", AttributeType::Bool)
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("auto_delete", AttributeType::Bool)
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("enable_infrastructure_nat", AttributeType::Bool)
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("protocol_state_filtering_mode", AttributeType::String)
                .optional()
                .computed()
                .validator(OneOfValidator::new(FILTERING_MODES))
                .build(),
        )
        .build()
}

/// The block's contents as a value of its own; `None` when absent or unknown
fn block_value(config: &DynamicValue) -> Option<DynamicValue> {
    config
        .get_map(&path(INTERFACE_BLOCK))
        .ok()
        .map(DynamicValue::from)
}

pub fn validate_interface_block(config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    let Some(block) = block_value(config) else {
        return diagnostics;
    };

    if state_string(&block, "id").is_some() {
        for name in INLINE_ONLY {
            if block.get(&path(name)).is_ok_and(|v| !v.is_null()) {
                diagnostics.push(Diagnostic::error(
                    "Conflicting virtual network interface settings",
                    format!(
                        "{}.{} cannot be set when attaching an existing interface by id",
                        INTERFACE_BLOCK, name
                    ),
                ));
            }
        }
    }

    diagnostics
}

/// Request body for the attachment's interface
pub fn attachment_interface(config: &DynamicValue) -> Result<AttachmentInterfacePrototype> {
    let block = block_value(config).ok_or_else(|| {
        VpcError::precondition(format!("the '{}' block is required", INTERFACE_BLOCK))
    })?;

    if let Some(id) = state_string(&block, "id") {
        return Ok(AttachmentInterfacePrototype::Existing(Identity::new(id)));
    }

    let prototype = interface_prototype(&block)?;
    if prototype.subnet.is_none() && prototype.primary_ip.as_ref().and_then(|ip| ip.id.as_ref()).is_none() {
        return Err(VpcError::precondition(format!(
            "{} needs either id, subnet or primary_ip.reserved_ip",
            INTERFACE_BLOCK
        )));
    }
    Ok(AttachmentInterfacePrototype::New(prototype))
}

/// In-place changes to the attached interface, keyed by its ID
pub fn interface_block_patch(
    config: &DynamicValue,
    prior: &DynamicValue,
) -> Result<Option<(String, VirtualNetworkInterfacePatch)>> {
    let (Some(new), Some(old)) = (block_value(config), block_value(prior)) else {
        return Ok(None);
    };
    let Some(vni_id) = state_string(&old, "id") else {
        return Ok(None);
    };

    let patch = interface_patch(&new, &old)?;
    Ok((!patch.is_empty()).then_some((vni_id, patch)))
}
