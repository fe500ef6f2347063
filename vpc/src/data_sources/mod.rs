//! Read-only lookups. List data sources page through the whole collection.

pub mod data_source_bare_metal_server_network_interfaces;
pub mod data_source_lb;
pub mod data_source_subnet_reserved_ips;
pub mod data_source_virtual_network_interfaces;

pub use data_source_bare_metal_server_network_interfaces::BareMetalServerNetworkInterfacesDataSource;
pub use data_source_lb::LbDataSource;
pub use data_source_subnet_reserved_ips::SubnetReservedIpsDataSource;
pub use data_source_virtual_network_interfaces::VirtualNetworkInterfacesDataSource;

use tfplug::AttributeType;

pub(crate) fn object_of(fields: &[(&str, AttributeType)]) -> AttributeType {
    AttributeType::Object(
        fields
            .iter()
            .map(|(name, ty)| (name.to_string(), ty.clone()))
            .collect(),
    )
}

/// Computed list of objects with the given fields
pub(crate) fn list_of(fields: &[(&str, AttributeType)]) -> AttributeType {
    AttributeType::List(Box::new(object_of(fields)))
}
