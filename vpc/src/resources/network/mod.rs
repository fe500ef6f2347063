//! Subnet reserved IPs, virtual network interfaces and instance attachments

pub mod interface_block;
pub mod resource_instance_network_attachment;
pub mod resource_subnet_reserved_ip;
pub mod resource_virtual_network_interface;

pub use resource_instance_network_attachment::InstanceNetworkAttachmentResource;
pub use resource_subnet_reserved_ip::SubnetReservedIpResource;
pub use resource_virtual_network_interface::VirtualNetworkInterfaceResource;
