//! Bare metal server network interfaces and attachments

pub mod resource_network_attachment;
pub mod resource_network_interface;
pub mod server;

pub use resource_network_attachment::BareMetalServerNetworkAttachmentResource;
pub use resource_network_interface::BareMetalServerNetworkInterfaceResource;
