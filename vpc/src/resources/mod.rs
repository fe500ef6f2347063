pub mod bare_metal;
pub mod common;
pub mod load_balancers;
pub mod network;

pub use bare_metal::{BareMetalServerNetworkAttachmentResource, BareMetalServerNetworkInterfaceResource};
pub use load_balancers::{
    LbListenerPolicyResource, LbListenerResource, LbPoolMemberResource, LbPoolResource,
};
pub use network::{
    InstanceNetworkAttachmentResource, SubnetReservedIpResource, VirtualNetworkInterfaceResource,
};
