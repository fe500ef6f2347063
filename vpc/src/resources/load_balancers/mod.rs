//! Load balancer children: listeners, pools, members and listener policies.
//! Every mutation holds the load balancer's lock.

pub mod resource_lb_listener;
pub mod resource_lb_listener_policy;
pub mod resource_lb_pool;
pub mod resource_lb_pool_member;

pub use resource_lb_listener::LbListenerResource;
pub use resource_lb_listener_policy::LbListenerPolicyResource;
pub use resource_lb_pool::LbPoolResource;
pub use resource_lb_pool_member::LbPoolMemberResource;
