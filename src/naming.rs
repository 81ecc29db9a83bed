mod custom;
mod graceful;
mod resolver;

pub use custom::{CustomNames, NameTarget};
pub use graceful::{graceful_group_name, graceful_port_name, portgroup_base_name};
pub use resolver::{DisplayName, NameResolver, NameSource, NamingPolicy, ResolvedNames};
