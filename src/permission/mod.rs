pub mod registry;
pub mod tree;

pub use registry::PermissionRegistry;
pub use tree::{CheckState, PermissionTree};
