pub mod components;
pub mod filters;
pub mod permissions;
