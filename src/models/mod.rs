pub mod config;
pub mod envelope;
pub mod filter;
pub mod inventory;
pub mod permission;
