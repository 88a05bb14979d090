//! Operations console backend: saved log filters and the codec behind
//! them, applied-filter session state, role permission trees and the
//! component inventory.

pub mod api;
pub mod client;
pub mod filter;
pub mod inventory;
pub mod models;
pub mod permission;
pub mod storage;
pub mod store;
pub mod utils;
