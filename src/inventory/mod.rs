pub mod manager;

pub use manager::InventoryManager;
