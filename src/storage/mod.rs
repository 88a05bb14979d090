pub mod kv;
pub mod local_filters;

pub use kv::{JsonFileStore, KeyValueStore, KeyValueStoreExt, MemoryStore};
pub use local_filters::LocalFilterStore;
