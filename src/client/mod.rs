pub mod api_client;
pub mod saved_filters;

pub use api_client::FilterApiClient;
pub use saved_filters::SavedFilters;
