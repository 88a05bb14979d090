pub mod filter_repository;

pub use filter_repository::FilterRepository;
