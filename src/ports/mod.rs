pub mod availability_store;
pub mod cache;
