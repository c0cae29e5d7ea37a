pub mod adapters;
pub mod converter;
pub mod retry;
pub mod traits;
pub mod types;
