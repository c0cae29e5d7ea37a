pub mod rate_cache;
