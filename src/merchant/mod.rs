pub mod override_rate;
pub mod portal;
