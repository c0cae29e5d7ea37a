pub mod messages;
pub mod paper;
pub mod sheets;
pub mod telegram;
pub mod traits;
