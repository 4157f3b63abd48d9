pub mod chat;
pub mod health;
pub mod messages;
pub mod sessions;
