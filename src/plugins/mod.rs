pub mod auth;
pub mod blog;
pub mod comments;
pub mod health;
pub mod metrics;
