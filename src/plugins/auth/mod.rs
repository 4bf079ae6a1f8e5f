pub mod handlers;
pub mod middleware;
pub mod models;
pub mod plugin;
pub mod token;

pub use handlers::AuthUser;
pub use plugin::AuthPlugin;
