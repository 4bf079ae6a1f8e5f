pub mod config;
pub mod context;
pub mod db;
pub mod http_error;
pub mod kernel;
pub mod media;
pub mod plugins;
pub mod store;

pub use crate::context::AppContext;
pub use crate::kernel::*;
pub use crate::db::*;
