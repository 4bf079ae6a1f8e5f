pub mod content;
pub mod handlers;
pub mod models;
pub mod plugin;
pub mod service;
pub mod submission;

pub use plugin::BlogPlugin;
