pub mod config;
pub mod models;

pub use config::Config;
pub use models::*;
