pub mod catalog;
pub mod gateway;
pub mod server;
pub mod services;
pub mod web;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
