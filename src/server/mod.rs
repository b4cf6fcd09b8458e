pub mod config;
pub mod sync_service;
