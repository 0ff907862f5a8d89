pub mod classifier;
pub mod config;
pub mod error;
pub mod import;
pub mod models;
pub mod moderation;
pub mod render;
pub mod router;
pub mod session;
pub mod storage;
pub mod store;
pub mod views;
