pub mod availability;
pub mod config;
pub mod kv_store;
pub mod probe;
pub mod remote_client;
pub mod screen;
pub mod screens;
pub mod tiered_fetch;
