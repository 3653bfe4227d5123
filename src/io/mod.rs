pub mod api;
pub mod auth;
pub mod config_io;
pub mod local_store;
