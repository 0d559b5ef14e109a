pub mod config;
pub mod frame;
pub mod shift;
pub mod store;
