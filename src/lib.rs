pub mod config;
pub mod console;
pub mod device_client;
pub mod http_client;
pub mod model;
pub mod operator;
pub mod services;
pub mod types;
