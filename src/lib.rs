pub mod api;
pub mod clients;
pub mod config;
pub mod dal;
pub mod model;
pub mod telemetry;
pub mod utils;
