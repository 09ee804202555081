pub mod config;
pub mod crl;
pub mod telemetry;
