pub mod app_context;
pub mod shutdown;
pub mod telemetry;
