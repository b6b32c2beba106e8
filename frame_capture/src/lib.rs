mod camera;
mod prediction;
mod telemetry;

pub mod app;
pub mod config;

pub use app::start_app;
