mod app;
mod config;
mod generate;
mod http;
mod metrics;
mod sink;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use generate::GenerateError;
pub use http::HttpError;
pub use metrics::MetricsError;
pub use sink::SinkError;
