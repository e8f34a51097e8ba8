mod loader;
mod parse;
mod spec;
mod types;


pub use loader::load_test_spec;
pub use spec::{
    BreakerSettings, DEFAULT_REQUEST_TIMEOUT, MetricsOptions, PoolConfig, TestSpec,
};
pub use types::RawConfig;
