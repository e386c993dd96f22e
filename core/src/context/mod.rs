mod config;
pub mod error;

pub use config::{PoolConfig, ReplayConfig, ReplayConfigExt};
pub use error::ConfigError;
