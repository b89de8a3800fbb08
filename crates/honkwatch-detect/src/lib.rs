pub mod config;
pub mod detector;
pub mod energy;
pub mod filter;
pub mod rate_limit;

pub use config::DetectorConfig;
pub use detector::BandEnergyDetector;
pub use energy::EnergyMeter;
pub use filter::BandpassFilter;
pub use rate_limit::{AlertDecision, AlertPolicy, AlertRateLimiter};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("Invalid detector config: {0}")]
    InvalidConfig(String),

    #[error("Frame size mismatch: expected {expected} samples, got {got}")]
    FrameSize { expected: usize, got: usize },
}
