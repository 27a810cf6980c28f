pub mod config;
pub mod conjugate_gradient;
pub mod trpo_step;
pub mod trust_region;

pub use config::TrpoConfig;
pub use trpo_step::{Trpo, TrpoStats};
