pub mod burn_utils;
pub mod cli;
pub mod error;
pub mod rl_algorithm;
pub mod rl_env;
pub mod runner;
pub mod session;

pub type MyPrecisionSettings = burn::record::FullPrecisionSettings;
pub type DefaultBackend = burn::backend::Autodiff<burn::backend::NdArray>;
