pub mod baseline;
pub mod categorical_mlp_policy;
pub mod gaussian_gru_policy;
pub mod gaussian_mlp_policy;
pub mod linear_baseline;
pub mod mlp_baseline;
pub mod utils;
