pub mod config;
pub mod env;
pub mod env_sampler;
pub mod point_rendezvous;
