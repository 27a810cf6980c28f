pub mod base;
pub mod preload_net;
pub mod trpo;
