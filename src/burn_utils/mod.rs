pub mod avoid_overflow;
pub mod distribution;
pub mod flat_params;
pub mod gru_cell;
pub mod sequence;
pub use avoid_overflow::*;
pub use flat_params::*;
pub use sequence::*;
