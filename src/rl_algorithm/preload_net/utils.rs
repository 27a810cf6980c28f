use burn::{
    nn::{Initializer, Linear, LinearConfig},
    prelude::Backend,
};

/// State-independent log-std parameters of shape `(1, action_dim)`, read
/// through `weight`.
pub fn logstd_holder<B: Backend>(action_dim: usize, init_logstd: f64, device: &B::Device) -> Linear<B> {
    LinearConfig::new(1, action_dim)
        .with_bias(false)
        .with_initializer(Initializer::Constant { value: init_logstd })
        .init::<B>(device)
}

/// Floor for the log-std; no floor when `min_std <= 0`.
pub fn min_logstd(min_std: f64) -> f32 {
    if min_std > 0.0 {
        min_std.ln() as f32
    } else {
        f32::NEG_INFINITY
    }
}
