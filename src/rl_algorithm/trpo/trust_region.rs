use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;
use log::{debug, warn};
use ndarray::Array1;

use super::config::TrpoConfig;
use super::conjugate_gradient::conjugate_gradient;
use crate::burn_utils::{flat_grads, flat_params, set_flat_params};
use crate::rl_algorithm::base::rl_utils::scalar;

/// Length of the parameter shift used by the finite-difference
/// Fisher-vector product.
const FVP_SHIFT: f32 = 1e-2;

#[derive(Debug, Clone, Default)]
pub struct TrustRegionStats {
    pub loss_before: f32,
    pub loss_after: f32,
    pub mean_kl: f32,
    pub backtracks: usize,
    pub accepted: bool,
}

/// One natural-gradient step of `module` on `loss_fn` under
/// `kl_fn(module) <= config.max_kl`.
///
/// `kl_fn` must measure the divergence from a fixed (detached) reference
/// that coincides with `module` itself, so its gradient vanishes at the
/// starting point. When no candidate of the line search satisfies the
/// constraint and improves the loss, the incoming parameters are kept.
pub fn trust_region_step<B, M, L, K>(
    module: M,
    loss_fn: L,
    kl_fn: K,
    config: &TrpoConfig,
) -> (M, TrustRegionStats)
where
    B: AutodiffBackend,
    M: Module<B>,
    L: Fn(&M) -> Tensor<B, 1>,
    K: Fn(&M) -> Tensor<B, 1>,
{
    let loss = loss_fn(&module);
    let loss_before = scalar(loss.clone());
    let grad = flat_grads(&module, &loss.backward());
    let theta = flat_params(&module);
    let mut stats = TrustRegionStats {
        loss_before,
        loss_after: loss_before,
        ..Default::default()
    };
    if !grad.iter().all(|g| g.is_finite()) || !loss_before.is_finite() {
        warn!("non-finite gradient, skipping trust region step");
        return (module, stats);
    }

    let kl_grad_at = |params: &Array1<f32>| -> Array1<f32> {
        let shifted = set_flat_params(module.clone(), params);
        let grads = kl_fn(&shifted).backward();
        flat_grads(&shifted, &grads)
    };
    let fisher_vector_product = |v: &Array1<f32>| -> Array1<f32> {
        let norm = v.dot(v).sqrt();
        if norm == 0.0 {
            return Array1::zeros(v.len());
        }
        let eps = FVP_SHIFT / norm;
        let plus = kl_grad_at(&(&theta + &(v * eps)));
        let minus = kl_grad_at(&(&theta - &(v * eps)));
        (plus - minus) / (2.0 * eps) + v * config.cg_damping
    };

    let neg_grad = -&grad;
    let step_dir = conjugate_gradient(
        &fisher_vector_product,
        &neg_grad,
        config.cg_iters,
        config.cg_residual_tol,
    );
    let shs = 0.5 * step_dir.dot(&fisher_vector_product(&step_dir));
    if !(shs > 0.0) || !shs.is_finite() {
        debug!("degenerate search direction (shs={}), keeping parameters", shs);
        return (module, stats);
    }
    let full_step = &step_dir * (config.max_kl / shs).sqrt();

    let mut frac = 1.0f32;
    for backtrack in 0..config.max_backtracks {
        let candidate = set_flat_params(module.clone(), &(&theta + &(&full_step * frac)));
        let loss_new = scalar(loss_fn(&candidate));
        let kl_new = scalar(kl_fn(&candidate));
        if loss_new.is_finite() && kl_new <= config.max_kl && loss_new < loss_before {
            stats.loss_after = loss_new;
            stats.mean_kl = kl_new;
            stats.backtracks = backtrack;
            stats.accepted = true;
            return (candidate, stats);
        }
        frac *= config.backtrack_ratio;
    }
    debug!("line search failed after {} backtracks", config.max_backtracks);
    stats.backtracks = config.max_backtracks;
    return (set_flat_params(module, &theta), stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burn_utils::distribution::normal::Normal;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::backend::Autodiff;
    use burn::nn::{Linear, LinearConfig};
    use burn::tensor::Distribution as td;

    type AB = Autodiff<NdArray>;

    fn dist(linear: &Linear<AB>, obs: &Tensor<AB, 3>) -> Normal<AB> {
        let loc = linear.forward(obs.clone());
        let log_scale = loc.zeros_like();
        Normal::new(loc, log_scale)
    }

    #[test]
    fn test_step_respects_kl_bound() {
        let device = NdArrayDevice::Cpu;
        let linear: Linear<AB> = LinearConfig::new(3, 2).init(&device);
        let obs = Tensor::<AB, 3>::random([1, 32, 3], td::Normal(0.0, 1.0), &device);
        let old = dist(&linear, &obs).detach();
        let actions = old.sample();
        let old_logp = old.log_prob(actions.clone());
        let adv = Tensor::<AB, 2>::random([1, 32], td::Normal(0.0, 1.0), &device);

        let loss_fn = |m: &Linear<AB>| {
            let ratio = (dist(m, &obs).log_prob(actions.clone()) - old_logp.clone()).exp();
            -(ratio * adv.clone()).mean()
        };
        let kl_fn = |m: &Linear<AB>| old.kl(&dist(m, &obs)).mean();

        let config = TrpoConfig::new(0.01);
        let (updated, stats) = trust_region_step(linear, loss_fn, kl_fn, &config);
        assert!(stats.accepted);
        assert!(stats.loss_after < stats.loss_before);
        assert!(stats.mean_kl <= config.max_kl);
        let kl = scalar(kl_fn(&updated));
        assert!(kl <= config.max_kl + 1e-6);
    }

    #[test]
    fn test_zero_gradient_keeps_parameters() {
        let device = NdArrayDevice::Cpu;
        let linear: Linear<AB> = LinearConfig::new(2, 1).init(&device);
        let before = flat_params(&linear);
        let zero = Tensor::<AB, 3>::zeros([1, 4, 2], &device);
        let loss_fn = |m: &Linear<AB>| m.forward(zero.clone()).mul_scalar(0.0).sum();
        let kl_fn = |m: &Linear<AB>| m.forward(zero.clone()).mul_scalar(0.0).sum();
        let (updated, stats) = trust_region_step(linear, loss_fn, kl_fn, &TrpoConfig::default());
        assert!(!stats.accepted);
        assert_eq!(flat_params(&updated), before);
    }
}
