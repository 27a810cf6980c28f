use burn::tensor::backend::AutodiffBackend;
use log::trace;
use ndarray::Array2;

use super::config::TrpoConfig;
use super::trust_region::trust_region_step;
use crate::burn_utils::mean_with_mask;
use crate::rl_algorithm::base::memory::Memory;
use crate::rl_algorithm::base::model::{ActorModel, Policy};
use crate::rl_algorithm::base::rl_utils::{ndarray2tensor2, scalar};

#[derive(Debug, Clone, Default)]
pub struct TrpoStats {
    pub surr_before: f32,
    pub surr_after: f32,
    pub mean_kl: f32,
    pub entropy: f32,
    pub backtracks: usize,
    pub accepted: bool,
}

/// Trust region policy optimization step rule.
#[derive(Debug, Clone)]
pub struct Trpo {
    config: TrpoConfig,
}

impl Trpo {
    pub fn new(max_kl: f32) -> Self {
        Self {
            config: TrpoConfig::new(max_kl),
        }
    }

    pub fn config(&self) -> &TrpoConfig {
        &self.config
    }

    /// Maximizes the importance-weighted advantage of the sampled actions
    /// subject to the mean KL bound. `advantages` is `(n_traj, max_len)`
    /// and zero on padding.
    pub fn step<B: AutodiffBackend>(
        &self,
        policy: Policy<B>,
        memory: &Memory<B>,
        advantages: &Array2<f32>,
    ) -> (Policy<B>, TrpoStats) {
        let obs = memory.obs().clone();
        let actions = memory.action().clone();
        let mask = memory.seq_mask().clone();
        let adv = ndarray2tensor2::<B, f32>(advantages.clone(), memory.device());

        let old_dist = policy.forward(obs.clone()).detach();
        let old_logp = old_dist.log_prob(actions.clone());
        let entropy = scalar(mean_with_mask(old_dist.entropy(), mask.clone()));
        trace!("old_logp={}", old_logp);

        let surrogate = |p: &Policy<B>| {
            let logp = p.forward(obs.clone()).log_prob(actions.clone());
            let ratio = (logp - old_logp.clone()).exp();
            -mean_with_mask(ratio * adv.clone(), mask.clone())
        };
        let mean_kl = |p: &Policy<B>| mean_with_mask(old_dist.kl(&p.forward(obs.clone())), mask.clone());

        let (policy, stats) = trust_region_step(policy, surrogate, mean_kl, &self.config);
        return (
            policy,
            TrpoStats {
                surr_before: stats.loss_before,
                surr_after: stats.loss_after,
                mean_kl: stats.mean_kl,
                entropy,
                backtracks: stats.backtracks,
                accepted: stats.accepted,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl_algorithm::base::hidden_spec::HiddenSpec;
    use crate::rl_algorithm::base::model::PolicyConfig;
    use crate::rl_algorithm::preload_net::categorical_mlp_policy::CategoricalMlpPolicyConfig;
    use crate::rl_algorithm::preload_net::gaussian_mlp_policy::GaussianMlpPolicyConfig;
    use crate::rl_env::env_sampler::Trajectory;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::backend::Autodiff;
    use ndarray::{Array1, Array2};

    type AB = Autodiff<NdArray>;

    fn trajectories(action_of: impl Fn(usize) -> f64) -> Vec<Trajectory> {
        (0..3)
            .map(|i| {
                let len = 8 - i;
                Trajectory {
                    obs: Array2::from_shape_fn((len, 3), |(t, k)| ((t * 3 + k + i) % 5) as f64 / 4.0 - 0.5),
                    actions: Array2::from_shape_fn((len, 1), |(t, _)| action_of(t + i)),
                    rewards: Array1::zeros(len),
                }
            })
            .collect()
    }

    fn advantages(memory: &Memory<AB>) -> Array2<f32> {
        let raw = Array2::from_shape_fn((memory.len(), memory.max_traj_len()), |(i, t)| {
            if (i + t) % 2 == 0 {
                1.0
            } else {
                -1.0
            }
        });
        raw * memory.mask_arr()
    }

    #[test]
    fn test_gaussian_step_within_bound() {
        let device = NdArrayDevice::Cpu;
        let memory = Memory::<AB>::from_trajectories(&trajectories(|k| (k % 3) as f64 - 1.0), None, &device);
        let policy = PolicyConfig::GaussianMlp(GaussianMlpPolicyConfig::new(3, 1, HiddenSpec::default()))
            .init::<AB>(&device);
        let trpo = Trpo::new(0.01);
        let (_, stats) = trpo.step(policy, &memory, &advantages(&memory));
        assert!(stats.surr_after <= stats.surr_before);
        assert!(stats.mean_kl <= 0.01 * 1.5);
        assert!(stats.entropy.is_finite());
    }

    #[test]
    fn test_categorical_step_within_bound() {
        let device = NdArrayDevice::Cpu;
        let memory = Memory::<AB>::from_trajectories(&trajectories(|k| (k % 4) as f64), None, &device);
        let policy = PolicyConfig::CategoricalMlp(CategoricalMlpPolicyConfig::new(3, 4, HiddenSpec::default()))
            .init::<AB>(&device);
        let (_, stats) = Trpo::new(0.02).step(policy, &memory, &advantages(&memory));
        assert!(stats.surr_after <= stats.surr_before);
        assert!(stats.mean_kl <= 0.02 * 1.5);
    }
}
