use crate::burn_utils::distribution::normal::Normal;
use crate::burn_utils::distribution::Distribution;
use crate::burn_utils::gru_cell::{GruCell, GruCellConfig};
use crate::burn_utils::{build_mlp_by_spec, Sequence};
use crate::error::RunnerError;
use crate::rl_algorithm::base::hidden_spec::HiddenSpec;
use crate::rl_algorithm::base::model::ActorModel;
use burn::{nn::Linear, nn::LinearConfig, prelude::*};

use super::utils::{logstd_holder, min_logstd};

/// Gaussian policy with a GRU cell between two feed-forward stacks.
/// The previous action is not fed back into the recurrent state.
#[derive(Module, Debug)]
pub struct GaussianGruPolicy<B: Backend> {
    pre_net: Sequence<B>,
    gru: GruCell<B>,
    post_net: Sequence<B>,
    mean_head: Linear<B>,
    logstd_linear: Linear<B>,
    min_logstd: f32,
}

impl<B: Backend> GaussianGruPolicy<B> {
    pub fn log_std(&self) -> Tensor<B, 1> {
        self.logstd_linear
            .weight
            .val()
            .flatten::<1>(0, 1)
            .clamp_min(self.min_logstd)
    }

    fn head(&self, hidden: Tensor<B, 3>) -> Distribution<B> {
        let mean = self.mean_head.forward(self.post_net.forward(hidden));
        Distribution::Normal(Normal::with_shared_scale(mean, self.log_std()))
    }
}

impl<B: Backend> ActorModel<B> for GaussianGruPolicy<B> {
    /// Runs whole (zero-padded) trajectories from a zero initial state.
    /// Padding only trails valid steps, so it never leaks into them.
    fn forward(&self, obs: Tensor<B, 3>) -> Distribution<B> {
        let hidden = self.gru.forward(self.pre_net.forward(obs), None);
        return self.head(hidden);
    }

    fn step(
        &self,
        obs: Tensor<B, 2>,
        state: Option<Tensor<B, 2>>,
    ) -> (Distribution<B>, Option<Tensor<B, 2>>) {
        let [batch_size, obs_dim] = obs.dims();
        let input = self.pre_net.forward(obs.reshape([batch_size, 1, obs_dim]));
        let hidden = self.gru.forward(input, state); // (batch_size, 1, hidden_size)
        let next_state = hidden.clone().reshape([batch_size, self.gru.hidden_size()]);
        return (self.head(hidden), Some(next_state));
    }
}

#[derive(Config, Debug)]
pub struct GaussianGruPolicyConfig {
    pub observation_dim: usize,
    pub action_dim: usize,
    pub hidden_spec: HiddenSpec,
    #[config(default = 1e-6)]
    pub min_std: f64,
    #[config(default = 0.0)]
    pub init_logstd: f64,
}

impl GaussianGruPolicyConfig {
    pub fn check(&self) -> crate::error::Result<()> {
        if self.hidden_spec.gru_count() != 1 {
            return Err(RunnerError::HiddenSpec {
                spec: format!("{:?}", self.hidden_spec),
                reason: format!(
                    "recurrent policy needs exactly one gru layer, found {}",
                    self.hidden_spec.gru_count()
                ),
            });
        }
        Ok(())
    }

    /// # Panics
    /// If [`check`](Self::check) fails.
    pub fn init<B: Backend>(&self, device: &B::Device) -> GaussianGruPolicy<B> {
        let (pre_spec, hidden_size, post_spec) = self
            .hidden_spec
            .split_at_gru()
            .expect("gru policy built from an unchecked hidden spec");
        let (pre_net, pre_dim) = build_mlp_by_spec(self.observation_dim, &pre_spec, device);
        let gru = GruCellConfig::new(pre_dim, hidden_size).init(device);
        let (post_net, post_dim) = build_mlp_by_spec(hidden_size, &post_spec, device);
        GaussianGruPolicy {
            pre_net,
            gru,
            post_net,
            mean_head: LinearConfig::new(post_dim, self.action_dim).init(device),
            logstd_linear: logstd_holder(self.action_dim, self.init_logstd, device),
            min_logstd: min_logstd(self.min_std),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::Distribution as td;

    fn spec() -> HiddenSpec {
        r#"[{"type":"fc","n":8},{"type":"nonlin","func":"tanh"},{"type":"gru","n":4}]"#
            .parse()
            .unwrap()
    }

    #[test]
    fn test_stepwise_matches_full_sequence() {
        let device = NdArrayDevice::Cpu;
        let policy = GaussianGruPolicyConfig::new(3, 2, spec()).init::<NdArray>(&device);
        let obs = Tensor::<NdArray, 3>::random([2, 3, 3], td::Normal(0.0, 1.0), &device);
        let full = policy.forward(obs.clone()).mode();

        let mut state = None;
        for t in 0..3 {
            let obs_t = obs.clone().slice([0..2, t..t + 1, 0..3]).reshape([2, 3]);
            let (dist, next) = policy.step(obs_t, state);
            state = next;
            let expected = full.clone().slice([0..2, t..t + 1, 0..2]);
            let diff = (dist.mode() - expected).abs().max().into_scalar();
            assert!(diff < 1e-5);
        }
        assert_eq!(state.unwrap().dims(), [2, 4]);
    }

    #[test]
    fn test_sampling_and_training_log_prob_agree() {
        let device = NdArrayDevice::Cpu;
        let spec: HiddenSpec = r#"[{"type":"gru","n":4}]"#.parse().unwrap();
        let policy = GaussianGruPolicyConfig::new(3, 2, spec).init::<NdArray>(&device);
        let obs = Tensor::<NdArray, 3>::ones([1, 3, 3], &device);
        let actions = Tensor::<NdArray, 3>::random([1, 3, 2], td::Normal(0.0, 1.0), &device);
        let full = policy.forward(obs.clone()).log_prob(actions.clone());

        let mut state = None;
        for t in 0..3 {
            let obs_t = obs.clone().slice([0..1, t..t + 1, 0..3]).reshape([1, 3]);
            let (dist, next) = policy.step(obs_t, state);
            state = next;
            let logp = dist.log_prob(actions.clone().slice([0..1, t..t + 1, 0..2]));
            let expected = full.clone().slice([0..1, t..t + 1]);
            let diff = (logp - expected).abs().max().into_scalar();
            assert!(diff < 1e-5, "t={} diff={}", t, diff);
        }
    }

    #[test]
    fn test_check_requires_one_gru() {
        assert!(GaussianGruPolicyConfig::new(3, 2, spec()).check().is_ok());
        assert!(GaussianGruPolicyConfig::new(3, 2, HiddenSpec::default())
            .check()
            .is_err());
    }
}
