use burn::module::Module;
use burn::prelude::*;
use ndarray::Array2;

use super::rl_utils::{ndarray2tensor2, tensor2ndarray2, RunningMeanStd};
use crate::burn_utils::distribution::Distribution;
use crate::error::Result;
use crate::rl_algorithm::preload_net::categorical_mlp_policy::{
    CategoricalMlpPolicy, CategoricalMlpPolicyConfig,
};
use crate::rl_algorithm::preload_net::gaussian_gru_policy::{
    GaussianGruPolicy, GaussianGruPolicyConfig,
};
use crate::rl_algorithm::preload_net::gaussian_mlp_policy::{
    GaussianMlpPolicy, GaussianMlpPolicyConfig,
};

// for predicting the action distribution
pub trait ActorModel<B: Backend>: Module<B> {
    /// Whole trajectories, `(batch, time, obs_dim)`.
    fn forward(&self, obs: Tensor<B, 3>) -> Distribution<B>;

    /// One step for a batch of agents. The distribution is `(batch, 1, ·)`;
    /// recurrent policies thread their hidden state through `state`.
    fn step(
        &self,
        obs: Tensor<B, 2>,
        _state: Option<Tensor<B, 2>>,
    ) -> (Distribution<B>, Option<Tensor<B, 2>>) {
        let [batch_size, obs_dim] = obs.dims();
        return (self.forward(obs.reshape([batch_size, 1, obs_dim])), None);
    }
}

#[derive(Module, Debug)]
pub enum Policy<B: Backend> {
    GaussianMlp(GaussianMlpPolicy<B>),
    GaussianGru(GaussianGruPolicy<B>),
    CategoricalMlp(CategoricalMlpPolicy<B>),
}

impl<B: Backend> ActorModel<B> for Policy<B> {
    fn forward(&self, obs: Tensor<B, 3>) -> Distribution<B> {
        match self {
            Policy::GaussianMlp(policy) => policy.forward(obs),
            Policy::GaussianGru(policy) => policy.forward(obs),
            Policy::CategoricalMlp(policy) => policy.forward(obs),
        }
    }

    fn step(
        &self,
        obs: Tensor<B, 2>,
        state: Option<Tensor<B, 2>>,
    ) -> (Distribution<B>, Option<Tensor<B, 2>>) {
        match self {
            Policy::GaussianMlp(policy) => policy.step(obs, state),
            Policy::GaussianGru(policy) => policy.step(obs, state),
            Policy::CategoricalMlp(policy) => policy.step(obs, state),
        }
    }
}

/// Which policy to build, with everything needed to initialize it on a device.
#[derive(Debug, Clone)]
pub enum PolicyConfig {
    GaussianMlp(GaussianMlpPolicyConfig),
    GaussianGru(GaussianGruPolicyConfig),
    CategoricalMlp(CategoricalMlpPolicyConfig),
}

impl PolicyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyConfig::GaussianMlp(_) => "GaussianMLPPolicy",
            PolicyConfig::GaussianGru(_) => "GaussianGRUPolicy",
            PolicyConfig::CategoricalMlp(_) => "CategoricalMLPPolicy",
        }
    }

    pub fn check(&self) -> Result<()> {
        match self {
            PolicyConfig::GaussianMlp(config) => config.check(),
            PolicyConfig::GaussianGru(config) => config.check(),
            PolicyConfig::CategoricalMlp(config) => config.check(),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Policy<B> {
        match self {
            PolicyConfig::GaussianMlp(config) => Policy::GaussianMlp(config.init(device)),
            PolicyConfig::GaussianGru(config) => Policy::GaussianGru(config.init(device)),
            PolicyConfig::CategoricalMlp(config) => Policy::CategoricalMlp(config.init(device)),
        }
    }
}

/// Frozen copy of the policy used to collect one batch.
#[derive(Debug, Clone)]
pub struct Actor<B: Backend> {
    policy: Policy<B>,
    obs_norm: Option<RunningMeanStd>,
    device: B::Device,
}

impl<B: Backend> Actor<B> {
    pub fn new(policy: Policy<B>, obs_norm: Option<RunningMeanStd>, device: &B::Device) -> Self {
        Self {
            policy,
            obs_norm,
            device: device.clone(),
        }
    }

    /// Samples one action per row of `obs` and advances `state`.
    pub fn act(&self, obs: &Array2<f64>, state: &mut Option<Tensor<B, 2>>) -> Array2<f64> {
        let obs = match &self.obs_norm {
            Some(norm) => norm.normalize(obs.view()),
            None => obs.clone(),
        };
        let input = ndarray2tensor2::<B, f32>(obs.mapv(|x| x as f32), &self.device);
        let (dist, next_state) = self.policy.step(input, state.take());
        *state = next_state;
        let action = dist.sample().squeeze::<2>(1);
        return tensor2ndarray2(&action).mapv(|x| x as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl_algorithm::base::hidden_spec::HiddenSpec;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_actor_threads_recurrent_state() {
        let device = NdArrayDevice::Cpu;
        let spec: HiddenSpec = r#"[{"type":"gru","n":5}]"#.parse().unwrap();
        let config = PolicyConfig::GaussianGru(GaussianGruPolicyConfig::new(3, 2, spec));
        config.check().unwrap();
        let actor = Actor::new(config.init::<NdArray>(&device), None, &device);
        let mut state = None;
        let action = actor.act(&Array2::zeros((4, 3)), &mut state);
        assert_eq!(action.dim(), (4, 2));
        assert_eq!(state.unwrap().dims(), [4, 5]);
    }

    #[test]
    fn test_actor_feed_forward_has_no_state() {
        let device = NdArrayDevice::Cpu;
        let config = PolicyConfig::CategoricalMlp(CategoricalMlpPolicyConfig::new(
            3,
            4,
            HiddenSpec::default(),
        ));
        let actor = Actor::new(config.init::<NdArray>(&device), None, &device);
        let mut state = None;
        let action = actor.act(&Array2::zeros((2, 3)), &mut state);
        assert_eq!(action.dim(), (2, 1));
        assert!(state.is_none());
    }
}
