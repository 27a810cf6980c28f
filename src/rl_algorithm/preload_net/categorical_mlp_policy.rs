use crate::burn_utils::distribution::categorical::Categorical;
use crate::burn_utils::distribution::Distribution;
use crate::burn_utils::{build_mlp_by_spec, Sequence};
use crate::error::RunnerError;
use crate::rl_algorithm::base::hidden_spec::HiddenSpec;
use crate::rl_algorithm::base::model::ActorModel;
use burn::{nn::Linear, nn::LinearConfig, prelude::*};

#[derive(Module, Debug)]
pub struct CategoricalMlpPolicy<B: Backend> {
    hidden_net: Sequence<B>,
    logits_head: Linear<B>,
}

impl<B: Backend> ActorModel<B> for CategoricalMlpPolicy<B> {
    fn forward(&self, obs: Tensor<B, 3>) -> Distribution<B> {
        let logits = self.logits_head.forward(self.hidden_net.forward(obs)); // (B, T, n)
        return Distribution::Categorical(Categorical::from_logits(logits));
    }
}

#[derive(Config, Debug)]
pub struct CategoricalMlpPolicyConfig {
    pub observation_dim: usize,
    pub n_actions: usize,
    pub hidden_spec: HiddenSpec,
}

impl CategoricalMlpPolicyConfig {
    pub fn check(&self) -> crate::error::Result<()> {
        if self.hidden_spec.gru_count() > 0 {
            return Err(RunnerError::HiddenSpec {
                spec: format!("{:?}", self.hidden_spec),
                reason: "feed-forward policy cannot hold a gru layer".to_string(),
            });
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> CategoricalMlpPolicy<B> {
        let (hidden_net, hidden_dim) =
            build_mlp_by_spec(self.observation_dim, &self.hidden_spec, device);
        CategoricalMlpPolicy {
            hidden_net,
            logits_head: LinearConfig::new(hidden_dim, self.n_actions).init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_actions_are_indices() {
        let device = NdArrayDevice::Cpu;
        let policy = CategoricalMlpPolicyConfig::new(4, 5, HiddenSpec::default()).init::<NdArray>(&device);
        let (dist, _) = policy.step(Tensor::ones([3, 4], &device), None);
        let actions = dist.sample();
        assert_eq!(actions.dims(), [3, 1, 1]);
        for a in actions.into_data().to_vec::<f32>().unwrap() {
            assert!(a >= 0.0 && a < 5.0 && a.fract() == 0.0);
        }
        let entropy = dist.entropy().into_data().to_vec::<f32>().unwrap();
        assert!(entropy.iter().all(|h| *h > 0.0 && *h <= 5f32.ln() + 1e-5));
    }
}
