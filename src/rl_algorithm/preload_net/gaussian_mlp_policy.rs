use crate::burn_utils::distribution::normal::Normal;
use crate::burn_utils::distribution::Distribution;
use crate::burn_utils::{build_mlp_by_spec, Sequence};
use crate::error::RunnerError;
use crate::rl_algorithm::base::hidden_spec::HiddenSpec;
use crate::rl_algorithm::base::model::ActorModel;
use burn::{nn::Linear, nn::LinearConfig, prelude::*};

use super::utils::{logstd_holder, min_logstd};

#[derive(Module, Debug)]
pub struct GaussianMlpPolicy<B: Backend> {
    mean_net: Sequence<B>,
    mean_head: Linear<B>,
    logstd_linear: Linear<B>,
    min_logstd: f32,
}

impl<B: Backend> GaussianMlpPolicy<B> {
    pub fn log_std(&self) -> Tensor<B, 1> {
        self.logstd_linear
            .weight
            .val()
            .flatten::<1>(0, 1)
            .clamp_min(self.min_logstd)
    }
}

impl<B: Backend> ActorModel<B> for GaussianMlpPolicy<B> {
    fn forward(&self, obs: Tensor<B, 3>) -> Distribution<B> {
        let mean = self.mean_head.forward(self.mean_net.forward(obs));
        return Distribution::Normal(Normal::with_shared_scale(mean, self.log_std()));
    }
}

#[derive(Config, Debug)]
pub struct GaussianMlpPolicyConfig {
    pub observation_dim: usize,
    pub action_dim: usize,
    pub hidden_spec: HiddenSpec,
    #[config(default = 1e-6)]
    pub min_std: f64,
    #[config(default = 0.0)]
    pub init_logstd: f64,
}

impl GaussianMlpPolicyConfig {
    pub fn check(&self) -> crate::error::Result<()> {
        if self.hidden_spec.gru_count() > 0 {
            return Err(RunnerError::HiddenSpec {
                spec: format!("{:?}", self.hidden_spec),
                reason: "feed-forward policy cannot hold a gru layer".to_string(),
            });
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> GaussianMlpPolicy<B> {
        let (mean_net, hidden_dim) =
            build_mlp_by_spec(self.observation_dim, &self.hidden_spec, device);
        GaussianMlpPolicy {
            mean_net,
            mean_head: LinearConfig::new(hidden_dim, self.action_dim).init(device),
            logstd_linear: logstd_holder(self.action_dim, self.init_logstd, device),
            min_logstd: min_logstd(self.min_std),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_forward_shapes() {
        let device = NdArrayDevice::Cpu;
        let policy = GaussianMlpPolicyConfig::new(6, 2, HiddenSpec::default()).init::<NdArray>(&device);
        let dist = policy.forward(Tensor::zeros([3, 5, 6], &device));
        assert_eq!(dist.sample().dims(), [3, 5, 2]);
        assert_eq!(dist.log_prob(dist.mode()).dims(), [3, 5]);
        assert_eq!(policy.log_std().into_data().to_vec::<f32>().unwrap(), vec![0.0, 0.0]);

        let (dist, state) = policy.step(Tensor::zeros([4, 6], &device), None);
        assert_eq!(dist.sample().dims(), [4, 1, 2]);
        assert!(state.is_none());
    }

    #[test]
    fn test_log_std_floor() {
        let device = NdArrayDevice::Cpu;
        let policy = GaussianMlpPolicyConfig::new(2, 1, HiddenSpec(vec![]))
            .with_min_std(0.5)
            .with_init_logstd(-5.0)
            .init::<NdArray>(&device);
        let log_std = policy.log_std().into_data().to_vec::<f32>().unwrap()[0];
        assert!((log_std - 0.5f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_gru_layer() {
        let spec: HiddenSpec = r#"[{"type":"gru","n":8}]"#.parse().unwrap();
        assert!(GaussianMlpPolicyConfig::new(2, 1, spec).check().is_err());
    }
}
