use std::path::Path;

use crate::burn_utils::{build_mlp_by_spec, mean_with_mask, Sequence};
use crate::error::RunnerError;
use crate::rl_algorithm::base::hidden_spec::HiddenSpec;
use crate::rl_algorithm::base::memory::Memory;
use crate::rl_algorithm::base::rl_utils::{ndarray2tensor2, tensor2ndarray2, RunningMeanStd};
use crate::rl_algorithm::trpo::config::TrpoConfig;
use crate::rl_algorithm::trpo::trust_region::{trust_region_step, TrustRegionStats};
use burn::record::DefaultFileRecorder;
use burn::tensor::backend::AutodiffBackend;
use burn::{nn::Linear, nn::LinearConfig, prelude::*};
use ndarray::{Array2, Zip};

#[derive(Module, Debug)]
pub struct ValueNet<B: Backend> {
    net: Sequence<B>,
    head: Linear<B>,
}

impl<B: Backend> ValueNet<B> {
    /// `(batch, time, obs_dim + 1)` -> `(batch, time)`
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        self.head.forward(self.net.forward(input)).squeeze::<2>(2)
    }
}

/// Neural value function over `[o, t * time_scale]`, fitted with one
/// trust-region step per batch.
#[derive(Debug, Clone)]
pub struct MlpBaseline<B: AutodiffBackend> {
    value_net: ValueNet<B>,
    vnorm: Option<RunningMeanStd>,
    time_scale: f32,
    trpo_config: TrpoConfig,
}

#[derive(Config, Debug)]
pub struct MlpBaselineConfig {
    pub observation_dim: usize,
    pub hidden_spec: HiddenSpec,
    #[config(default = false)]
    pub enable_vnorm: bool,
    #[config(default = 0.01)]
    pub max_kl: f64,
    #[config(default = 0.01)]
    pub cg_damping: f64,
    #[config(default = 1.0)]
    pub time_scale: f64,
}

impl MlpBaselineConfig {
    pub fn check(&self) -> crate::error::Result<()> {
        if self.hidden_spec.gru_count() > 0 {
            return Err(RunnerError::HiddenSpec {
                spec: format!("{:?}", self.hidden_spec),
                reason: "baseline network cannot hold a gru layer".to_string(),
            });
        }
        Ok(())
    }

    pub fn init<B: AutodiffBackend>(&self, device: &B::Device) -> MlpBaseline<B> {
        let (net, hidden_dim) = build_mlp_by_spec(self.observation_dim + 1, &self.hidden_spec, device);
        MlpBaseline {
            value_net: ValueNet {
                net,
                head: LinearConfig::new(hidden_dim, 1).init(device),
            },
            vnorm: self.enable_vnorm.then(|| RunningMeanStd::new(1)),
            time_scale: self.time_scale as f32,
            trpo_config: TrpoConfig::new(self.max_kl as f32).with_cg_damping(self.cg_damping as f32),
        }
    }
}

impl<B: AutodiffBackend> MlpBaseline<B> {
    pub fn value_net(&self) -> &ValueNet<B> {
        &self.value_net
    }

    fn input(&self, memory: &Memory<B>) -> Tensor<B, 3> {
        let t = memory.timesteps().mapv(|x| x * self.time_scale);
        let t = ndarray2tensor2::<B, f32>(t, memory.device()).unsqueeze_dim::<3>(2);
        Tensor::cat(vec![memory.obs().clone(), t], 2)
    }

    fn vnorm_scale(&self) -> (f32, f32) {
        match &self.vnorm {
            Some(norm) => (norm.mean()[0] as f32, norm.std()[0] as f32 + 1e-8),
            None => (0.0, 1.0),
        }
    }

    pub fn predict(&self, memory: &Memory<B>) -> Array2<f32> {
        let values = tensor2ndarray2(&self.value_net.forward(self.input(memory)).detach());
        let (mean, std) = self.vnorm_scale();
        return values.mapv(|v| v * std + mean) * memory.mask_arr();
    }

    pub fn fit(&mut self, memory: &Memory<B>, returns: &Array2<f32>) -> TrustRegionStats {
        if let Some(norm) = &mut self.vnorm {
            let mut valid = vec![];
            Zip::from(returns)
                .and(memory.mask_arr())
                .for_each(|r, m| {
                    if *m > 0.0 {
                        valid.push(*r as f64);
                    }
                });
            let n = valid.len();
            if let Ok(batch) = Array2::from_shape_vec((n, 1), valid) {
                norm.update(batch.view());
            }
        }
        let (mean, std) = self.vnorm_scale();
        let targets = returns.mapv(|r| (r - mean) / std) * memory.mask_arr();

        let input = self.input(memory);
        let target = ndarray2tensor2::<B, f32>(targets, memory.device());
        let mask = memory.seq_mask().clone();
        let old_values = self.value_net.forward(input.clone()).detach();

        let loss_fn = |net: &ValueNet<B>| {
            let err = (net.forward(input.clone()) - target.clone()).powf_scalar(2.0);
            mean_with_mask(err, mask.clone())
        };
        // KL between unit-variance Gaussians centred on the old and new values
        let kl_fn = |net: &ValueNet<B>| {
            let diff = (net.forward(input.clone()) - old_values.clone()).powf_scalar(2.0);
            mean_with_mask(diff, mask.clone()).mul_scalar(0.5)
        };
        let (value_net, stats) =
            trust_region_step(self.value_net.clone(), loss_fn, kl_fn, &self.trpo_config);
        self.value_net = value_net;
        return stats;
    }

    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let recorder = DefaultFileRecorder::<crate::MyPrecisionSettings>::new();
        self.value_net
            .clone()
            .save_file(path.to_path_buf(), &recorder)
            .map_err(RunnerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl_env::env_sampler::Trajectory;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::backend::Autodiff;
    use ndarray::Array1;

    type AB = Autodiff<NdArray>;

    fn memory(device: &NdArrayDevice) -> Memory<AB> {
        let trajs: Vec<Trajectory> = (0..4)
            .map(|i| Trajectory {
                obs: Array2::from_shape_fn((10, 2), |(t, k)| (t + k + i) as f64 / 10.0),
                actions: Array2::zeros((10, 1)),
                rewards: Array1::from_elem(10, 1.0),
            })
            .collect();
        Memory::from_trajectories(&trajs, None, device)
    }

    #[test]
    fn test_fit_reduces_error() {
        let device = NdArrayDevice::Cpu;
        let memory = memory(&device);
        let returns = Array2::from_shape_fn((4, 10), |(_, t)| 10.0 - t as f32);
        let mut baseline = MlpBaselineConfig::new(2, HiddenSpec::default())
            .with_enable_vnorm(true)
            .with_time_scale(0.1)
            .init::<AB>(&device);

        let err = |pred: &Array2<f32>| (pred - &returns).mapv(|x| x * x).sum();
        let before = err(&baseline.predict(&memory));
        let stats = baseline.fit(&memory, &returns);
        assert!(stats.loss_after <= stats.loss_before);
        assert!(stats.mean_kl <= 0.01);
        let after = err(&baseline.predict(&memory));
        assert!(after < before);
    }

    #[test]
    fn test_rejects_gru_layer() {
        let spec: HiddenSpec = r#"[{"type":"gru","n":4}]"#.parse().unwrap();
        assert!(MlpBaselineConfig::new(2, spec).check().is_err());
    }
}
