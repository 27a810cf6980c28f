use std::path::Path;

use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use ndarray::Array2;

use super::linear_baseline::{LinearFeatureBaseline, LinearFeatureBaselineConfig};
use super::mlp_baseline::{MlpBaseline, MlpBaselineConfig};
use crate::error::Result;
use crate::rl_algorithm::base::memory::Memory;
use crate::rl_algorithm::trpo::trust_region::TrustRegionStats;

/// Predicts nothing; advantages become plain discounted returns.
#[derive(Debug, Clone, Default)]
pub struct ZeroBaseline;

pub enum Baseline<B: AutodiffBackend> {
    Linear(LinearFeatureBaseline),
    Mlp(MlpBaseline<B>),
    Zero(ZeroBaseline),
}

impl<B: AutodiffBackend> Baseline<B> {
    /// Value of every slot of `memory`, zero on padding.
    pub fn predict(&self, memory: &Memory<B>) -> Array2<f32> {
        match self {
            Baseline::Linear(baseline) => baseline.predict(memory.obs_arr(), memory.traj_length()),
            Baseline::Mlp(baseline) => baseline.predict(memory),
            Baseline::Zero(_) => Array2::zeros((memory.len(), memory.max_traj_len())),
        }
    }

    /// Refits on the discounted returns of `memory`; only the MLP baseline
    /// reports a trust-region step.
    pub fn fit(&mut self, memory: &Memory<B>, returns: &Array2<f32>) -> Option<TrustRegionStats> {
        match self {
            Baseline::Linear(baseline) => {
                baseline.fit(memory.obs_arr(), returns, memory.traj_length());
                None
            }
            Baseline::Mlp(baseline) => Some(baseline.fit(memory, returns)),
            Baseline::Zero(_) => None,
        }
    }

    pub fn num_params(&self) -> usize {
        match self {
            Baseline::Linear(baseline) => baseline.n_features(),
            Baseline::Mlp(baseline) => baseline.value_net().num_params(),
            Baseline::Zero(_) => 0,
        }
    }

    /// Writes the fitted state into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        match self {
            Baseline::Linear(baseline) => {
                let json = serde_json::to_string(baseline)?;
                std::fs::write(dir.join("baseline.json"), json)?;
                Ok(())
            }
            Baseline::Mlp(baseline) => baseline.save(&dir.join("baseline")),
            Baseline::Zero(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BaselineConfig {
    Linear(LinearFeatureBaselineConfig),
    Mlp(MlpBaselineConfig),
    Zero,
}

impl BaselineConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BaselineConfig::Linear(_) => "LinearFeatureBaseline",
            BaselineConfig::Mlp(_) => "MLPBaseline",
            BaselineConfig::Zero => "ZeroBaseline",
        }
    }

    pub fn check(&self) -> Result<()> {
        match self {
            BaselineConfig::Mlp(config) => config.check(),
            _ => Ok(()),
        }
    }

    pub fn init<B: AutodiffBackend>(&self, device: &B::Device) -> Baseline<B> {
        match self {
            BaselineConfig::Linear(config) => Baseline::Linear(config.init()),
            BaselineConfig::Mlp(config) => Baseline::Mlp(config.init(device)),
            BaselineConfig::Zero => Baseline::Zero(ZeroBaseline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl_env::env_sampler::Trajectory;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::backend::Autodiff;
    use ndarray::Array1;

    #[test]
    fn test_zero_baseline_predicts_zeros() {
        let device = NdArrayDevice::Cpu;
        let traj = Trajectory {
            obs: Array2::ones((3, 2)),
            actions: Array2::zeros((3, 1)),
            rewards: Array1::ones(3),
        };
        let memory = Memory::<Autodiff<NdArray>>::from_trajectories(&[traj], None, &device);
        let mut baseline = BaselineConfig::Zero.init::<Autodiff<NdArray>>(&device);
        assert!(baseline.fit(&memory, &Array2::ones((1, 3))).is_none());
        assert_eq!(baseline.predict(&memory), Array2::<f32>::zeros((1, 3)));
        assert_eq!(baseline.num_params(), 0);
    }
}
