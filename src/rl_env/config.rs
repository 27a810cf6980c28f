use burn::config::Config;

use crate::rl_algorithm::base::config::ControlMode;

/// Batch shape shared by every sampler.
#[derive(Config, Debug)]
pub struct SamplerConfig {
    pub max_traj_len: usize,
    pub n_timesteps: usize,
    pub n_timesteps_min: usize,
    pub n_timesteps_max: usize,
    /// Iterations between two doublings of the batch when `adaptive` is set.
    pub timestep_rate: usize,
    pub adaptive: bool,
}

impl SamplerConfig {
    /// Timesteps to collect at iteration `itr`.
    pub fn batch_timesteps(&self, itr: usize) -> usize {
        let lo = self.n_timesteps_min.min(self.n_timesteps_max);
        let hi = self.n_timesteps_max.max(lo);
        if !self.adaptive {
            return self.n_timesteps.max(1);
        }
        let doublings = if self.timestep_rate == 0 {
            0
        } else {
            itr / self.timestep_rate
        };
        let mut n = self.n_timesteps.clamp(lo, hi);
        for _ in 0..doublings {
            if n >= hi {
                break;
            }
            n = n.saturating_mul(2);
        }
        return n.clamp(lo, hi).max(1);
    }
}

#[derive(Config, Debug)]
pub struct ParallelSamplerConfig {
    pub base: SamplerConfig,
    pub enable_rewnorm: bool,
    pub n_workers: usize,
    pub mode: ControlMode,
}

/// Sampler variant plus its arguments.
#[derive(Debug, Clone)]
pub enum SamplerSpec {
    Simple(SamplerConfig),
    Decentralized(SamplerConfig),
    Parallel(ParallelSamplerConfig),
}

impl SamplerSpec {
    pub fn name(&self) -> &'static str {
        match self {
            SamplerSpec::Simple(_) => "simple",
            SamplerSpec::Decentralized(_) => "decentralized",
            SamplerSpec::Parallel(_) => "parallel",
        }
    }
}
