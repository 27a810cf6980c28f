use clap::Parser;

use crate::error::Result;
use crate::rl_algorithm::base::config::RunnerConfig;
use crate::rl_algorithm::base::hidden_spec::HiddenSpec;

/// Command line of the runner binary. Option strings stay raw here and are
/// validated by [`RunnerArgs::into_config`].
#[derive(Parser, Debug, Clone)]
#[command(name = "rltools-runner")]
#[command(about = "Multi-agent TRPO experiment runner", long_about = None)]
pub struct RunnerArgs {
    /// centralized | decentralized
    #[arg(long, default_value = "decentralized")]
    pub control: String,

    /// none | gru
    #[arg(long, default_value = "none")]
    pub recurrent: String,

    /// JSON layer list, e.g. '[{"type":"fc","n":64},{"type":"nonlin","func":"tanh"}]'
    #[arg(long = "policy-hidden-spec", value_name = "JSON")]
    pub policy_hidden_spec: Option<String>,

    #[arg(long = "min-std", default_value_t = 1e-6)]
    pub min_std: f64,

    #[arg(long = "enable-obsnorm", default_value_t = false)]
    pub enable_obsnorm: bool,

    /// Tensorboard log directory
    #[arg(long, value_name = "DIR")]
    pub tblog: Option<String>,

    /// linear | mlp | zero
    #[arg(long = "baseline-type", default_value = "linear")]
    pub baseline_type: String,

    #[arg(long = "baseline-hidden-spec", value_name = "JSON")]
    pub baseline_hidden_spec: Option<String>,

    #[arg(long = "enable-vnorm", default_value_t = false)]
    pub enable_vnorm: bool,

    #[arg(long = "max-vf-max-kl", default_value_t = 0.01)]
    pub max_vf_max_kl: f64,

    #[arg(
        long = "vf-cg-damping",
        aliases = ["vf-cg-dampoing", "vf_cg_dampoing"],
        default_value_t = 0.01
    )]
    pub vf_cg_damping: f64,

    #[arg(long = "max-traj-len", default_value_t = 500)]
    pub max_traj_len: usize,

    /// simple | parallel
    #[arg(long, default_value = "simple")]
    pub sampler: String,

    #[arg(long = "n-timesteps", default_value_t = 8000)]
    pub n_timesteps: usize,

    #[arg(long = "n-timesteps-min", default_value_t = 4000)]
    pub n_timesteps_min: usize,

    #[arg(long = "n-timesteps-max", default_value_t = 64000)]
    pub n_timesteps_max: usize,

    #[arg(long = "timestep-rate", default_value_t = 20)]
    pub timestep_rate: usize,

    #[arg(long = "adaptive-batch", default_value_t = false)]
    pub adaptive_batch: bool,

    #[arg(long = "enable-rewnorm", default_value_t = false)]
    pub enable_rewnorm: bool,

    #[arg(long = "sampler-workers", default_value_t = 4)]
    pub sampler_workers: usize,

    #[arg(long = "max-kl", default_value_t = 0.01)]
    pub max_kl: f64,

    #[arg(long, default_value_t = 0.95)]
    pub discount: f64,

    #[arg(long = "gae-lambda", default_value_t = 0.99)]
    pub gae_lambda: f64,

    #[arg(long = "n-iter", default_value_t = 250)]
    pub n_iter: usize,

    /// Experiment directory; defaults to a timestamped one under `data/`
    #[arg(long, value_name = "DIR")]
    pub log: Option<String>,

    /// Allow overwriting an existing experiment directory
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Snapshot every N iterations, 0 disables
    #[arg(long = "save-freq", default_value_t = 20)]
    pub save_freq: usize,

    // environment
    #[arg(long = "n-agents", default_value_t = 3)]
    pub n_agents: usize,

    /// Use the discrete action variant of the environment
    #[arg(long, default_value_t = false)]
    pub discrete: bool,

    /// Std of Gaussian noise added to every observation
    #[arg(long = "obs-noise", default_value_t = 0.0)]
    pub obs_noise: f64,

    /// Seed for the tensor backend
    #[arg(long)]
    pub seed: Option<u64>,
}

fn hidden_spec(raw: &Option<String>) -> Result<HiddenSpec> {
    match raw {
        Some(json) => json.parse(),
        None => Ok(HiddenSpec::default()),
    }
}

impl RunnerArgs {
    pub fn into_config(self) -> Result<RunnerConfig> {
        Ok(RunnerConfig {
            control: self.control.parse()?,
            recurrent: self.recurrent.parse()?,
            policy_hidden_spec: hidden_spec(&self.policy_hidden_spec)?,
            min_std: self.min_std,
            enable_obsnorm: self.enable_obsnorm,
            tblog: self.tblog,
            baseline_type: self.baseline_type.parse()?,
            baseline_hidden_spec: hidden_spec(&self.baseline_hidden_spec)?,
            enable_vnorm: self.enable_vnorm,
            max_vf_max_kl: self.max_vf_max_kl,
            vf_cg_damping: self.vf_cg_damping,
            max_traj_len: self.max_traj_len,
            sampler: self.sampler.parse()?,
            n_timesteps: self.n_timesteps,
            n_timesteps_min: self.n_timesteps_min,
            n_timesteps_max: self.n_timesteps_max,
            timestep_rate: self.timestep_rate,
            adaptive_batch: self.adaptive_batch,
            enable_rewnorm: self.enable_rewnorm,
            sampler_workers: self.sampler_workers,
            max_kl: self.max_kl,
            discount: self.discount,
            gae_lambda: self.gae_lambda,
            n_iter: self.n_iter,
            log: self.log,
            debug: self.debug,
            save_freq: self.save_freq,
        })
    }
}
