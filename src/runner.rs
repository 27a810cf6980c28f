use std::path::Path;

use burn::tensor::backend::AutodiffBackend;
use log::{info, warn};

use crate::error::{Result, RunnerError};
use crate::rl_algorithm::base::config::{
    BaselineType, ControlMode, Recurrence, RunnerConfig, SamplerType,
};
use crate::rl_algorithm::base::model::PolicyConfig;
use crate::rl_algorithm::base::on_policy_runner::{SamplingPolicyOptimizer, TrainSummary};
use crate::rl_algorithm::base::rl_utils::header;
use crate::rl_algorithm::base::TrainingLog;
use crate::rl_algorithm::preload_net::baseline::BaselineConfig;
use crate::rl_algorithm::preload_net::categorical_mlp_policy::CategoricalMlpPolicyConfig;
use crate::rl_algorithm::preload_net::gaussian_gru_policy::GaussianGruPolicyConfig;
use crate::rl_algorithm::preload_net::gaussian_mlp_policy::GaussianMlpPolicyConfig;
use crate::rl_algorithm::preload_net::linear_baseline::LinearFeatureBaselineConfig;
use crate::rl_algorithm::preload_net::mlp_baseline::MlpBaselineConfig;
use crate::rl_algorithm::trpo::Trpo;
use crate::rl_env::config::{ParallelSamplerConfig, SamplerConfig, SamplerSpec};
use crate::rl_env::env::{BoxSpace, MultiAgentEnv, Space};
use crate::session::Session;

const INIT_LOGSTD: f64 = 0.0;

/// First-element bounds of a box, broadcast when synthesizing joint spaces.
fn leading_bounds(space: &BoxSpace) -> (f64, f64) {
    match (space.low.first(), space.high.first()) {
        (Some(lo), Some(hi)) => (*lo, *hi),
        _ => (f64::NEG_INFINITY, f64::INFINITY),
    }
}

/// Observation and action spaces the policy sees.
///
/// Centralized control concatenates every agent: both joint spaces take
/// agent 0's leading bounds, the action space from agent 0's action bounds.
pub fn derive_spaces<E: MultiAgentEnv>(env: &E, control: ControlMode) -> Result<(Space, Space)> {
    let agent0 = env
        .agents()
        .first()
        .ok_or_else(|| RunnerError::unsupported("n_agents", 0))?;
    if control == ControlMode::Decentralized {
        return Ok((agent0.observation_space.clone(), agent0.action_space.clone()));
    }

    let n_agents = env.n_agents();
    let obs_box = agent0
        .observation_space
        .as_box()
        .ok_or_else(|| RunnerError::unsupported("observation_space", agent0.observation_space.kind()))?;
    let action_box = agent0.action_space.as_box().ok_or_else(|| {
        RunnerError::unsupported("action_space", format!("centralized {}", agent0.action_space.kind()))
    })?;
    let (obs_lo, obs_hi) = leading_bounds(obs_box);
    let (act_lo, act_hi) = leading_bounds(action_box);
    if (obs_lo, obs_hi) != (act_lo, act_hi) {
        warn!(
            "centralized action bounds taken from the action space [{}, {}], not the observation space [{}, {}]",
            act_lo, act_hi, obs_lo, obs_hi
        );
    }
    return Ok((
        Space::Box(BoxSpace::uniform(obs_lo, obs_hi, obs_box.dim() * n_agents)),
        Space::Box(BoxSpace::uniform(act_lo, act_hi, action_box.dim() * n_agents)),
    ));
}

pub fn select_policy(
    config: &RunnerConfig,
    observation_space: &Space,
    action_space: &Space,
) -> Result<PolicyConfig> {
    let obs_dim = observation_space.obs_dim()?;
    let hidden_spec = config.policy_hidden_spec.clone();
    let policy = match (config.recurrent, action_space) {
        (Recurrence::Gru, Space::Box(b)) => PolicyConfig::GaussianGru(
            GaussianGruPolicyConfig::new(obs_dim, b.dim(), hidden_spec)
                .with_min_std(config.min_std)
                .with_init_logstd(INIT_LOGSTD),
        ),
        (Recurrence::Gru, other) => {
            return Err(RunnerError::unsupported(
                "recurrent",
                format!("gru with {} actions", other.kind()),
            ))
        }
        (Recurrence::None, Space::Box(b)) => PolicyConfig::GaussianMlp(
            GaussianMlpPolicyConfig::new(obs_dim, b.dim(), hidden_spec)
                .with_min_std(config.min_std)
                .with_init_logstd(INIT_LOGSTD),
        ),
        (Recurrence::None, Space::Discrete(n)) => {
            PolicyConfig::CategoricalMlp(CategoricalMlpPolicyConfig::new(obs_dim, *n, hidden_spec))
        }
        (Recurrence::None, other) => {
            return Err(RunnerError::unsupported("action_space", other.kind()))
        }
    };
    policy.check()?;
    Ok(policy)
}

pub fn select_baseline(config: &RunnerConfig, observation_space: &Space) -> Result<BaselineConfig> {
    let obs_dim = observation_space.obs_dim()?;
    let baseline = match config.baseline_type {
        BaselineType::Linear => BaselineConfig::Linear(LinearFeatureBaselineConfig::new(obs_dim)),
        BaselineType::Mlp => BaselineConfig::Mlp(
            MlpBaselineConfig::new(obs_dim, config.baseline_hidden_spec.clone())
                .with_enable_vnorm(config.enable_vnorm)
                .with_max_kl(config.max_vf_max_kl)
                .with_cg_damping(config.vf_cg_damping)
                .with_time_scale(1.0 / config.max_traj_len as f64),
        ),
        BaselineType::Zero => BaselineConfig::Zero,
    };
    baseline.check()?;
    Ok(baseline)
}

pub fn select_sampler(config: &RunnerConfig) -> Result<SamplerSpec> {
    let base = SamplerConfig::new(
        config.max_traj_len,
        config.n_timesteps,
        config.n_timesteps_min,
        config.n_timesteps_max,
        config.timestep_rate,
        config.adaptive_batch,
    );
    let spec = match (config.sampler, config.control) {
        (SamplerType::Simple, ControlMode::Centralized) => SamplerSpec::Simple(base),
        (SamplerType::Simple, ControlMode::Decentralized) => SamplerSpec::Decentralized(base),
        (SamplerType::Parallel, mode) => {
            if config.sampler_workers == 0 {
                return Err(RunnerError::unsupported("sampler_workers", 0));
            }
            SamplerSpec::Parallel(ParallelSamplerConfig::new(
                base,
                config.enable_rewnorm,
                config.sampler_workers,
                mode,
            ))
        }
    };
    Ok(spec)
}

/// Turns a configuration and an environment into a ready-to-train pipeline.
pub struct RunnerAssembler<E: MultiAgentEnv, B: AutodiffBackend> {
    config: RunnerConfig,
    observation_space: Space,
    action_space: Space,
    algo: SamplingPolicyOptimizer<E, B>,
    log: TrainingLog,
    device: B::Device,
}

impl<E: MultiAgentEnv, B: AutodiffBackend> RunnerAssembler<E, B> {
    pub fn new(env: E, config: RunnerConfig) -> Result<Self> {
        Self::with_device(env, config, B::Device::default())
    }

    /// Every unsupported option or combination is reported here, before any
    /// session exists.
    pub fn with_device(env: E, config: RunnerConfig, device: B::Device) -> Result<Self> {
        if config.max_traj_len == 0 {
            return Err(RunnerError::unsupported("max_traj_len", 0));
        }
        let (observation_space, action_space) = derive_spaces(&env, config.control)?;
        let policy = select_policy(&config, &observation_space, &action_space)?;
        let baseline = select_baseline(&config, &observation_space)?;
        let sampler = select_sampler(&config)?;
        let step_rule = Trpo::new(config.max_kl as f32);
        let obs_norm_dim = if config.enable_obsnorm {
            Some(observation_space.obs_dim()?)
        } else {
            None
        };
        let algo = SamplingPolicyOptimizer::new(
            env,
            policy,
            baseline,
            step_rule,
            config.discount as f32,
            config.gae_lambda as f32,
            sampler,
            config.n_iter,
            obs_norm_dim,
        );

        let args = config.to_json();
        header(&args);
        let mut log = TrainingLog::open(
            config.log.as_deref().map(Path::new),
            &[("args", args.as_str())],
            config.debug,
        )?;
        if let Some(tblog) = &config.tblog {
            log = log.with_tensorboard(tblog);
        }
        info!(
            "assembled {} + {} + {} sampler",
            algo.policy_config().name(),
            algo.baseline_config().name(),
            algo.sampler_spec().name()
        );
        Ok(Self {
            config,
            observation_space,
            action_space,
            algo,
            log,
            device,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    pub fn action_space(&self) -> &Space {
        &self.action_space
    }

    pub fn policy_config(&self) -> &PolicyConfig {
        self.algo.policy_config()
    }

    pub fn baseline_config(&self) -> &BaselineConfig {
        self.algo.baseline_config()
    }

    pub fn sampler_spec(&self) -> &SamplerSpec {
        self.algo.sampler_spec()
    }

    pub fn step_rule(&self) -> &Trpo {
        self.algo.step_rule()
    }

    pub fn log(&self) -> &TrainingLog {
        &self.log
    }

    /// Trains inside a session that lives exactly as long as this call.
    pub fn run(&mut self) -> Result<TrainSummary> {
        let save_freq = self.config.save_freq;
        let algo = &self.algo;
        let log = &mut self.log;
        Session::<B>::scoped(self.device.clone(), |session| algo.train(session, log, save_freq))
    }
}
