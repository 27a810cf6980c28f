use std::{marker::PhantomData, time::SystemTime};

use burn::module::{AutodiffModule, Module};
use burn::record::DefaultFileRecorder;
use burn::tensor::backend::AutodiffBackend;
use log::{info, warn};

use super::memory::Memory;
use super::model::{Actor, PolicyConfig};
use super::rl_utils::{compute_gae, explained_variance, RunningMeanStd};
use super::TrainingLog;
use crate::burn_utils::normalize_with_mask;
use crate::error::Result;
use crate::rl_algorithm::preload_net::baseline::BaselineConfig;
use crate::rl_algorithm::trpo::Trpo;
use crate::rl_env::config::SamplerSpec;
use crate::rl_env::env::MultiAgentEnv;
use crate::rl_env::env_sampler::Sampler;
use crate::session::Session;

#[derive(Debug, Clone, Default)]
pub struct TrainSummary {
    pub iterations: usize,
    pub total_timesteps: usize,
    pub last_mean_return: f64,
}

/// Batch policy optimization: sample with the current policy, estimate
/// advantages against the baseline, refit the baseline, take one step.
pub struct SamplingPolicyOptimizer<E: MultiAgentEnv, B: AutodiffBackend> {
    env: E,
    policy_config: PolicyConfig,
    baseline_config: BaselineConfig,
    step_rule: Trpo,
    discount: f32,
    gae_lambda: f32,
    sampler_spec: SamplerSpec,
    n_iter: usize,
    obs_norm_dim: Option<usize>,
    backend: PhantomData<B>,
}

impl<E: MultiAgentEnv, B: AutodiffBackend> SamplingPolicyOptimizer<E, B> {
    /// `obs_norm_dim` enables observation normalization over that many features.
    pub fn new(
        env: E,
        policy_config: PolicyConfig,
        baseline_config: BaselineConfig,
        step_rule: Trpo,
        discount: f32,
        gae_lambda: f32,
        sampler_spec: SamplerSpec,
        n_iter: usize,
        obs_norm_dim: Option<usize>,
    ) -> Self {
        Self {
            env,
            policy_config,
            baseline_config,
            step_rule,
            discount,
            gae_lambda,
            sampler_spec,
            n_iter,
            obs_norm_dim,
            backend: PhantomData,
        }
    }

    pub fn policy_config(&self) -> &PolicyConfig {
        &self.policy_config
    }

    pub fn baseline_config(&self) -> &BaselineConfig {
        &self.baseline_config
    }

    pub fn sampler_spec(&self) -> &SamplerSpec {
        &self.sampler_spec
    }

    pub fn step_rule(&self) -> &Trpo {
        &self.step_rule
    }

    /// Runs `n_iter` iterations inside `session`. A snapshot is saved every
    /// `save_freq` iterations; `save_freq == 0` disables snapshots.
    pub fn train(
        &self,
        session: &Session<B>,
        log: &mut TrainingLog,
        save_freq: usize,
    ) -> Result<TrainSummary> {
        let device = session.device();
        let mut policy = self.policy_config.init::<B>(device);
        session.register(self.policy_config.name(), &policy);
        let mut baseline = self.baseline_config.init::<B>(device);
        session.register_params(self.baseline_config.name(), baseline.num_params());

        let mut sampler = Sampler::from_spec(&self.sampler_spec, self.env.clone());
        let mut obs_norm = self.obs_norm_dim.map(RunningMeanStd::new);
        let mut summary = TrainSummary::default();
        info!(
            "training {} with {} / {} / {} sampler for {} iterations",
            self.env.name(),
            self.policy_config.name(),
            self.baseline_config.name(),
            self.sampler_spec.name(),
            self.n_iter
        );

        for itr in 0..self.n_iter {
            let actor = Actor::new(policy.valid(), obs_norm.clone(), device);
            let batch = sampler.sample(&actor, itr)?;
            if batch.trajectories.is_empty() {
                warn!("iteration {} collected no trajectories", itr);
                continue;
            }

            let train_start = SystemTime::now();
            if let Some(norm) = obs_norm.as_mut() {
                for traj in &batch.trajectories {
                    norm.update(traj.obs.view());
                }
            }
            let memory = Memory::<B>::from_trajectories(&batch.trajectories, obs_norm.as_ref(), device);

            let values = baseline.predict(&memory);
            let gae = compute_gae(
                memory.reward_arr().view(),
                values.view(),
                memory.traj_length(),
                self.discount,
                self.gae_lambda,
            );
            let vf_ev = explained_variance(values.view(), gae.returns.view(), memory.mask_arr().view());
            let advantages = normalize_with_mask(&gae.advantages, memory.mask_arr());
            let vf_stats = baseline.fit(&memory, &gae.returns);

            let (updated, stats) = self.step_rule.step(policy, &memory, &advantages);
            policy = updated;
            let train_secs = train_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.0);

            let mut row = vec![
                ("mean_return", batch.stats.mean_return),
                ("mean_traj_len", batch.stats.mean_traj_len),
                ("n_traj", batch.stats.n_traj as f64),
                ("n_timesteps", batch.stats.n_timesteps as f64),
                ("entropy", stats.entropy as f64),
                ("surr_before", stats.surr_before as f64),
                ("surr_after", stats.surr_after as f64),
                ("mean_kl", stats.mean_kl as f64),
                ("backtracks", stats.backtracks as f64),
                ("step_accepted", if stats.accepted { 1.0 } else { 0.0 }),
                ("vf_explained_variance", vf_ev as f64),
                ("sample_secs", batch.stats.sample_secs),
                ("train_secs", train_secs),
            ];
            if let Some(vf) = &vf_stats {
                row.push(("vf_loss_before", vf.loss_before as f64));
                row.push(("vf_loss_after", vf.loss_after as f64));
            }
            log.write(itr, &row)?;

            summary.iterations += 1;
            summary.total_timesteps += batch.stats.n_timesteps;
            summary.last_mean_return = batch.stats.mean_return;

            if save_freq > 0 && (itr + 1) % save_freq == 0 {
                if let Some(dir) = log.snapshot_dir(itr)? {
                    let recorder = DefaultFileRecorder::<crate::MyPrecisionSettings>::new();
                    policy.clone().save_file(dir.join("policy"), &recorder)?;
                    baseline.save(&dir)?;
                    info!("saved snapshot to {}", dir.display());
                }
            }
        }
        return Ok(summary);
    }
}
