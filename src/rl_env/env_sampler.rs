use std::{
    sync::{mpsc::channel, Arc, Mutex},
    time::SystemTime,
};

use burn::prelude::Backend;
use log::{debug, warn};
use ndarray::{self as nd, Array1, Array2, ArrayView1};

use super::config::{ParallelSamplerConfig, SamplerConfig, SamplerSpec};
use super::env::{MultiAgentEnv, Space};
use crate::error::{Result, RunnerError};
use crate::rl_algorithm::base::config::ControlMode;
use crate::rl_algorithm::base::model::Actor;
use crate::rl_algorithm::base::rl_utils::RunningMeanStd;

#[derive(Debug, Clone)]
pub struct Trajectory {
    pub obs: nd::Array2<f64>,
    /// Actions as produced by the policy, before clipping to the bounds.
    pub actions: nd::Array2<f64>,
    pub rewards: nd::Array1<f64>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub n_traj: usize,
    pub n_timesteps: usize,
    /// Mean undiscounted return of the raw (unnormalized) rewards.
    pub mean_return: f64,
    pub mean_traj_len: f64,
    pub sample_secs: f64,
}

pub struct Batch {
    pub trajectories: Vec<Trajectory>,
    pub stats: BatchStats,
}

fn stack_rows(rows: &[Vec<f64>]) -> Array2<f64> {
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    return Array2::from_shape_vec((rows.len(), width), flat)
        .unwrap_or_else(|_| Array2::zeros((rows.len(), width)));
}

/// Maps one policy output row onto what the environment accepts.
fn to_env_action(space: &Space, row: ArrayView1<f64>) -> Vec<f64> {
    match space {
        Space::Box(b) => row.iter().enumerate().map(|(i, a)| b.clip(*a, i)).collect(),
        Space::Discrete(n) => row
            .iter()
            .map(|a| a.round().clamp(0.0, (*n as f64 - 1.0).max(0.0)))
            .collect(),
        Space::MultiDiscrete(_) => row.to_vec(),
    }
}

/// One episode with every agent driven through the joint observation.
pub fn rollout_centralized<E: MultiAgentEnv, B: Backend>(
    env: &mut E,
    actor: &Actor<B>,
    max_traj_len: usize,
) -> Trajectory {
    let spaces: Vec<Space> = env.agents().iter().map(|a| a.action_space.clone()).collect();
    let widths: Vec<usize> = spaces.iter().map(|s| s.flat_dim()).collect();
    let mut obs = env.reset().concat();
    let (mut obs_rows, mut action_rows, mut rewards) = (vec![], vec![], vec![]);
    let mut state = None;
    for _ in 0..max_traj_len {
        let joint_obs = stack_rows(&[obs.clone()]);
        let joint_action = actor.act(&joint_obs, &mut state).row(0).to_owned();
        let mut offset = 0;
        let env_actions: Vec<Vec<f64>> = spaces
            .iter()
            .zip(widths.iter())
            .map(|(space, w)| {
                let part = joint_action.slice(nd::s![offset..offset + w]);
                offset += w;
                to_env_action(space, part)
            })
            .collect();
        let info = env.step(&env_actions);
        obs_rows.push(obs);
        action_rows.push(joint_action.to_vec());
        rewards.push(info.rewards.iter().sum::<f64>());
        obs = info.obs.concat();
        if info.done {
            break;
        }
    }
    return Trajectory {
        obs: stack_rows(&obs_rows),
        actions: stack_rows(&action_rows),
        rewards: Array1::from_vec(rewards),
    };
}

/// One episode in which every agent acts from its own observation with the
/// shared policy; yields one trajectory per agent.
pub fn rollout_decentralized<E: MultiAgentEnv, B: Backend>(
    env: &mut E,
    actor: &Actor<B>,
    max_traj_len: usize,
) -> Vec<Trajectory> {
    let spaces: Vec<Space> = env.agents().iter().map(|a| a.action_space.clone()).collect();
    let n_agents = spaces.len();
    let mut obs = env.reset();
    let mut obs_rows = vec![vec![]; n_agents];
    let mut action_rows = vec![vec![]; n_agents];
    let mut rewards = vec![vec![]; n_agents];
    let mut state = None;
    for _ in 0..max_traj_len {
        let actions = actor.act(&stack_rows(&obs), &mut state);
        let env_actions: Vec<Vec<f64>> = spaces
            .iter()
            .enumerate()
            .map(|(i, space)| to_env_action(space, actions.row(i)))
            .collect();
        let info = env.step(&env_actions);
        for i in 0..n_agents {
            obs_rows[i].push(std::mem::take(&mut obs[i]));
            action_rows[i].push(actions.row(i).to_vec());
            rewards[i].push(info.rewards[i]);
        }
        obs = info.obs;
        if info.done {
            break;
        }
    }
    return (0..n_agents)
        .map(|i| Trajectory {
            obs: stack_rows(&obs_rows[i]),
            actions: stack_rows(&action_rows[i]),
            rewards: Array1::from_vec(std::mem::take(&mut rewards[i])),
        })
        .collect();
}

/// Runs whole episodes until at least `n_timesteps` steps are gathered.
fn collect<E: MultiAgentEnv, B: Backend>(
    env: &mut E,
    actor: &Actor<B>,
    mode: ControlMode,
    max_traj_len: usize,
    n_timesteps: usize,
) -> Vec<Trajectory> {
    let mut trajs = Vec::new();
    let mut steps = 0;
    while steps < n_timesteps {
        let episode = match mode {
            ControlMode::Centralized => vec![rollout_centralized(env, actor, max_traj_len)],
            ControlMode::Decentralized => rollout_decentralized(env, actor, max_traj_len),
        };
        let episode_steps: usize = episode.iter().map(|t| t.len()).sum();
        if episode_steps == 0 {
            warn!("environment produced an empty episode, stopping collection");
            break;
        }
        steps += episode_steps;
        trajs.extend(episode);
    }
    return trajs;
}

fn batch_stats(trajs: &[Trajectory], start: SystemTime) -> BatchStats {
    let n_traj = trajs.len();
    let n_timesteps: usize = trajs.iter().map(|t| t.len()).sum();
    let total_return: f64 = trajs.iter().map(|t| t.rewards.sum()).sum();
    let denom = n_traj.max(1) as f64;
    return BatchStats {
        n_traj,
        n_timesteps,
        mean_return: total_return / denom,
        mean_traj_len: n_timesteps as f64 / denom,
        sample_secs: start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.0),
    };
}

/// Centralized sampler on a single environment.
pub struct SimpleSampler<E: MultiAgentEnv> {
    env: E,
    config: SamplerConfig,
}

/// Decentralized sampler on a single environment.
pub struct DecSampler<E: MultiAgentEnv> {
    env: E,
    config: SamplerConfig,
}

pub struct ParallelSampler<E: MultiAgentEnv> {
    envs: Vec<Arc<Mutex<E>>>,
    config: ParallelSamplerConfig,
    pool: threadpool::ThreadPool,
    rew_norm: Option<RunningMeanStd>,
}

impl<E: MultiAgentEnv> ParallelSampler<E> {
    pub fn new(env: E, config: ParallelSamplerConfig) -> Self {
        let n_workers = config.n_workers.max(1);
        let envs = (0..n_workers)
            .map(|_| Arc::new(Mutex::new(env.clone())))
            .collect();
        return Self {
            envs,
            rew_norm: config.enable_rewnorm.then(|| RunningMeanStd::new(1)),
            pool: threadpool::ThreadPool::new(n_workers),
            config,
        };
    }

    /// Every worker must report back; a panicked job or a poisoned
    /// environment fails the whole batch.
    fn collect_raw<B: Backend>(&mut self, actor: &Actor<B>, itr: usize) -> Result<Vec<Trajectory>> {
        let n_workers = self.envs.len();
        let target = self.config.base.batch_timesteps(itr);
        let per_worker = target.div_ceil(n_workers);
        let (tx, rx) = channel();
        for (worker, env) in self.envs.iter().enumerate() {
            let tx = tx.clone();
            let env = env.clone();
            let actor = actor.clone();
            let mode = self.config.mode;
            let max_traj_len = self.config.base.max_traj_len;
            self.pool.execute(move || {
                let trajs = match env.lock() {
                    Ok(mut env) => Ok(collect(&mut *env, &actor, mode, max_traj_len, per_worker)),
                    Err(_) => Err("environment poisoned by an earlier panic".to_string()),
                };
                // receiver outlives the pool jobs
                let _ = tx.send((worker, trajs));
            });
        }
        drop(tx);

        let mut parts: Vec<Option<Vec<Trajectory>>> = vec![None; n_workers];
        for (worker, trajs) in rx.iter().take(n_workers) {
            match trajs {
                Ok(trajs) => parts[worker] = Some(trajs),
                Err(reason) => return Err(RunnerError::SamplerWorker { worker, reason }),
            }
        }
        let mut trajectories = Vec::new();
        for (worker, part) in parts.into_iter().enumerate() {
            match part {
                Some(trajs) => trajectories.extend(trajs),
                None => {
                    return Err(RunnerError::SamplerWorker {
                        worker,
                        reason: "job panicked before reporting".to_string(),
                    })
                }
            }
        }
        return Ok(trajectories);
    }

    /// Scales rewards by the running standard deviation of every reward seen.
    fn normalize_rewards(&mut self, mut trajs: Vec<Trajectory>) -> Vec<Trajectory> {
        let norm = match &mut self.rew_norm {
            Some(norm) => norm,
            None => return trajs,
        };
        let all: Vec<f64> = trajs.iter().flat_map(|t| t.rewards.iter().copied()).collect();
        let n = all.len();
        if let Ok(batch) = Array2::from_shape_vec((n, 1), all) {
            norm.update(batch.view());
        }
        let std = norm.std()[0] + 1e-8;
        for traj in trajs.iter_mut() {
            traj.rewards.mapv_inplace(|r| r / std);
        }
        return trajs;
    }
}

pub enum Sampler<E: MultiAgentEnv> {
    Simple(SimpleSampler<E>),
    Decentralized(DecSampler<E>),
    Parallel(ParallelSampler<E>),
}

impl<E: MultiAgentEnv> Sampler<E> {
    pub fn from_spec(spec: &SamplerSpec, env: E) -> Self {
        match spec {
            SamplerSpec::Simple(config) => Sampler::Simple(SimpleSampler {
                env,
                config: config.clone(),
            }),
            SamplerSpec::Decentralized(config) => Sampler::Decentralized(DecSampler {
                env,
                config: config.clone(),
            }),
            SamplerSpec::Parallel(config) => {
                Sampler::Parallel(ParallelSampler::new(env, config.clone()))
            }
        }
    }

    /// Collects the batch for iteration `itr` with a frozen `actor`.
    /// Statistics are computed before reward normalization.
    pub fn sample<B: Backend>(&mut self, actor: &Actor<B>, itr: usize) -> Result<Batch> {
        let start = SystemTime::now();
        let (trajectories, stats) = match self {
            Sampler::Simple(s) => {
                let n = s.config.batch_timesteps(itr);
                let trajs = collect(&mut s.env, actor, ControlMode::Centralized, s.config.max_traj_len, n);
                let stats = batch_stats(&trajs, start);
                (trajs, stats)
            }
            Sampler::Decentralized(s) => {
                let n = s.config.batch_timesteps(itr);
                let trajs = collect(&mut s.env, actor, ControlMode::Decentralized, s.config.max_traj_len, n);
                let stats = batch_stats(&trajs, start);
                (trajs, stats)
            }
            Sampler::Parallel(s) => {
                let raw = s.collect_raw(actor, itr)?;
                let stats = batch_stats(&raw, start);
                (s.normalize_rewards(raw), stats)
            }
        };
        debug!(
            "sampled {} trajectories / {} steps in {:.3}s",
            stats.n_traj, stats.n_timesteps, stats.sample_secs
        );
        return Ok(Batch {
            trajectories,
            stats,
        });
    }
}
