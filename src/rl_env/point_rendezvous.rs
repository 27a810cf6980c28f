// Agents on a plane are rewarded for gathering around a shared target.

use ndarray::Array1;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Normal;

use super::env::{AgentSpec, BoxSpace, MultiAgentEnv, Space, StepInfo};

const ARENA: f64 = 1.0;
const MAX_SPEED: f64 = 0.05;
const CAPTURE_RADIUS: f64 = 0.05;

/// Discrete moves: stay, +x, -x, +y, -y.
const MOVES: [(f64, f64); 5] = [(0.0, 0.0), (1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)];

#[derive(Debug, Clone)]
pub struct PointRendezvous {
    agents: Vec<AgentSpec>,
    positions: Vec<[f64; 2]>,
    target: [f64; 2],
    discrete: bool,
    obs_noise: f64,
}

impl PointRendezvous {
    pub fn new(n_agents: usize, discrete: bool) -> Self {
        assert!(n_agents > 0, "need at least one agent");
        // own position, target offset, mean offset of the others
        let observation_space = Space::Box(BoxSpace::uniform(-2.0 * ARENA, 2.0 * ARENA, 6));
        let action_space = if discrete {
            Space::Discrete(MOVES.len())
        } else {
            Space::Box(BoxSpace::uniform(-1.0, 1.0, 2))
        };
        let agents = (0..n_agents)
            .map(|_| AgentSpec {
                observation_space: observation_space.clone(),
                action_space: action_space.clone(),
            })
            .collect();
        return Self {
            agents,
            positions: vec![[0.0; 2]; n_agents],
            target: [0.0; 2],
            discrete,
            obs_noise: 0.0,
        };
    }

    pub fn with_obs_noise(mut self, std: f64) -> Self {
        self.obs_noise = std;
        self
    }

    fn observe(&self) -> Vec<Vec<f64>> {
        let n = self.positions.len();
        let (sum_x, sum_y) = self
            .positions
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p[0], y + p[1]));
        let noise = Normal::new(0.0, self.obs_noise.max(1e-12)).ok();
        let mut rng = rand::rng();
        self.positions
            .iter()
            .map(|p| {
                let (mx, my) = if n > 1 {
                    (
                        (sum_x - p[0]) / (n - 1) as f64 - p[0],
                        (sum_y - p[1]) / (n - 1) as f64 - p[1],
                    )
                } else {
                    (0.0, 0.0)
                };
                let mut obs = vec![
                    p[0],
                    p[1],
                    self.target[0] - p[0],
                    self.target[1] - p[1],
                    mx,
                    my,
                ];
                if let (Some(noise), true) = (noise, self.obs_noise > 0.0) {
                    for x in obs.iter_mut() {
                        *x += rng.sample(noise);
                    }
                }
                obs
            })
            .collect()
    }

    fn velocity(&self, action: &[f64]) -> (f64, f64) {
        if self.discrete {
            let idx = (action[0].round().max(0.0) as usize).min(MOVES.len() - 1);
            return (MOVES[idx].0 * MAX_SPEED, MOVES[idx].1 * MAX_SPEED);
        }
        return (
            action[0].clamp(-1.0, 1.0) * MAX_SPEED,
            action[1].clamp(-1.0, 1.0) * MAX_SPEED,
        );
    }
}

impl MultiAgentEnv for PointRendezvous {
    fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    fn reset(&mut self) -> Vec<Vec<f64>> {
        let n = self.positions.len();
        let init = Array1::random(2 * n + 2, Uniform::new(-ARENA, ARENA));
        for (i, p) in self.positions.iter_mut().enumerate() {
            *p = [init[2 * i], init[2 * i + 1]];
        }
        self.target = [init[2 * n], init[2 * n + 1]];
        self.observe()
    }

    fn step(&mut self, actions: &[Vec<f64>]) -> StepInfo {
        assert_eq!(actions.len(), self.positions.len());
        for i in 0..self.positions.len() {
            let (vx, vy) = self.velocity(&actions[i]);
            let p = &mut self.positions[i];
            p[0] = (p[0] + vx).clamp(-ARENA, ARENA);
            p[1] = (p[1] + vy).clamp(-ARENA, ARENA);
        }
        let distances: Vec<f64> = self
            .positions
            .iter()
            .map(|p| ((p[0] - self.target[0]).powi(2) + (p[1] - self.target[1]).powi(2)).sqrt())
            .collect();
        let rewards = distances.iter().map(|d| -d).collect();
        let done = distances.iter().all(|d| *d < CAPTURE_RADIUS);
        return StepInfo {
            obs: self.observe(),
            rewards,
            done,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_shapes() {
        let mut env = PointRendezvous::new(3, false);
        let obs = env.reset();
        assert_eq!(obs.len(), 3);
        assert!(obs.iter().all(|o| o.len() == 6));
        assert_eq!(env.n_agents(), 3);
    }

    #[test]
    fn test_discrete_step_moves_agent() {
        let mut env = PointRendezvous::new(1, true);
        env.reset();
        env.positions[0] = [0.0, 0.0];
        let info = env.step(&[vec![1.0]]);
        assert!((info.obs[0][0] - MAX_SPEED).abs() < 1e-12);
        assert_eq!(info.rewards.len(), 1);
        assert!(info.rewards[0] <= 0.0);
    }

    #[test]
    fn test_obs_noise_perturbs_observations() {
        let mut env = PointRendezvous::new(2, false);
        env.reset();
        let clean = env.observe();
        assert_eq!(clean, env.observe());

        let env = env.with_obs_noise(0.5);
        let noisy = env.observe();
        assert_eq!(noisy.len(), clean.len());
        assert_ne!(noisy, clean);
    }
}
