use serde::{Deserialize, Serialize};

use crate::error::{Result, RunnerError};

/// Continuous space with per-dimension bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl BoxSpace {
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Self {
        assert_eq!(low.len(), high.len(), "box bounds must have the same shape");
        return Self { low, high };
    }

    /// Same scalar bound on every dimension.
    pub fn uniform(low: f64, high: f64, dim: usize) -> Self {
        return Self {
            low: vec![low; dim],
            high: vec![high; dim],
        };
    }

    pub fn dim(&self) -> usize {
        self.low.len()
    }

    pub fn clip(&self, value: f64, idx: usize) -> f64 {
        value.clamp(self.low[idx], self.high[idx])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Space {
    Box(BoxSpace),
    Discrete(usize),
    MultiDiscrete(Vec<usize>),
}

impl Space {
    pub fn kind(&self) -> &'static str {
        match self {
            Space::Box(_) => "box",
            Space::Discrete(_) => "discrete",
            Space::MultiDiscrete(_) => "multi_discrete",
        }
    }

    pub fn as_box(&self) -> Option<&BoxSpace> {
        match self {
            Space::Box(b) => Some(b),
            _ => None,
        }
    }

    /// Width of one row of this space in a trajectory array.
    /// Discrete actions are stored as a single float index.
    pub fn flat_dim(&self) -> usize {
        match self {
            Space::Box(b) => b.dim(),
            Space::Discrete(_) => 1,
            Space::MultiDiscrete(nvec) => nvec.len(),
        }
    }

    /// Observation spaces have to be boxes for every policy in this crate.
    pub fn obs_dim(&self) -> Result<usize> {
        match self {
            Space::Box(b) => Ok(b.dim()),
            other => Err(RunnerError::unsupported("observation_space", other.kind())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub observation_space: Space,
    pub action_space: Space,
}

#[derive(Default, Debug, Clone)]
pub struct StepInfo {
    pub obs: Vec<Vec<f64>>,
    pub rewards: Vec<f64>,
    pub done: bool,
}

/// Environment with one or more agents that act simultaneously.
pub trait MultiAgentEnv: Clone + Send + 'static {
    fn agents(&self) -> &[AgentSpec];
    fn reset(&mut self) -> Vec<Vec<f64>>;
    /// One action row per agent, in the layout of that agent's action space.
    fn step(&mut self, actions: &[Vec<f64>]) -> StepInfo;

    fn n_agents(&self) -> usize {
        self.agents().len()
    }

    fn name(&self) -> String {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("env")
            .to_string()
    }
}
