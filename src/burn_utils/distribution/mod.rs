use burn::prelude::*;

pub mod categorical;
pub mod normal;

/// Action distribution produced by a policy over `(batch, time, ·)`.
#[derive(Debug, Clone)]
pub enum Distribution<B: Backend> {
    Normal(normal::Normal<B>),
    Categorical(categorical::Categorical<B>),
}

impl<B: Backend> Distribution<B> {
    pub fn sample(&self) -> Tensor<B, 3> {
        match self {
            Distribution::Normal(normal) => normal.sample(),
            Distribution::Categorical(categorical) => categorical.sample(),
        }
    }

    pub fn mode(&self) -> Tensor<B, 3> {
        match self {
            Distribution::Normal(normal) => normal.mode(),
            Distribution::Categorical(categorical) => categorical.mode(),
        }
    }

    /// Joint log-likelihood of the action at every step, `(batch, time)`.
    pub fn log_prob(&self, value: Tensor<B, 3>) -> Tensor<B, 2> {
        match self {
            Distribution::Normal(normal) => normal.log_prob(value),
            Distribution::Categorical(categorical) => categorical.log_prob(value),
        }
    }

    /// KL(self || other), `(batch, time)`.
    ///
    /// # Panics
    /// If the two distributions are of different families.
    pub fn kl(&self, other: &Self) -> Tensor<B, 2> {
        match (self, other) {
            (Distribution::Normal(p), Distribution::Normal(q)) => p.kl(q),
            (Distribution::Categorical(p), Distribution::Categorical(q)) => p.kl(q),
            _ => panic!("kl between different distribution families"),
        }
    }

    pub fn entropy(&self) -> Tensor<B, 2> {
        match self {
            Distribution::Normal(normal) => normal.entropy(),
            Distribution::Categorical(categorical) => categorical.entropy(),
        }
    }

    pub fn detach(self) -> Self {
        match self {
            Distribution::Normal(normal) => Distribution::Normal(normal.detach()),
            Distribution::Categorical(categorical) => {
                Distribution::Categorical(categorical.detach())
            }
        }
    }
}
