use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nonlinearity {
    Tanh,
    Relu,
}

/// One entry of a hidden-layer architecture, e.g. `{"type": "fc", "n": 64}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerSpec {
    Fc { n: usize },
    Nonlin { func: Nonlinearity },
    Gru { n: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HiddenSpec(pub Vec<LayerSpec>);

impl HiddenSpec {
    pub fn layers(&self) -> &[LayerSpec] {
        &self.0
    }

    pub fn gru_count(&self) -> usize {
        self.0
            .iter()
            .filter(|l| matches!(l, LayerSpec::Gru { .. }))
            .count()
    }

    /// Layers before and after the single `gru` entry, plus its width.
    pub fn split_at_gru(&self) -> Option<(HiddenSpec, usize, HiddenSpec)> {
        if self.gru_count() != 1 {
            return None;
        }
        let idx = self
            .0
            .iter()
            .position(|l| matches!(l, LayerSpec::Gru { .. }))?;
        let n = match self.0[idx] {
            LayerSpec::Gru { n } => n,
            _ => unreachable!(),
        };
        return Some((
            HiddenSpec(self.0[..idx].to_vec()),
            n,
            HiddenSpec(self.0[idx + 1..].to_vec()),
        ));
    }

    /// Width of the output of a feed-forward stack fed with `input_dim` features.
    pub fn output_dim(&self, input_dim: usize) -> usize {
        self.0.iter().fold(input_dim, |dim, l| match l {
            LayerSpec::Fc { n } | LayerSpec::Gru { n } => *n,
            LayerSpec::Nonlin { .. } => dim,
        })
    }
}

impl Default for HiddenSpec {
    fn default() -> Self {
        HiddenSpec(vec![
            LayerSpec::Fc { n: 64 },
            LayerSpec::Nonlin {
                func: Nonlinearity::Tanh,
            },
            LayerSpec::Fc { n: 64 },
            LayerSpec::Nonlin {
                func: Nonlinearity::Tanh,
            },
        ])
    }
}

impl FromStr for HiddenSpec {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec: HiddenSpec = serde_json::from_str(s).map_err(|e| RunnerError::HiddenSpec {
            spec: s.to_string(),
            reason: e.to_string(),
        })?;
        if let Some(bad) = spec.0.iter().find(|l| match l {
            LayerSpec::Fc { n } | LayerSpec::Gru { n } => *n == 0,
            LayerSpec::Nonlin { .. } => false,
        }) {
            return Err(RunnerError::HiddenSpec {
                spec: s.to_string(),
                reason: format!("zero-width layer {:?}", bad),
            });
        }
        return Ok(spec);
    }
}
