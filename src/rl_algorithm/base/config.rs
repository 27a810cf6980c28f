use std::str::FromStr;

use burn::config::Config;
use serde::{Deserialize, Serialize};

use super::hidden_spec::HiddenSpec;
use crate::error::RunnerError;

macro_rules! option_enum {
    ($name:ident, $option:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = RunnerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(RunnerError::unsupported($option, s)),
                }
            }
        }
    };
}

option_enum!(ControlMode, "control", {
    Centralized => "centralized",
    Decentralized => "decentralized",
});

option_enum!(Recurrence, "recurrent", {
    None => "none",
    Gru => "gru",
});

option_enum!(BaselineType, "baseline_type", {
    Linear => "linear",
    Mlp => "mlp",
    Zero => "zero",
});

option_enum!(SamplerType, "sampler", {
    Simple => "simple",
    Parallel => "parallel",
});

/// Every option the runner understands. Read-only once built.
#[derive(Config, Debug)]
pub struct RunnerConfig {
    pub control: ControlMode,
    pub recurrent: Recurrence,
    pub policy_hidden_spec: HiddenSpec,
    pub min_std: f64,
    pub enable_obsnorm: bool,
    pub tblog: Option<String>,
    pub baseline_type: BaselineType,
    pub baseline_hidden_spec: HiddenSpec,
    pub enable_vnorm: bool,
    pub max_vf_max_kl: f64,
    pub vf_cg_damping: f64,
    pub max_traj_len: usize,
    pub sampler: SamplerType,
    pub n_timesteps: usize,
    pub n_timesteps_min: usize,
    pub n_timesteps_max: usize,
    pub timestep_rate: usize,
    pub adaptive_batch: bool,
    pub enable_rewnorm: bool,
    pub sampler_workers: usize,
    pub max_kl: f64,
    pub discount: f64,
    pub gae_lambda: f64,
    pub n_iter: usize,
    pub log: Option<String>,
    pub debug: bool,
    pub save_freq: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            control: ControlMode::Decentralized,
            recurrent: Recurrence::None,
            policy_hidden_spec: HiddenSpec::default(),
            min_std: 1e-6,
            enable_obsnorm: false,
            tblog: None,
            baseline_type: BaselineType::Linear,
            baseline_hidden_spec: HiddenSpec::default(),
            enable_vnorm: false,
            max_vf_max_kl: 0.01,
            vf_cg_damping: 0.01,
            max_traj_len: 500,
            sampler: SamplerType::Simple,
            n_timesteps: 8000,
            n_timesteps_min: 4000,
            n_timesteps_max: 64000,
            timestep_rate: 20,
            adaptive_batch: false,
            enable_rewnorm: false,
            sampler_workers: 4,
            max_kl: 0.01,
            discount: 0.95,
            gae_lambda: 0.99,
            n_iter: 250,
            log: None,
            debug: false,
            save_freq: 20,
        }
    }
}

impl RunnerConfig {
    /// Pretty JSON rendering used for the console header and the log's `args` entry.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        assert_eq!("centralized".parse::<ControlMode>().unwrap(), ControlMode::Centralized);
        assert_eq!("GRU".parse::<Recurrence>().unwrap(), Recurrence::Gru);
        assert_eq!("zero".parse::<BaselineType>().unwrap(), BaselineType::Zero);
        assert_eq!("parallel".parse::<SamplerType>().unwrap(), SamplerType::Parallel);
    }

    #[test]
    fn test_unknown_options_are_unsupported() {
        assert!("concurrent".parse::<ControlMode>().unwrap_err().is_unsupported());
        assert!("lstm".parse::<Recurrence>().unwrap_err().is_unsupported());
        assert!("gaussian".parse::<BaselineType>().unwrap_err().is_unsupported());
        assert!("distributed".parse::<SamplerType>().unwrap_err().is_unsupported());
    }

    #[test]
    fn test_config_json_contains_every_option() {
        let json = RunnerConfig::default().to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["control"], "decentralized");
        assert_eq!(obj["baseline_type"], "linear");
        assert!(obj.contains_key("vf_cg_damping"));
        assert!(obj.contains_key("save_freq"));
        assert_eq!(obj.len(), 27);
    }
}
