use burn::config::Config;
use log::warn;
use ndarray::{s, Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::rl_algorithm::trpo::conjugate_gradient::conjugate_gradient;

const OBS_CLIP: f64 = 10.0;
const TIME_SCALE: f64 = 100.0;
const FIT_ATTEMPTS: usize = 5;

/// Value estimate linear in `[o, o², t, t², t³, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearFeatureBaseline {
    observation_dim: usize,
    reg_coeff: f64,
    coeffs: Option<Vec<f64>>,
}

#[derive(Config, Debug)]
pub struct LinearFeatureBaselineConfig {
    pub observation_dim: usize,
    #[config(default = 1e-5)]
    pub reg_coeff: f64,
}

impl LinearFeatureBaselineConfig {
    pub fn init(&self) -> LinearFeatureBaseline {
        LinearFeatureBaseline {
            observation_dim: self.observation_dim,
            reg_coeff: self.reg_coeff,
            coeffs: None,
        }
    }
}

impl LinearFeatureBaseline {
    pub fn n_features(&self) -> usize {
        2 * self.observation_dim + 4
    }

    pub fn is_fitted(&self) -> bool {
        self.coeffs.is_some()
    }

    /// Features of the first `len` steps of one trajectory, `(len, n_features)`.
    fn features(&self, obs: &Array3<f32>, traj: usize, len: usize) -> Array2<f64> {
        let d = self.observation_dim;
        let mut feats = Array2::<f64>::zeros((len, self.n_features()));
        for t in 0..len {
            let o = obs
                .slice(s![traj, t, ..])
                .mapv(|x| (x as f64).clamp(-OBS_CLIP, OBS_CLIP));
            let al = t as f64 / TIME_SCALE;
            let mut row = feats.row_mut(t);
            row.slice_mut(s![0..d]).assign(&o);
            row.slice_mut(s![d..2 * d]).assign(&o.mapv(|x| x * x));
            row[2 * d] = al;
            row[2 * d + 1] = al * al;
            row[2 * d + 2] = al * al * al;
            row[2 * d + 3] = 1.0;
        }
        return feats;
    }

    /// Ridge regression of `returns` on the features of every valid step.
    /// A non-finite solve is retried with a ten times larger ridge term; if
    /// every attempt fails the previous coefficients are kept.
    pub fn fit(&mut self, obs: &Array3<f32>, returns: &Array2<f32>, traj_length: &[usize]) {
        let n = self.n_features();
        let mut xtx = Array2::<f64>::zeros((n, n));
        let mut xty = Array1::<f64>::zeros(n);
        for (i, &len) in traj_length.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let feats = self.features(obs, i, len);
            let y = returns.slice(s![i, 0..len]).mapv(|x| x as f64);
            xtx = xtx + feats.t().dot(&feats);
            xty = xty + feats.t().dot(&y);
        }
        let mut reg = self.reg_coeff;
        for attempt in 0..FIT_ATTEMPTS {
            let mut a = xtx.clone();
            for k in 0..n {
                a[[k, k]] += reg;
            }
            let coeffs = conjugate_gradient(|v| a.dot(v), &xty, 4 * n, 1e-14);
            if coeffs.iter().all(|c| c.is_finite()) {
                self.coeffs = Some(coeffs.to_vec());
                return;
            }
            warn!(
                "linear baseline fit {} of {} is not finite with reg_coeff {:e}",
                attempt + 1,
                FIT_ATTEMPTS,
                reg
            );
            reg *= 10.0;
        }
        warn!("linear baseline keeps its previous coefficients");
    }

    /// `(n_traj, max_len)`; zero past each trajectory and before the first fit.
    pub fn predict(&self, obs: &Array3<f32>, traj_length: &[usize]) -> Array2<f32> {
        let (n_traj, max_len, _) = obs.dim();
        let mut values = Array2::<f32>::zeros((n_traj, max_len));
        let coeffs = match &self.coeffs {
            Some(c) => Array1::from_vec(c.clone()),
            None => return values,
        };
        for (i, &len) in traj_length.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let pred = self.features(obs, i, len).dot(&coeffs);
            values
                .slice_mut(s![i, 0..len])
                .assign(&pred.mapv(|x| x as f32));
        }
        return values;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_linear_target() {
        let mut baseline = LinearFeatureBaselineConfig::new(1).init();
        let (n_traj, max_len) = (4, 20);
        let obs = Array3::from_shape_fn((n_traj, max_len, 1), |(i, t, _)| {
            ((i * 7 + t * 3) % 11) as f32 / 5.0 - 1.0
        });
        let traj_length = vec![20, 15, 10, 20];
        let returns = Array2::from_shape_fn((n_traj, max_len), |(i, t)| {
            if t < traj_length[i] {
                2.0 * obs[[i, t, 0]] + 0.5 * obs[[i, t, 0]].powi(2) + 1.0 - t as f32 / 100.0
            } else {
                0.0
            }
        });

        assert!(baseline.predict(&obs, &traj_length).iter().all(|v| *v == 0.0));
        baseline.fit(&obs, &returns, &traj_length);
        assert!(baseline.is_fitted());
        let pred = baseline.predict(&obs, &traj_length);
        for i in 0..n_traj {
            for t in 0..max_len {
                if t < traj_length[i] {
                    assert!((pred[[i, t]] - returns[[i, t]]).abs() < 1e-2);
                } else {
                    assert_eq!(pred[[i, t]], 0.0);
                }
            }
        }
    }

    #[test]
    fn test_non_finite_fit_keeps_previous_coeffs() {
        let mut baseline = LinearFeatureBaselineConfig::new(1).init();
        let obs = Array3::from_shape_fn((2, 5, 1), |(i, t, _)| (i + t) as f32 / 5.0);
        let traj_length = vec![5, 5];

        let mut bad = Array2::<f32>::ones((2, 5));
        bad[[0, 2]] = f32::NAN;
        baseline.fit(&obs, &bad, &traj_length);
        assert!(!baseline.is_fitted());

        let good = Array2::from_shape_fn((2, 5), |(i, t)| (i + t) as f32);
        baseline.fit(&obs, &good, &traj_length);
        let before = baseline.predict(&obs, &traj_length);
        baseline.fit(&obs, &bad, &traj_length);
        assert!(baseline.is_fitted());
        assert_eq!(baseline.predict(&obs, &traj_length), before);
    }
}
