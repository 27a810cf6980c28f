use burn::tensor::Distribution as td;
use burn::tensor::{backend::Backend, Tensor};

/// Diagonal Gaussian over `(batch, time, action_dim)`.
#[derive(Debug, Clone)]
pub struct Normal<B: Backend> {
    pub loc: Tensor<B, 3>,
    pub log_scale: Tensor<B, 3>,
}

impl<B: Backend> Normal<B> {
    pub fn new(loc: Tensor<B, 3>, log_scale: Tensor<B, 3>) -> Self {
        Self { loc, log_scale }
    }

    /// `log_scale` is one value per action dimension, shared by every step.
    pub fn with_shared_scale(loc: Tensor<B, 3>, log_scale: Tensor<B, 1>) -> Self {
        let [action_dim] = log_scale.dims();
        let log_scale = log_scale.reshape([1, 1, action_dim]).expand(loc.shape());
        Self { loc, log_scale }
    }

    pub fn sample(&self) -> Tensor<B, 3> {
        let standard_normal =
            Tensor::<B, 3>::random(self.loc.shape(), td::Normal(0.0, 1.0), &self.loc.device());
        return self.loc.clone() + standard_normal * self.log_scale.clone().exp();
    }

    pub fn mode(&self) -> Tensor<B, 3> {
        self.loc.clone()
    }

    /// Summed over the action dimension: `(batch, time)`.
    pub fn log_prob(&self, value: Tensor<B, 3>) -> Tensor<B, 2> {
        let half_log_2pi = 0.5 * (2.0 * std::f32::consts::PI).ln();
        let var = self.log_scale.clone().mul_scalar(2.0).exp();
        let log_prob = -((value - self.loc.clone()).powf_scalar(2.0) / var.mul_scalar(2.0))
            - self.log_scale.clone()
            - half_log_2pi;
        return log_prob.sum_dim(2).squeeze::<2>(2);
    }

    /// KL(self || other), `(batch, time)`.
    pub fn kl(&self, other: &Self) -> Tensor<B, 2> {
        let var = self.log_scale.clone().mul_scalar(2.0).exp();
        let other_var = other.log_scale.clone().mul_scalar(2.0).exp();
        let kl = other.log_scale.clone() - self.log_scale.clone()
            + (var + (self.loc.clone() - other.loc.clone()).powf_scalar(2.0))
                / other_var.mul_scalar(2.0)
            - 0.5;
        return kl.sum_dim(2).squeeze::<2>(2);
    }

    pub fn entropy(&self) -> Tensor<B, 2> {
        let c = 0.5 * (2.0 * std::f32::consts::PI * std::f32::consts::E).ln();
        return (self.log_scale.clone() + c).sum_dim(2).squeeze::<2>(2);
    }

    pub fn detach(self) -> Self {
        Self {
            loc: self.loc.detach(),
            log_scale: self.log_scale.detach(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::TensorData;

    fn normal(loc: f32, scale: f32) -> Normal<NdArray> {
        let device = NdArrayDevice::default();
        Normal::new(
            Tensor::from_data(TensorData::from([[[loc]]]), &device),
            Tensor::from_data(TensorData::from([[[scale.ln()]]]), &device),
        )
    }

    #[test]
    fn test_log_prob() {
        let device = NdArrayDevice::default();
        let dist = normal(2.0, 0.5);
        let value = Tensor::<NdArray, 3>::from_data(TensorData::from([[[3.0]]]), &device);
        let log_prob = dist.log_prob(value).into_data().to_vec::<f32>().unwrap()[0];
        let expected = -(1.0f32 / (2.0 * 0.25)) - 0.5f32.ln() - 0.5 * (2.0 * std::f32::consts::PI).ln();
        assert!((log_prob - expected).abs() < 1e-5);
    }

    #[test]
    fn test_kl() {
        let p = normal(0.0, 1.0);
        let q = normal(1.0, 2.0);
        let kl = p.kl(&q).into_data().to_vec::<f32>().unwrap()[0];
        let expected = 2.0f32.ln() + (1.0 + 1.0) / (2.0 * 4.0) - 0.5;
        assert!((kl - expected).abs() < 1e-5);
        let self_kl = p.kl(&p).into_data().to_vec::<f32>().unwrap()[0];
        assert!(self_kl.abs() < 1e-6);
    }

    #[test]
    fn test_shared_scale_broadcast() {
        let device = NdArrayDevice::default();
        let loc = Tensor::<NdArray, 3>::zeros([2, 3, 4], &device);
        let dist = Normal::with_shared_scale(loc, Tensor::zeros([4], &device));
        assert_eq!(dist.sample().dims(), [2, 3, 4]);
        assert_eq!(dist.entropy().dims(), [2, 3]);
    }
}
