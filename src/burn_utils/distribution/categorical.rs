use burn::tensor::activation::log_softmax;
use burn::tensor::Distribution as td;
use burn::tensor::{backend::Backend, Tensor};

/// Categorical over `n` choices per step. Actions are carried as float
/// indices of shape `(batch, time, 1)` so they share the Gaussian layout.
#[derive(Debug, Clone)]
pub struct Categorical<B: Backend> {
    log_prob: Tensor<B, 3>, // (batch, time, n)
}

impl<B: Backend> Categorical<B> {
    pub fn from_logits(logits: Tensor<B, 3>) -> Self {
        Self {
            log_prob: log_softmax(logits, 2),
        }
    }

    pub fn probs(&self) -> Tensor<B, 3> {
        self.log_prob.clone().exp()
    }

    /// Gumbel-max sampling.
    pub fn sample(&self) -> Tensor<B, 3> {
        let u = Tensor::<B, 3>::random(
            self.log_prob.shape(),
            td::Uniform(0.0, 1.0),
            &self.log_prob.device(),
        )
        .clamp(1e-10, 1.0 - 1e-7);
        let gumbel = -(-u.log()).log();
        return (self.log_prob.clone() + gumbel).argmax(2).float();
    }

    pub fn mode(&self) -> Tensor<B, 3> {
        self.log_prob.clone().argmax(2).float()
    }

    pub fn log_prob(&self, value: Tensor<B, 3>) -> Tensor<B, 2> {
        let idx = value.int();
        return self.log_prob.clone().gather(2, idx).squeeze::<2>(2);
    }

    pub fn kl(&self, other: &Self) -> Tensor<B, 2> {
        let p = self.probs();
        return (p * (self.log_prob.clone() - other.log_prob.clone()))
            .sum_dim(2)
            .squeeze::<2>(2);
    }

    pub fn entropy(&self) -> Tensor<B, 2> {
        let p = self.probs();
        return -(p * self.log_prob.clone()).sum_dim(2).squeeze::<2>(2);
    }

    pub fn detach(self) -> Self {
        Self {
            log_prob: self.log_prob.detach(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::TensorData;

    #[test]
    fn test_log_prob() {
        let device = NdArrayDevice::default();
        // (1, 2, 2) = (batch, time, n)
        let logits = Tensor::<NdArray, 3>::from_data(
            TensorData::from([[[0.25f32.ln(), 0.75f32.ln()], [0.5f32.ln(), 0.5f32.ln()]]]),
            &device,
        );
        let dist = Categorical::from_logits(logits);
        let actions = Tensor::<NdArray, 3>::from_floats([[[1.0], [0.0]]], &device);
        let log_prob = dist.log_prob(actions);
        let expected = Tensor::<NdArray, 2>::from_floats([[0.75, 0.5]], &device).log();
        assert!((log_prob - expected).abs().sum().into_scalar() < 1e-5);
    }

    #[test]
    fn test_sample_and_mode_are_valid_indices() {
        let device = NdArrayDevice::default();
        let logits = Tensor::<NdArray, 3>::from_floats([[[0.0, 5.0, 0.0]]], &device);
        let dist = Categorical::from_logits(logits);
        assert_eq!(dist.mode().into_data().to_vec::<f32>().unwrap(), vec![1.0]);
        for _ in 0..20 {
            let a = dist.sample().into_data().to_vec::<f32>().unwrap()[0];
            assert!(a == 0.0 || a == 1.0 || a == 2.0);
        }
    }

    #[test]
    fn test_kl_and_entropy() {
        let device = NdArrayDevice::default();
        let uniform = Categorical::from_logits(Tensor::<NdArray, 3>::zeros([1, 1, 4], &device));
        let entropy = uniform.entropy().into_data().to_vec::<f32>().unwrap()[0];
        assert!((entropy - 4f32.ln()).abs() < 1e-5);
        let self_kl = uniform.kl(&uniform).into_data().to_vec::<f32>().unwrap()[0];
        assert!(self_kl.abs() < 1e-6);
        let peaked =
            Categorical::from_logits(Tensor::<NdArray, 3>::from_floats([[[3.0, 0.0, 0.0, 0.0]]], &device));
        assert!(uniform.kl(&peaked).into_data().to_vec::<f32>().unwrap()[0] > 0.0);
    }
}
