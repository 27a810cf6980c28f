use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, tanh};

/// GRU stepped explicitly over time: the hidden state left by step `t`
/// is the one step `t + 1` starts from.
#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    input_gates: Linear<B>,  // d_input -> 3 * hidden: reset, update, candidate
    hidden_gates: Linear<B>, // hidden -> 3 * hidden
    hidden_size: usize,
}

impl<B: Backend> GruCell<B> {
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// `input` is `(batch, d_input)`, `hidden` is `(batch, hidden_size)`.
    pub fn step(&self, input: Tensor<B, 2>, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch_size, _] = input.dims();
        let h = self.hidden_size;
        let gi = self.input_gates.forward(input);
        let gh = self.hidden_gates.forward(hidden.clone());
        let gate = |x: &Tensor<B, 2>, k: usize| x.clone().slice([0..batch_size, k * h..(k + 1) * h]);

        let reset = sigmoid(gate(&gi, 0) + gate(&gh, 0));
        let update = sigmoid(gate(&gi, 1) + gate(&gh, 1));
        let candidate = tanh(gate(&gi, 2) + reset * gate(&gh, 2));
        return update.clone().neg().add_scalar(1.0) * candidate + update * hidden;
    }

    /// `(batch, time, d_input)` to `(batch, time, hidden_size)`, starting
    /// from `state` or from zeros.
    pub fn forward(&self, input: Tensor<B, 3>, state: Option<Tensor<B, 2>>) -> Tensor<B, 3> {
        let [batch_size, seq_len, d_input] = input.dims();
        let mut hidden = state
            .unwrap_or_else(|| Tensor::zeros([batch_size, self.hidden_size], &input.device()));
        let mut outputs = Vec::with_capacity(seq_len);
        for t in 0..seq_len {
            let x_t = input
                .clone()
                .slice([0..batch_size, t..t + 1, 0..d_input])
                .reshape([batch_size, d_input]);
            hidden = self.step(x_t, hidden);
            outputs.push(hidden.clone().unsqueeze_dim::<3>(1));
        }
        return Tensor::cat(outputs, 1);
    }
}

#[derive(Config, Debug)]
pub struct GruCellConfig {
    pub d_input: usize,
    pub hidden_size: usize,
}

impl GruCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GruCell<B> {
        GruCell {
            input_gates: LinearConfig::new(self.d_input, 3 * self.hidden_size).init(device),
            hidden_gates: LinearConfig::new(self.hidden_size, 3 * self.hidden_size).init(device),
            hidden_size: self.hidden_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_hidden_state_carries_over_steps() {
        let device = NdArrayDevice::Cpu;
        let cell = GruCellConfig::new(2, 4).init::<NdArray>(&device);
        let input = Tensor::<NdArray, 3>::ones([1, 3, 2], &device);
        let out = cell.forward(input.clone(), None);
        assert_eq!(out.dims(), [1, 3, 4]);

        // same input at every step, so only the carried state can change the output
        let first = out.clone().slice([0..1, 0..1, 0..4]);
        let second = out.clone().slice([0..1, 1..2, 0..4]);
        let diff = (first - second.clone()).abs().max().into_scalar();
        assert!(diff > 1e-6);

        let h1 = cell.step(Tensor::ones([1, 2], &device), Tensor::zeros([1, 4], &device));
        let h2 = cell.step(Tensor::ones([1, 2], &device), h1);
        let diff = (h2.unsqueeze_dim::<3>(1) - second).abs().max().into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_initial_state_is_used() {
        let device = NdArrayDevice::Cpu;
        let cell = GruCellConfig::new(2, 3).init::<NdArray>(&device);
        let input = Tensor::<NdArray, 3>::zeros([2, 1, 2], &device);
        let from_zero = cell.forward(input.clone(), None);
        let from_ones = cell.forward(input, Some(Tensor::ones([2, 3], &device)));
        let diff = (from_zero - from_ones).abs().max().into_scalar();
        assert!(diff > 1e-6);
    }
}
