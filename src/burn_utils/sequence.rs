use burn::{
    nn::{Linear, LinearConfig, Relu, Tanh},
    prelude::*,
};

use crate::rl_algorithm::base::hidden_spec::{HiddenSpec, LayerSpec, Nonlinearity};

#[derive(Module, Debug)]
pub enum BurnForwarder<B: Backend> {
    Linear(Linear<B>),
    Relu(Relu),
    Tanh(Tanh),
}

#[derive(Module, Debug)]
pub struct Sequence<B: Backend> {
    forwarder_vec: Vec<BurnForwarder<B>>,
}

impl<B: Backend> Sequence<B> {
    pub fn empty() -> Self {
        Self {
            forwarder_vec: vec![],
        }
    }

    pub fn push(&mut self, forwarder: BurnForwarder<B>) {
        self.forwarder_vec.push(forwarder);
    }

    pub fn len(&self) -> usize {
        self.forwarder_vec.len()
    }

    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let mut out = input;
        for forwarder in &self.forwarder_vec {
            out = match forwarder {
                BurnForwarder::Linear(linear) => linear.forward(out),
                BurnForwarder::Relu(relu) => relu.forward(out),
                BurnForwarder::Tanh(tanh) => tanh.forward(out),
            }
        }
        return out;
    }
}

/// Builds the feed-forward part of a hidden spec. Returns the stack and its
/// output width. `gru` entries are not feed-forward and must be split off
/// by the caller first.
pub fn build_mlp_by_spec<B: Backend>(
    input_size: usize,
    spec: &HiddenSpec,
    device: &B::Device,
) -> (Sequence<B>, usize) {
    let mut seq = Sequence::empty();
    let mut in_size = input_size;
    for layer in spec.layers() {
        match layer {
            LayerSpec::Fc { n } => {
                seq.push(BurnForwarder::Linear(
                    LinearConfig::new(in_size, *n).init(device),
                ));
                in_size = *n;
            }
            LayerSpec::Nonlin { func } => seq.push(match func {
                Nonlinearity::Tanh => BurnForwarder::Tanh(Tanh::new()),
                Nonlinearity::Relu => BurnForwarder::Relu(Relu::new()),
            }),
            LayerSpec::Gru { .. } => panic!("gru layer inside a feed-forward stack"),
        }
    }
    return (seq, in_size);
}
