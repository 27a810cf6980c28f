use burn::module::{Module, ModuleMapper, ModuleVisitor, ParamId};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::Array1;

struct ParamCollector {
    values: Vec<f32>,
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.values.extend(tensor.to_data().iter::<f32>());
    }
}

struct GradCollector<'a, B: AutodiffBackend> {
    grads: &'a B::Gradients,
    values: Vec<f32>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradCollector<'_, B> {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        match tensor.grad(self.grads) {
            Some(grad) => self.values.extend(grad.to_data().iter::<f32>()),
            None => self
                .values
                .extend(std::iter::repeat(0.0).take(tensor.shape().num_elements())),
        }
    }
}

struct ParamSetter<'a> {
    values: &'a [f32],
    offset: usize,
}

impl<B: Backend> ModuleMapper<B> for ParamSetter<'_> {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let shape = tensor.shape();
        let n = shape.num_elements();
        let chunk = self.values[self.offset..self.offset + n].to_vec();
        self.offset += n;
        Tensor::<B, D>::from_data(TensorData::new(chunk, shape), &tensor.device()).require_grad()
    }
}

/// Concatenates every float parameter of `module`, in visiting order.
pub fn flat_params<B: Backend, M: Module<B>>(module: &M) -> Array1<f32> {
    let mut collector = ParamCollector { values: vec![] };
    module.visit(&mut collector);
    return Array1::from_vec(collector.values);
}

/// Gradient of every float parameter, laid out like [`flat_params`].
/// Parameters outside the graph contribute zeros.
pub fn flat_grads<B: AutodiffBackend, M: Module<B>>(
    module: &M,
    grads: &B::Gradients,
) -> Array1<f32> {
    let mut collector = GradCollector::<B> {
        grads,
        values: vec![],
    };
    module.visit(&mut collector);
    return Array1::from_vec(collector.values);
}

/// Rebuilds `module` with parameters taken from `params`.
///
/// # Panics
/// If `params.len()` differs from `module.num_params()`.
pub fn set_flat_params<B: Backend, M: Module<B>>(module: M, params: &Array1<f32>) -> M {
    assert_eq!(
        params.len(),
        module.num_params(),
        "flat parameter vector does not match the module"
    );
    let values = params.to_vec();
    let mut setter = ParamSetter {
        values: &values,
        offset: 0,
    };
    return module.map(&mut setter);
}
