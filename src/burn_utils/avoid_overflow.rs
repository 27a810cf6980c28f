use burn::{prelude::Backend, tensor::Tensor};
use ndarray::Array2;

/// Mean of `tensor` over the entries where `mask` is 1.
///
/// # Arguments
/// * `tensor` - Input tensor `(batch, time)`
/// * `mask` - 0/1 float mask with the same shape
pub fn mean_with_mask<B: Backend>(tensor: Tensor<B, 2>, mask: Tensor<B, 2>) -> Tensor<B, 1> {
    let count = mask.clone().sum().clamp_min(1.0);
    return tensor.mul(mask).sum().div(count);
}

/// Standardizes the masked entries of `arr`; masked-out entries become 0.
pub fn normalize_with_mask(arr: &Array2<f32>, mask: &Array2<f32>) -> Array2<f32> {
    let n = mask.sum().max(1.0);
    let mean = (arr * mask).sum() / n;
    let var = (arr.mapv(|x| (x - mean) * (x - mean)) * mask).sum() / n;
    let std = var.sqrt();
    return arr.mapv(|x| (x - mean) / (std + 1e-8)) * mask;
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::TensorData;
    use ndarray::array;

    #[test]
    fn test_mean_with_mask() {
        let device = NdArrayDevice::Cpu;
        let x = Tensor::<NdArray, 2>::from_data(TensorData::from([[1.0, 3.0, 100.0]]), &device);
        let mask = Tensor::<NdArray, 2>::from_data(TensorData::from([[1.0, 1.0, 0.0]]), &device);
        let mean = mean_with_mask(x, mask).into_scalar();
        assert!((mean - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_with_mask() {
        let arr = array![[1.0f32, 3.0, 50.0]];
        let mask = array![[1.0f32, 1.0, 0.0]];
        let out = normalize_with_mask(&arr, &mask);
        assert!((out[[0, 0]] + 1.0).abs() < 1e-5);
        assert!((out[[0, 1]] - 1.0).abs() < 1e-5);
        assert_eq!(out[[0, 2]], 0.0);
    }
}
