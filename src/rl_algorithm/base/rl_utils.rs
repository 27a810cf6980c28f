use burn::tensor::backend::Backend;
use burn::tensor::{Element, Tensor, TensorData};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use num_traits::{ToPrimitive, Zero};

pub fn ndarray2tensor2<B: Backend, T: Element + Zero + ToPrimitive>(
    arr: Array2<T>,
    device: &B::Device,
) -> Tensor<B, 2> {
    let shape = arr.shape().to_vec();
    let vec = arr.as_standard_layout().iter().cloned().collect::<Vec<T>>();
    let tensor_data = TensorData::new(vec, shape);
    return Tensor::<B, 2>::from_data(tensor_data, device);
}

pub fn ndarray2tensor3<B: Backend, T: Element + Zero + ToPrimitive>(
    arr: Array3<T>,
    device: &B::Device,
) -> Tensor<B, 3> {
    let shape = arr.shape().to_vec();
    let vec = arr.as_standard_layout().iter().cloned().collect::<Vec<T>>();
    let tensor_data = TensorData::new(vec, shape);
    return Tensor::<B, 3>::from_data(tensor_data, device);
}

pub fn tensor2ndarray2<B: Backend>(tensor: &Tensor<B, 2>) -> Array2<f32> {
    let vec = tensor.to_data().convert::<f32>().to_vec::<f32>().unwrap();
    let shape: [usize; 2] = tensor.shape().dims();
    return Array2::from_shape_vec(shape, vec).unwrap();
}

pub fn tensor2vec1<B: Backend>(tensor: &Tensor<B, 1>) -> Vec<f32> {
    return tensor.to_data().convert::<f32>().to_vec::<f32>().unwrap();
}

pub fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    return tensor2vec1(&tensor)[0];
}

/// Prints `s` inside a banner on stdout.
pub fn header(s: &str) {
    let width = s.lines().map(|l| l.len()).max().unwrap_or(0).clamp(20, 100);
    let bar = "=".repeat(width);
    println!("{}", bar);
    println!("{}", s);
    println!("{}", bar);
}

pub struct GaeOutput {
    pub advantages: Array2<f32>,
    pub returns: Array2<f32>,
}

/// Generalized advantage estimation over padded trajectories.
///
/// `rewards` and `values` are `(n_traj, max_len)`; entries at or past
/// `traj_length[i]` are ignored and come back as zero. Every trajectory is
/// treated as ending in a terminal state.
pub fn compute_gae(
    rewards: ArrayView2<f32>,
    values: ArrayView2<f32>,
    traj_length: &[usize],
    discount: f32,
    gae_lambda: f32,
) -> GaeOutput {
    let mut advantages = Array2::<f32>::zeros(rewards.raw_dim());
    let mut returns = Array2::<f32>::zeros(rewards.raw_dim());
    for (i, &len) in traj_length.iter().enumerate() {
        let mut running_return = 0f32;
        let mut running_advantage = 0f32;
        for t in (0..len).rev() {
            let next_value = if t + 1 < len { values[[i, t + 1]] } else { 0.0 };
            let delta = rewards[[i, t]] + discount * next_value - values[[i, t]];
            running_advantage = delta + discount * gae_lambda * running_advantage;
            running_return = rewards[[i, t]] + discount * running_return;
            advantages[[i, t]] = running_advantage;
            returns[[i, t]] = running_return;
        }
    }
    return GaeOutput {
        advantages,
        returns,
    };
}

/// 1 - Var[y - pred] / Var[y] over the masked entries.
pub fn explained_variance(pred: ArrayView2<f32>, target: ArrayView2<f32>, mask: ArrayView2<f32>) -> f32 {
    let n = mask.sum();
    if n < 2.0 {
        return 0.0;
    }
    let mean_of = |a: &Array2<f32>| (a * &mask).sum() / n;
    let var_of = |a: &Array2<f32>| {
        let m = mean_of(a);
        (a.mapv(|x| (x - m) * (x - m)) * &mask).sum() / n
    };
    let target = target.to_owned();
    let diff = &target - &pred;
    let var_y = var_of(&target);
    if var_y <= 1e-8 {
        return 0.0;
    }
    return 1.0 - var_of(&diff) / var_y;
}

/// Running mean and variance of feature vectors, merged batch by batch.
#[derive(Debug, Clone)]
pub struct RunningMeanStd {
    mean: Array1<f64>,
    var: Array1<f64>,
    count: f64,
}

impl RunningMeanStd {
    pub fn new(dim: usize) -> Self {
        return Self {
            mean: Array1::zeros(dim),
            var: Array1::ones(dim),
            count: 0.0,
        };
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn std(&self) -> Array1<f64> {
        self.var.mapv(|v| v.max(0.0).sqrt())
    }

    /// `batch` is `(n, dim)`.
    pub fn update(&mut self, batch: ArrayView2<f64>) {
        let n = batch.nrows() as f64;
        let Some(batch_mean) = batch.mean_axis(Axis(0)) else {
            return;
        };
        let batch_var = batch.var_axis(Axis(0), 0.0);
        if self.count == 0.0 {
            self.mean = batch_mean;
            self.var = batch_var;
            self.count = n;
            return;
        }
        let total = self.count + n;
        let delta = &batch_mean - &self.mean;
        let new_mean = &self.mean + &(&delta * (n / total));
        let m2 = &self.var * self.count
            + &batch_var * n
            + &delta.mapv(|d| d * d) * (self.count * n / total);
        self.mean = new_mean;
        self.var = m2 / total;
        self.count = total;
    }

    pub fn normalize(&self, batch: ArrayView2<f64>) -> Array2<f64> {
        let std = self.std().mapv(|s| s + 1e-8);
        return (&batch - &self.mean) / &std;
    }
}
