use burn::{prelude::Backend, tensor::Tensor};
use ndarray::{s, Array2, Array3};

use super::rl_utils::{self, RunningMeanStd};
use crate::rl_env::env_sampler::Trajectory;

fn generate_mask(traj_length: &[usize], max_traj_len: usize) -> Array2<f32> {
    let batch_size = traj_length.len();
    let mut mask_arr = Array2::<f32>::zeros([batch_size, max_traj_len]);
    for i in 0..batch_size {
        for j in 0..traj_length[i].min(max_traj_len) {
            mask_arr[[i, j]] = 1.0;
        }
    }
    return mask_arr;
}

/// A sampled batch laid out as zero-padded `(n_traj, max_len, ·)` arrays,
/// kept both host-side and as tensors on the training device.
pub struct Memory<B: Backend> {
    obs: Tensor<B, 3>,      // (batch_size, max_traj_len, obs_dim)
    action: Tensor<B, 3>,   // (batch_size, max_traj_len, action_dim)
    seq_mask: Tensor<B, 2>, // (batch_size, max_traj_len)
    obs_arr: Array3<f32>,
    reward_arr: Array2<f32>,
    mask_arr: Array2<f32>,
    traj_length: Vec<usize>,
    batch_size: usize,
    max_traj_len: usize,
    obs_dim: usize,
    action_dim: usize,
    device: B::Device,
}

impl<B: Backend> Memory<B> {
    /// Observations are passed through `obs_norm` when given; rewards are
    /// taken as sampled.
    pub fn from_trajectories(
        trajs: &[Trajectory],
        obs_norm: Option<&RunningMeanStd>,
        device: &B::Device,
    ) -> Self {
        assert!(!trajs.is_empty(), "cannot build a memory from zero trajectories");
        let batch_size = trajs.len();
        let obs_dim = trajs[0].obs.ncols();
        let action_dim = trajs[0].actions.ncols();
        let traj_length: Vec<usize> = trajs.iter().map(|t| t.len()).collect();
        let max_traj_len = traj_length.iter().copied().max().unwrap_or(1).max(1);

        let mut obs_arr = Array3::<f32>::zeros((batch_size, max_traj_len, obs_dim));
        let mut action_arr = Array3::<f32>::zeros((batch_size, max_traj_len, action_dim));
        let mut reward_arr = Array2::<f32>::zeros((batch_size, max_traj_len));
        for (i, traj) in trajs.iter().enumerate() {
            let len = traj.len();
            if len == 0 {
                continue;
            }
            let obs = match obs_norm {
                Some(norm) => norm.normalize(traj.obs.view()),
                None => traj.obs.clone(),
            };
            obs_arr
                .slice_mut(s![i, 0..len, ..])
                .assign(&obs.mapv(|x| x as f32));
            action_arr
                .slice_mut(s![i, 0..len, ..])
                .assign(&traj.actions.mapv(|x| x as f32));
            reward_arr
                .slice_mut(s![i, 0..len])
                .assign(&traj.rewards.mapv(|x| x as f32));
        }
        let mask_arr = generate_mask(&traj_length, max_traj_len);

        Self {
            obs: rl_utils::ndarray2tensor3(obs_arr.clone(), device),
            action: rl_utils::ndarray2tensor3(action_arr, device),
            seq_mask: rl_utils::ndarray2tensor2(mask_arr.clone(), device),
            obs_arr,
            reward_arr,
            mask_arr,
            traj_length,
            batch_size,
            max_traj_len,
            obs_dim,
            action_dim,
            device: device.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.batch_size
    }
    pub fn max_traj_len(&self) -> usize {
        self.max_traj_len
    }
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }
    pub fn action_dim(&self) -> usize {
        self.action_dim
    }
    pub fn num_timesteps(&self) -> usize {
        self.traj_length.iter().sum()
    }
    pub fn obs(&self) -> &Tensor<B, 3> {
        &self.obs
    }
    pub fn action(&self) -> &Tensor<B, 3> {
        &self.action
    }
    pub fn seq_mask(&self) -> &Tensor<B, 2> {
        &self.seq_mask
    }
    pub fn obs_arr(&self) -> &Array3<f32> {
        &self.obs_arr
    }
    pub fn reward_arr(&self) -> &Array2<f32> {
        &self.reward_arr
    }
    pub fn mask_arr(&self) -> &Array2<f32> {
        &self.mask_arr
    }
    pub fn traj_length(&self) -> &[usize] {
        &self.traj_length
    }
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Step index of every slot, `(batch_size, max_traj_len)`.
    pub fn timesteps(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.batch_size, self.max_traj_len), |(_, t)| t as f32)
    }
}
