#[derive(Debug, Clone)]
pub struct TrpoConfig {
    /// Bound on the mean KL between the old and the updated distribution.
    pub max_kl: f32,
    pub cg_damping: f32,
    pub cg_iters: usize,
    pub cg_residual_tol: f32,
    pub backtrack_ratio: f32,
    pub max_backtracks: usize,
}

impl TrpoConfig {
    pub fn new(max_kl: f32) -> Self {
        Self {
            max_kl,
            ..Default::default()
        }
    }

    pub fn with_cg_damping(mut self, cg_damping: f32) -> Self {
        self.cg_damping = cg_damping;
        self
    }
}

impl Default for TrpoConfig {
    fn default() -> Self {
        Self {
            max_kl: 0.01,
            cg_damping: 0.1,
            cg_iters: 10,
            cg_residual_tol: 1e-10,
            backtrack_ratio: 0.5,
            max_backtracks: 10,
        }
    }
}
