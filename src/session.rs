use std::{
    cell::Cell,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::SystemTime,
};

use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use log::info;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Computation context for one training run. Every trainable module of the
/// run is initialized on [`Session::device`]; the session is released when
/// the handle is dropped, whichever way the scope is left.
pub struct Session<B: AutodiffBackend> {
    id: usize,
    device: B::Device,
    n_params: Cell<usize>,
    started: SystemTime,
    live: Arc<AtomicBool>,
}

impl<B: AutodiffBackend> Session<B> {
    fn acquire(device: B::Device) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        info!("session {} acquired on {:?}", id, device);
        Self {
            id,
            device,
            n_params: Cell::new(0),
            started: SystemTime::now(),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Runs `f` inside a fresh session and releases it afterwards.
    pub fn scoped<R>(device: B::Device, f: impl FnOnce(&Session<B>) -> R) -> R {
        let session = Self::acquire(device);
        f(&session)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Records a module initialized in this session.
    pub fn register<M: Module<B>>(&self, name: &str, module: &M) {
        self.register_params(name, module.num_params());
    }

    pub fn register_params(&self, name: &str, n: usize) {
        info!("session {}: {} has {} parameters", self.id, name, n);
        self.n_params.set(self.n_params.get() + n);
    }

    pub fn num_params(&self) -> usize {
        self.n_params.get()
    }

    /// Cleared when the session is released.
    #[cfg(test)]
    fn liveness(&self) -> Arc<AtomicBool> {
        self.live.clone()
    }
}

impl<B: AutodiffBackend> Drop for Session<B> {
    fn drop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        info!(
            "session {} released after {:.1}s ({} parameters)",
            self.id,
            self.started.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.0),
            self.n_params.get()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::backend::Autodiff;
    use burn::nn::LinearConfig;
    use std::sync::Mutex;

    type AB = Autodiff<NdArray>;

    #[test]
    fn test_released_after_scope() {
        let live = Session::<AB>::scoped(NdArrayDevice::Cpu, |session| {
            let live = session.liveness();
            assert!(live.load(Ordering::SeqCst));
            let linear = LinearConfig::new(3, 2).init::<AB>(session.device());
            session.register("linear", &linear);
            assert_eq!(session.num_params(), 8);
            live
        });
        assert!(!live.load(Ordering::SeqCst));
    }

    #[test]
    fn test_released_on_unwind() {
        let seen: Arc<Mutex<Option<Arc<AtomicBool>>>> = Arc::new(Mutex::new(None));
        let seen_in = seen.clone();
        let result = std::panic::catch_unwind(move || {
            Session::<AB>::scoped(NdArrayDevice::Cpu, |session| {
                if let Ok(mut slot) = seen_in.lock() {
                    *slot = Some(session.liveness());
                }
                panic!("training failed");
            })
        });
        assert!(result.is_err());
        let live = seen.lock().unwrap().take().unwrap();
        assert!(!live.load(Ordering::SeqCst));
    }

    #[test]
    fn test_sessions_are_independent() {
        Session::<AB>::scoped(NdArrayDevice::Cpu, |outer| {
            let inner_live = Session::<AB>::scoped(NdArrayDevice::Cpu, |inner| {
                assert_ne!(inner.id(), outer.id());
                inner.liveness()
            });
            assert!(!inner_live.load(Ordering::SeqCst));
            assert!(outer.liveness().load(Ordering::SeqCst));
        });
    }
}
