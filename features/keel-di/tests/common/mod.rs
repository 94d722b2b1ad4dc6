use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Prints engine logs when a test is run with `RUST_LOG=keel_di=debug`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Counts constructor calls
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);
impl Calls {
    /// Registers a call, returns the number of calls before this one
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
