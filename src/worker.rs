//! The capability executed by pool workers.

use std::sync::Arc;

/// User-supplied behavior run by a worker thread.
///
/// One instance is owned per worker and lives for that worker's whole
/// lifetime. Execution methods are only ever invoked from the owning worker
/// thread, one payload at a time; [`interrupt`](Worker::interrupt) is the
/// exception and may be called from any thread, concurrently with an
/// in-flight [`process`](Worker::process) — which is why every method takes
/// `&self` and implementations keep mutable state behind atomics or locks.
pub trait Worker: Send + Sync + 'static {
    /// Payload accepted by this capability.
    type Payload: Send + 'static;
    /// Result produced for returning requests.
    type Output: Send + 'static;

    /// Blocks until the worker is able to accept a payload.
    ///
    /// Called before each request is accepted. May block indefinitely; this
    /// wait is not interruptible and is not raced against shutdown —
    /// readiness is the capability's own concern, not a cancellable wait
    /// for work.
    fn ready(&self) {}

    /// Executes a payload with no result path.
    ///
    /// Failures are invisible to any caller. The default discards the
    /// output of [`process`](Worker::process).
    fn run(&self, payload: Self::Payload) {
        let _ = self.process(payload);
    }

    /// Executes a payload and produces a result.
    fn process(&self, payload: Self::Payload) -> Self::Output;

    /// Best-effort cancellation of in-flight execution.
    ///
    /// May be ignored; the dispatch protocol only guarantees that the
    /// worker stops waiting to accept or deliver, never that execution
    /// itself halts.
    fn interrupt(&self) {}

    /// Final cleanup. Invoked exactly once, when the owning worker thread
    /// exits.
    fn terminate(&self) {}
}

/// Capability backed by a plain function: payload in, result out.
///
/// Cloning is cheap and shares the function, so one closure can back every
/// worker of a pool.
pub struct FnWorker<P, R> {
    f: Arc<dyn Fn(P) -> R + Send + Sync>,
}

impl<P, R> FnWorker<P, R> {
    pub fn new(f: impl Fn(P) -> R + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<P, R> Clone for FnWorker<P, R> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<P, R> Worker for FnWorker<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    type Payload = P;
    type Output = R;

    fn process(&self, payload: P) -> R {
        (self.f)(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fn_worker_processes() {
        let w = FnWorker::new(|n: u32| n + 1);
        assert_eq!(w.process(41), 42);
    }

    #[test]
    fn default_run_discards_output() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let w = FnWorker::new(move |n: u32| {
            seen.fetch_add(1, Ordering::SeqCst);
            n
        });

        w.run(7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lifecycle_defaults_are_noops() {
        let w = FnWorker::new(|n: u8| n);
        w.ready();
        w.interrupt();
        w.terminate();
    }
}
