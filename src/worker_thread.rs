//! Worker lifecycle: one dedicated thread per capability, running the
//! accept-execute-deliver loop.
//!
//! # Lifecycle
//!
//! Each cycle the thread blocks on the capability's readiness, then moves
//! through at most three waits, each a single `select` with mutually
//! exclusive outcomes:
//!
//! | wait      | outcomes                                      |
//! |-----------|-----------------------------------------------|
//! | offering  | offer claimed by the dispatch side, or close  |
//! | accepting | request arrives, interrupt fires, or close    |
//! | delivering| result handed over, or interrupt fires        |
//!
//! A detached request skips the delivering wait. Close is never checked
//! while a request is executing: in-flight work always finishes naturally,
//! shutdown is only observed between requests. On exit the capability's
//! terminate hook runs exactly once.
//!
//! # Interruption
//!
//! [`Interrupter::interrupt`] queues a single wake token for the worker and
//! forwards a best-effort cancellation to the capability. The token only
//! short-circuits the worker's *current* (or, if idle, next) accept or
//! deliver wait; consuming it re-arms the signal, so one firing can never
//! bleed into later, unrelated waits. Repeated firings between re-arms
//! coalesce into one token.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, select};

use crate::trace::{debug, info, trace};
use crate::work::{Offer, OfferSender, WorkRequest};
use crate::worker::Worker;

/// Interrupt hook reaching one specific worker.
///
/// Travels with every [`Offer`] that worker publishes, so a submitter can
/// cancel the request it made through the offer without holding a
/// [`WorkerThread`] handle.
pub struct Interrupter<C> {
    signal: Sender<()>,
    capability: Arc<C>,
}

impl<C: Worker> Interrupter<C> {
    /// Wakes the worker's pending accept or deliver wait, if any, and
    /// forwards a best-effort cancellation to the capability.
    ///
    /// Only the worker's current wait is affected; execution itself is not
    /// guaranteed to stop.
    pub fn interrupt(&self) {
        // Wake the worker first, then poke the capability. `try_send`
        // coalesces: at most one token is queued between re-arms.
        let _ = self.signal.try_send(());
        self.capability.interrupt();
    }

    /// An interrupter wired to nothing, for exercising offer plumbing.
    #[cfg(test)]
    pub(crate) fn detached(capability: C) -> Self {
        let (signal, _) = bounded(1);
        Self {
            signal,
            capability: Arc::new(capability),
        }
    }
}

impl<C> Clone for Interrupter<C> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            capability: Arc::clone(&self.capability),
        }
    }
}

/// Handle to one running worker.
///
/// Owns the capability instance and the dedicated thread executing it.
/// Dropping the handle signals shutdown but does not wait for the thread to
/// exit; call [`stop`](WorkerThread::stop) and [`join`](WorkerThread::join)
/// for graceful shutdown.
pub struct WorkerThread<C: Worker> {
    interrupter: Interrupter<C>,
    /// Dropping this sender is the close signal.
    close: Option<Sender<()>>,
    /// The thread's exit is the closed acknowledgement.
    thread: Option<JoinHandle<()>>,
}

impl<C: Worker> WorkerThread<C> {
    /// Spawns a worker publishing offers on the given dispatch channel.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn a thread.
    pub fn spawn(offers: OfferSender<C>, capability: C, id: usize) -> Self {
        let capability = Arc::new(capability);
        let (signal_tx, signal_rx) = bounded(1);
        let (close_tx, close_rx) = bounded::<()>(0);
        let (request_tx, request_rx) = bounded(0);

        let interrupter = Interrupter {
            signal: signal_tx,
            capability: Arc::clone(&capability),
        };

        let worker_loop = WorkerLoop {
            capability,
            offers,
            request_tx,
            requests: request_rx,
            interrupt: signal_rx,
            interrupter: interrupter.clone(),
            close: close_rx,
        };

        let thread = thread::Builder::new()
            .name(format!("brigade-worker-{id}"))
            .spawn(move || {
                info!("worker thread started");
                worker_loop.run();
                info!("worker thread exiting");
            })
            .expect("failed to spawn worker thread");

        Self {
            interrupter,
            close: Some(close_tx),
            thread: Some(thread),
        }
    }

    /// Wakes the worker's current accept or deliver wait, if any, and
    /// forwards a best-effort cancellation to the capability.
    pub fn interrupt(&self) {
        self.interrupter.interrupt();
    }

    /// Requests shutdown.
    ///
    /// The worker finishes any in-flight request, then exits instead of
    /// publishing another offer. Safe to call more than once.
    pub fn stop(&mut self) {
        if self.close.take().is_some() {
            debug!("worker stop requested");
        }
    }

    /// Blocks until the worker thread has exited and the capability's
    /// terminate hook has run.
    ///
    /// Does not itself request shutdown: call [`stop`](WorkerThread::stop)
    /// first, or the worker keeps serving and this call keeps waiting.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// State owned by the worker thread itself.
struct WorkerLoop<C: Worker> {
    capability: Arc<C>,
    offers: OfferSender<C>,
    /// Kept alive so `requests` can never disconnect under the loop.
    request_tx: Sender<WorkRequest<C::Payload, C::Output>>,
    requests: Receiver<WorkRequest<C::Payload, C::Output>>,
    interrupt: Receiver<()>,
    /// Parked clone: keeps the interrupt channel connected even after every
    /// outstanding offer and handle has been dropped.
    interrupter: Interrupter<C>,
    close: Receiver<()>,
}

/// Runs the capability's terminate hook when the worker thread unwinds,
/// whether the loop exited cleanly or the capability panicked mid-request.
struct TerminateOnExit<'a, C: Worker> {
    capability: &'a C,
}

impl<C: Worker> Drop for TerminateOnExit<'_, C> {
    fn drop(&mut self) {
        self.capability.terminate();
        debug!("capability terminated");
    }
}

impl<C: Worker> WorkerLoop<C> {
    fn run(&self) {
        let _terminate = TerminateOnExit {
            capability: &*self.capability,
        };

        loop {
            // Readiness gates every offer and is deliberately not raced
            // against close; see the module docs.
            self.capability.ready();

            let offer = Offer {
                requests: self.request_tx.clone(),
                interrupter: self.interrupter.clone(),
            };
            select! {
                send(self.offers, offer) -> res => {
                    if res.is_err() {
                        debug!("dispatch channel closed");
                        break;
                    }
                    if !self.serve() {
                        debug!("close observed while awaiting work");
                        break;
                    }
                }
                recv(self.close) -> _ => {
                    debug!("close observed while offering");
                    break;
                }
            }
        }
    }

    /// One published offer: waits for the request and executes it.
    /// Returns `false` once close fires.
    fn serve(&self) -> bool {
        select! {
            recv(self.requests) -> req => {
                // The loop keeps a sender alive, so the only way to get
                // here is an actual request.
                let Ok(request) = req else { return true };
                match request {
                    WorkRequest::Detached(payload) => self.capability.run(payload),
                    WorkRequest::Returning { payload, reply } => {
                        let output = self.capability.process(payload);
                        self.deliver(output, reply);
                    }
                }
                true
            }
            recv(self.interrupt) -> _ => {
                // Token consumed: the signal is re-armed. A submitter that
                // had already claimed this offer is served next cycle.
                trace!("interrupt consumed while awaiting work");
                true
            }
            recv(self.close) -> _ => false,
        }
    }

    /// Hands the result over, or discards it if interrupted first.
    fn deliver(&self, output: C::Output, reply: Sender<C::Output>) {
        select! {
            send(reply, output) -> res => {
                if res.is_err() {
                    trace!("submitter gone, result dropped");
                }
            }
            recv(self.interrupt) -> _ => {
                trace!("result discarded after interrupt");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::{dispatch_channel, reply_channel};
    use crate::worker::FnWorker;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(5);
    const PATIENCE: Duration = Duration::from_secs(2);

    #[test]
    fn claimed_offer_processes_and_delivers() {
        let (offers_tx, offers_rx) = dispatch_channel(1);
        let mut worker = WorkerThread::spawn(offers_tx, FnWorker::new(|n: i64| n * 2), 0);

        let offer = offers_rx.recv_timeout(PATIENCE).expect("offer");
        let (reply_tx, reply_rx) = reply_channel();
        offer
            .requests
            .send(WorkRequest::Returning {
                payload: 21,
                reply: reply_tx,
            })
            .expect("request");
        assert_eq!(reply_rx.recv_timeout(PATIENCE), Ok(42));

        worker.stop();
        worker.join();
    }

    #[test]
    fn detached_request_executes() {
        let seen = Arc::new(AtomicI64::new(0));
        let sink = Arc::clone(&seen);
        let (offers_tx, offers_rx) = dispatch_channel(1);
        let mut worker = WorkerThread::spawn(
            offers_tx,
            FnWorker::new(move |n: i64| sink.store(n, Ordering::SeqCst)),
            0,
        );

        let offer = offers_rx.recv_timeout(PATIENCE).expect("offer");
        offer
            .requests
            .send(WorkRequest::Detached(7))
            .expect("request");

        let deadline = std::time::Instant::now() + PATIENCE;
        while seen.load(Ordering::SeqCst) != 7 {
            assert!(std::time::Instant::now() < deadline, "request never ran");
            thread::sleep(TICK);
        }

        worker.stop();
        worker.join();
    }

    #[test]
    fn stop_then_join_returns_without_any_work() {
        let (offers_tx, _offers_rx) = dispatch_channel::<FnWorker<u8, u8>>(1);
        let mut worker = WorkerThread::spawn(offers_tx, FnWorker::new(|n: u8| n), 0);

        worker.stop();
        worker.join();
    }
}
