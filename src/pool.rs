//! The dispatch side: a pool of workers behind one shared offer channel.
//!
//! The pool owns no queue and no scheduler. Submission claims whichever
//! offer surfaces first on the dispatch channel, writes exactly one request
//! into it, and — for returning requests — waits on that request's reply
//! channel, optionally racing a deadline. On expiry the offer's interrupt
//! hook cancels that specific request; the pool never needs to know which
//! worker it reached.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, SendError, SendTimeoutError};
use thiserror::Error;

use crate::trace::debug;
use crate::work::{self, OfferReceiver, OfferSender, WorkRequest};
use crate::worker::{FnWorker, Worker};
use crate::worker_thread::WorkerThread;

/// Failure to hand work to the pool or collect its result.
///
/// Execution failures are not represented here: results and any errors
/// inside them belong to the capability's output type, which the pool never
/// inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The deadline expired before a worker accepted the request or
    /// delivered its result. An in-flight request has been interrupted.
    #[error("submission timed out")]
    Timeout,
    /// The pool was closed before the request could be handed to a worker.
    #[error("worker pool is closed")]
    Closed,
    /// The request was accepted but its result was never delivered: the
    /// worker was interrupted or went away mid-flight.
    #[error("result delivery was abandoned")]
    Dropped,
}

struct Inner<C: Worker> {
    /// `None` once the pool has been closed.
    offers_tx: Option<OfferSender<C>>,
    workers: Vec<WorkerThread<C>>,
    factory: Box<dyn FnMut(usize) -> C + Send>,
    next_id: usize,
}

/// A bounded pool of long-lived workers.
///
/// Workers are spawned up front and live until [`close`](Pool::close) (or
/// until the pool is dropped, which signals shutdown without waiting).
/// Submission methods take `&self` and may be called from any number of
/// threads.
///
/// # Example
///
/// ```
/// use brigade::Pool;
///
/// let pool = Pool::from_fn(2, |n: i64| n * 2);
/// assert_eq!(pool.process(21), Ok(42));
/// pool.close();
/// ```
pub struct Pool<C: Worker> {
    offers_rx: OfferReceiver<C>,
    inner: Mutex<Inner<C>>,
}

impl<C: Worker> Pool<C> {
    /// Spawns `count` workers, each with a fresh capability from `factory`.
    ///
    /// The factory receives a worker id that is unique for the lifetime of
    /// the pool, including across [`set_worker_count`](Pool::set_worker_count)
    /// growth.
    pub fn new(count: usize, factory: impl FnMut(usize) -> C + Send + 'static) -> Self {
        let (offers_tx, offers_rx) = work::dispatch_channel(count);
        let pool = Self {
            offers_rx,
            inner: Mutex::new(Inner {
                offers_tx: Some(offers_tx),
                workers: Vec::new(),
                factory: Box::new(factory),
                next_id: 0,
            }),
        };
        pool.set_worker_count(count);
        pool
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.lock().workers.len()
    }

    /// Grows or shrinks the pool to `count` workers.
    ///
    /// Shrinking stops the excess workers and waits for them; any request
    /// they are executing finishes naturally first. Growing on a closed
    /// pool is a no-op. A pool resized to zero accepts submissions but
    /// never serves them — only the timed submission methods return.
    pub fn set_worker_count(&self, count: usize) {
        let mut inner = self.lock();
        debug!(count, "resizing worker pool");

        while inner.workers.len() < count {
            let Some(offers_tx) = inner.offers_tx.clone() else {
                return;
            };
            let id = inner.next_id;
            inner.next_id += 1;
            let capability = (inner.factory)(id);
            inner
                .workers
                .push(WorkerThread::spawn(offers_tx, capability, id));
        }

        if inner.workers.len() > count {
            let mut excess: Vec<_> = inner.workers.drain(count..).collect();
            for worker in &mut excess {
                worker.stop();
            }
            for worker in &mut excess {
                worker.join();
            }
        }
    }

    /// Executes `payload` on the first available worker and returns its
    /// result.
    ///
    /// Blocks until a worker is free and has finished the request.
    ///
    /// # Errors
    ///
    /// [`PoolError::Closed`] if the pool shuts down first;
    /// [`PoolError::Dropped`] if the worker was interrupted (or died)
    /// before delivering.
    pub fn process(&self, payload: C::Payload) -> Result<C::Output, PoolError> {
        let (reply_tx, reply_rx) = work::reply_channel();
        let mut request = WorkRequest::Returning {
            payload,
            reply: reply_tx,
        };
        loop {
            let offer = self.offers_rx.recv().map_err(|_| PoolError::Closed)?;
            match offer.requests.send(request) {
                Ok(()) => return reply_rx.recv().map_err(|_| PoolError::Dropped),
                // A stale offer from a worker that already shut down; the
                // request comes back intact, claim the next offer.
                Err(SendError(returned)) => request = returned,
            }
        }
    }

    /// Like [`process`](Pool::process), but gives up after `timeout`.
    ///
    /// The deadline covers the whole submission: claiming a worker, handing
    /// the request over, and collecting the result. If it expires while the
    /// request is in flight, that request is interrupted through the hook
    /// embedded in its offer and the result, if any, is discarded.
    ///
    /// # Errors
    ///
    /// [`PoolError::Timeout`] on expiry, otherwise as
    /// [`process`](Pool::process).
    pub fn process_timeout(
        &self,
        payload: C::Payload,
        timeout: Duration,
    ) -> Result<C::Output, PoolError> {
        let deadline = Instant::now() + timeout;
        let (reply_tx, reply_rx) = work::reply_channel();
        let mut request = WorkRequest::Returning {
            payload,
            reply: reply_tx,
        };
        let offer = loop {
            let offer = self.offers_rx.recv_deadline(deadline).map_err(|e| match e {
                RecvTimeoutError::Timeout => PoolError::Timeout,
                RecvTimeoutError::Disconnected => PoolError::Closed,
            })?;
            match offer.requests.send_deadline(request, deadline) {
                Ok(()) => break offer,
                Err(SendTimeoutError::Timeout(_)) => return Err(PoolError::Timeout),
                // Dead worker's offer; claim another.
                Err(SendTimeoutError::Disconnected(returned)) => request = returned,
            }
        };

        match reply_rx.recv_deadline(deadline) {
            Ok(output) => Ok(output),
            Err(RecvTimeoutError::Timeout) => {
                offer.interrupter.interrupt();
                Err(PoolError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(PoolError::Dropped),
        }
    }

    /// Executes `payload` on the first available worker, fire-and-forget.
    ///
    /// Blocks only until a worker has accepted the request; execution
    /// outcome is not reported.
    ///
    /// # Errors
    ///
    /// [`PoolError::Closed`] if the pool shuts down first.
    pub fn run(&self, payload: C::Payload) -> Result<(), PoolError> {
        let mut request = WorkRequest::Detached(payload);
        loop {
            let offer = self.offers_rx.recv().map_err(|_| PoolError::Closed)?;
            match offer.requests.send(request) {
                Ok(()) => return Ok(()),
                Err(SendError(returned)) => request = returned,
            }
        }
    }

    /// Like [`run`](Pool::run), but gives up after `timeout`.
    ///
    /// The deadline covers the handoff only. Once a worker has accepted the
    /// request there is nothing left to cancel: fire-and-forget execution
    /// reports to no one.
    ///
    /// # Errors
    ///
    /// [`PoolError::Timeout`] on expiry, otherwise as [`run`](Pool::run).
    pub fn run_timeout(&self, payload: C::Payload, timeout: Duration) -> Result<(), PoolError> {
        let deadline = Instant::now() + timeout;
        let mut request = WorkRequest::Detached(payload);
        loop {
            let offer = self.offers_rx.recv_deadline(deadline).map_err(|e| match e {
                RecvTimeoutError::Timeout => PoolError::Timeout,
                RecvTimeoutError::Disconnected => PoolError::Closed,
            })?;
            match offer.requests.send_deadline(request, deadline) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(_)) => return Err(PoolError::Timeout),
                Err(SendTimeoutError::Disconnected(returned)) => request = returned,
            }
        }
    }

    /// Shuts the pool down: stops every worker, then waits for each to
    /// finish its in-flight request and terminate its capability.
    ///
    /// Submissions blocked on an idle worker fail with
    /// [`PoolError::Closed`]. Idempotent.
    pub fn close(&self) {
        let mut inner = self.lock();
        debug!("closing worker pool");

        // Dropping the send side unblocks submitters waiting for an offer
        // once the workers below have exited.
        inner.offers_tx = None;

        for worker in &mut inner.workers {
            worker.stop();
        }
        for worker in &mut inner.workers {
            worker.join();
        }
        inner.workers.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<C>> {
        self.inner.lock().expect("pool state lock poisoned")
    }
}

impl<P, R> Pool<FnWorker<P, R>>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Pool whose workers all execute the same function.
    pub fn from_fn(count: usize, f: impl Fn(P) -> R + Send + Sync + 'static) -> Self {
        let worker = FnWorker::new(f);
        Self::new(count, move |_| worker.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processes_and_doubles() {
        let pool = Pool::from_fn(1, |n: i64| n * 2);
        assert_eq!(pool.process(21), Ok(42));
        pool.close();
    }

    #[test]
    fn worker_count_tracks_resize() {
        let pool = Pool::from_fn(2, |n: u8| n);
        assert_eq!(pool.worker_count(), 2);

        pool.set_worker_count(5);
        assert_eq!(pool.worker_count(), 5);

        pool.set_worker_count(1);
        assert_eq!(pool.worker_count(), 1);
        assert_eq!(pool.process(9), Ok(9));

        pool.close();
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn close_fails_pending_and_future_submissions() {
        let pool = Pool::from_fn(1, |n: u32| n);
        pool.close();
        assert_eq!(pool.process(1), Err(PoolError::Closed));
        assert_eq!(pool.run(2), Err(PoolError::Closed));
    }
}
