//! Bounded worker pool built on channel-of-channels dispatch.
//!
//! # Architecture
//!
//! Each worker is a dedicated OS thread wrapping one user-supplied
//! [`Worker`] capability. There is no central queue and no scheduler lock:
//! an idle worker announces itself by publishing an [`Offer`] — a claim
//! ticket carrying its private request channel — on a channel shared by the
//! whole pool, and whichever submitter claims the ticket hands over exactly
//! one request.
//!
//! ```text
//!  submitter ──claim──> [ shared offer channel ] <──publish── worker 0
//!      │                                          <──publish── worker 1
//!      └──request──> (claimed worker's private channel)
//!      <──result──── (request's own reply channel)
//! ```
//!
//! Results come back on a per-request rendezvous reply channel, so delivery
//! and cancellation can never race for the same unit: a request is either
//! handed to the waiting submitter or discarded after an interrupt, never
//! both, never twice, and never to the wrong caller.
//!
//! Workers serve strictly one request at a time. Shutdown is graceful by
//! construction: close is only observed between requests, so in-flight work
//! always finishes before a worker exits and terminates its capability.
//!
//! # Example
//!
//! ```
//! use brigade::Pool;
//!
//! let pool = Pool::from_fn(4, |n: i64| n * 2);
//! assert_eq!(pool.process(21), Ok(42));
//! pool.close();
//! ```
//!
//! Logging is feature-gated: build with `--features tracing` and call
//! [`init_tracing`] to see lifecycle events, tagged with the worker thread
//! names.

pub mod pool;
mod trace;
pub mod work;
pub mod worker;
pub mod worker_thread;

pub use pool::{Pool, PoolError};
pub use trace::init_tracing;
pub use work::{Offer, OfferReceiver, OfferSender, WorkRequest, dispatch_channel, reply_channel};
pub use worker::{FnWorker, Worker};
pub use worker_thread::{Interrupter, WorkerThread};
