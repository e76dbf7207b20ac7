//! Work units and the offer protocol used to hand them to workers.
//!
//! Dispatch is a channel of channels: an idle worker publishes an [`Offer`]
//! on a shared channel, and a submitter claims it. The offer carries the
//! worker's private request channel plus an [`Interrupter`] closed over that
//! worker, so the submitter can cancel the request it is about to make
//! without ever holding a worker handle.
//!
//! Reply channels are rendezvous (capacity 0): a result is handed over only
//! while the submitter is actually waiting for it, which is what lets
//! delivery race cleanly against interruption — the two can never both
//! happen for the same unit.

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::worker::Worker;
use crate::worker_thread::Interrupter;

/// A single unit of work. Consumed by exactly one worker, exactly once.
pub enum WorkRequest<P, R> {
    /// Fire-and-forget: execute the payload, report nothing to anyone.
    Detached(P),
    /// Execute the payload and deliver the result on `reply`.
    ///
    /// The reply channel is single-use; it receives exactly zero (dropped
    /// after an interrupt) or one value.
    Returning {
        payload: P,
        reply: Sender<R>,
    },
}

/// A claim ticket published by an idle worker.
///
/// Claiming an offer pairs the submitter with that worker for exactly one
/// [`WorkRequest`]. No two submitters can claim the same offer.
pub struct Offer<C: Worker> {
    /// The offering worker's private request channel.
    pub requests: Sender<WorkRequest<C::Payload, C::Output>>,
    /// Interrupt hook reaching the offering worker.
    pub interrupter: Interrupter<C>,
}

/// Sending end of the shared dispatch channel, held by workers.
pub type OfferSender<C> = Sender<Offer<C>>;

/// Claiming end of the shared dispatch channel, held by submitters.
pub type OfferReceiver<C> = Receiver<Offer<C>>;

/// Creates the shared dispatch channel.
///
/// The channel is buffered (at least one slot) so that a worker whose
/// pending request was preempted by an interrupt can re-publish itself
/// without waiting for a second submitter to show up; the preempted
/// submitter's request is then picked up on the worker's next cycle.
#[must_use]
pub fn dispatch_channel<C: Worker>(capacity: usize) -> (OfferSender<C>, OfferReceiver<C>) {
    bounded(capacity.max(1))
}

/// Creates a single-use rendezvous reply channel for a returning request.
#[must_use]
pub fn reply_channel<R>() -> (Sender<R>, Receiver<R>) {
    bounded(0)
}
