// Request/reply hand-off between the network thread and the tick thread.
//
// `RequestQueue` is the only state the two threads share. It is a strict
// single-slot hand-off: the connection server submits one agent command,
// blocks in `await_reply`, and reads nothing further until the reply lands.
// That invariant is enforced by construction — `submit` rejects a second
// request while one is outstanding — which is what lets replies travel
// without correlation IDs.
//
// Producer/consumer roles:
// - network thread: `submit` then `await_reply` (may block unboundedly).
// - tick thread:    `take_pending` then `deposit`, both non-blocking.
//
// The reply slot is a four-state machine guarded by one mutex:
//
//     Idle --submit--> Armed --deposit--> Ready --await_reply--> Idle
//                        \--timeout--> Abandoned --deposit(discarded)--> Idle
//
// `Abandoned` exists for the opt-in reply timeout: when the waiter gives up,
// a late deposit must be discarded rather than left in the slot, or the next
// request on a future connection would receive a stale reply.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::command::{Reply, RequestEnvelope};

/// Errors crossing the queue seam.
#[derive(Debug, Error)]
pub enum QueueError {
    /// `submit` while a previous request has not been answered yet.
    #[error("a request is already in flight")]
    RequestInFlight,
    /// `await_reply` gave up before the tick side deposited a reply.
    #[error("timed out waiting for a reply from the tick dispatcher")]
    ReplyTimeout,
    /// `deposit` with no armed slot — a reply nobody asked for.
    #[error("no request is in flight")]
    NoRequestInFlight,
    /// `deposit` after the waiter timed out; the reply was discarded.
    #[error("the waiter abandoned the request before the reply arrived")]
    ReplyAbandoned,
}

enum ReplySlot {
    /// No request outstanding.
    Idle,
    /// A request was submitted; the network thread is (or will be) waiting.
    Armed,
    /// The tick thread deposited a reply that has not been collected yet.
    Ready(Reply),
    /// The waiter timed out; the next deposit is dropped on the floor.
    Abandoned,
}

struct QueueInner {
    pending: VecDeque<RequestEnvelope>,
    slot: ReplySlot,
}

/// Cross-thread request/reply channel. Shared via `Arc` between the
/// connection server and the tick dispatcher.
pub struct RequestQueue {
    inner: Mutex<QueueInner>,
    reply_ready: Condvar,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                pending: VecDeque::new(),
                slot: ReplySlot::Idle,
            }),
            reply_ready: Condvar::new(),
        }
    }

    // A poisoned mutex here means some thread panicked while holding the
    // lock; every critical section below leaves the state machine consistent
    // at each step, so recovering the guard is safe.
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a request to the pending collection and arm the reply slot.
    /// Never blocks beyond lock contention.
    pub fn submit(&self, request: RequestEnvelope) -> Result<(), QueueError> {
        let mut inner = self.lock();
        match inner.slot {
            ReplySlot::Idle => {
                inner.slot = ReplySlot::Armed;
                inner.pending.push_back(request);
                Ok(())
            }
            _ => Err(QueueError::RequestInFlight),
        }
    }

    /// Remove and return all currently pending requests in arrival order.
    /// Never blocks; returns an empty vec when nothing is pending.
    pub fn take_pending(&self) -> Vec<RequestEnvelope> {
        let mut inner = self.lock();
        inner.pending.drain(..).collect()
    }

    /// Block until the tick thread deposits a reply, then return it.
    ///
    /// With `timeout: None` the wait is unbounded — the canonical behavior,
    /// with the documented risk that a stalled tick loop hangs this thread
    /// forever. With a timeout, expiry marks the slot `Abandoned` (so a late
    /// deposit is discarded) and returns `ReplyTimeout`; the caller is
    /// expected to drop the connection.
    pub fn await_reply(&self, timeout: Option<Duration>) -> Result<Reply, QueueError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut inner = self.lock();
        loop {
            if let ReplySlot::Ready(_) = inner.slot {
                let ReplySlot::Ready(reply) = std::mem::replace(&mut inner.slot, ReplySlot::Idle)
                else {
                    unreachable!()
                };
                return Ok(reply);
            }

            match deadline {
                None => {
                    inner = self
                        .reply_ready
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        inner.slot = ReplySlot::Abandoned;
                        return Err(QueueError::ReplyTimeout);
                    }
                    let remaining = deadline - now;
                    inner = self
                        .reply_ready
                        .wait_timeout(inner, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    /// Make a reply available to the waiting network thread.
    pub fn deposit(&self, reply: Reply) -> Result<(), QueueError> {
        let mut inner = self.lock();
        match inner.slot {
            ReplySlot::Armed => {
                inner.slot = ReplySlot::Ready(reply);
                self.reply_ready.notify_one();
                Ok(())
            }
            ReplySlot::Abandoned => {
                inner.slot = ReplySlot::Idle;
                Err(QueueError::ReplyAbandoned)
            }
            ReplySlot::Idle | ReplySlot::Ready(_) => Err(QueueError::NoRequestInFlight),
        }
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::thread;

    use ironhull_protocol::CommandKind;

    use super::*;

    /// Create a TCP pair: (client_stream, server_stream) on localhost.
    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    fn envelope(line: &str) -> RequestEnvelope {
        let (_client, server) = tcp_pair();
        RequestEnvelope::new(server, line.into(), CommandKind::Agent)
    }

    #[test]
    fn take_pending_empty_when_idle() {
        let queue = RequestQueue::new();
        assert!(queue.take_pending().is_empty());
    }

    #[test]
    fn submit_then_take_returns_request() {
        let queue = RequestQueue::new();
        queue.submit(envelope("first")).unwrap();

        let taken = queue.take_pending();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].payload(), "first");

        // Taking again is empty; the slot stays armed until a deposit.
        assert!(queue.take_pending().is_empty());
    }

    #[test]
    fn second_submit_rejected_while_in_flight() {
        let queue = RequestQueue::new();
        queue.submit(envelope("first")).unwrap();

        let err = queue.submit(envelope("second")).unwrap_err();
        assert!(matches!(err, QueueError::RequestInFlight));
    }

    #[test]
    fn deposit_without_request_rejected() {
        let queue = RequestQueue::new();
        let reply = envelope("x").into_reply("orphan".into());
        let err = queue.deposit(reply).unwrap_err();
        assert!(matches!(err, QueueError::NoRequestInFlight));
    }

    #[test]
    fn handoff_across_threads() {
        let queue = Arc::new(RequestQueue::new());
        queue.submit(envelope("do the thing")).unwrap();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                // Busy-poll like the tick loop does.
                loop {
                    let mut taken = queue.take_pending();
                    if let Some(request) = taken.pop() {
                        assert_eq!(request.payload(), "do the thing");
                        queue.deposit(request.into_reply("done".into())).unwrap();
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        let reply = queue.await_reply(None).unwrap();
        assert_eq!(reply.body(), "done");
        consumer.join().unwrap();

        // The cycle is complete; the slot must accept the next request.
        queue.submit(envelope("again")).unwrap();
    }

    #[test]
    fn await_reply_timeout_abandons_slot() {
        let queue = RequestQueue::new();
        queue.submit(envelope("never answered")).unwrap();

        let err = queue
            .await_reply(Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, QueueError::ReplyTimeout));

        // A late deposit is discarded, which also resets the slot.
        let request = queue.take_pending().pop().unwrap();
        let err = queue.deposit(request.into_reply("too late".into())).unwrap_err();
        assert!(matches!(err, QueueError::ReplyAbandoned));

        // The next request must go through a full clean cycle.
        queue.submit(envelope("fresh")).unwrap();
        let request = queue.take_pending().pop().unwrap();
        queue.deposit(request.into_reply("ok".into())).unwrap();
        let reply = queue.await_reply(Some(Duration::from_secs(1))).unwrap();
        assert_eq!(reply.body(), "ok");
    }

    #[test]
    fn reply_arriving_before_await_is_returned_immediately() {
        let queue = RequestQueue::new();
        queue.submit(envelope("quick")).unwrap();

        let request = queue.take_pending().pop().unwrap();
        queue.deposit(request.into_reply("already here".into())).unwrap();

        // Even a zero timeout succeeds when the slot is already Ready.
        let reply = queue.await_reply(Some(Duration::ZERO)).unwrap();
        assert_eq!(reply.body(), "already here");
    }
}
