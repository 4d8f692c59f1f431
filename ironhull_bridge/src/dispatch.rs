// Tick-side consumer of the request queue.
//
// The host owns a `TickDispatcher` and calls `process_requests` once per
// simulation tick, on the simulation's own thread. Each pass drains every
// pending request, runs it against the agent command handler, and deposits
// the reply before moving to the next — so replies leave in the same order
// requests arrived, and the network thread's blocked `await_reply` wakes as
// soon as its reply exists.
//
// The pass never blocks on network I/O and never lets a handler failure
// escape into the tick loop: an `ExecuteError` becomes a `false` reply, and
// a queue refusal (the waiter already gave up) is logged and dropped. A
// malfunctioning command must cost the client its reply content, not the
// host its tick or the network thread its wakeup.

use std::sync::Arc;

use ironhull_protocol::REPLY_FALSE;
use tracing::{debug, warn};

use crate::command::AgentCommandHandler;
use crate::queue::{QueueError, RequestQueue};

/// Drains the request queue once per host tick and answers each request via
/// the agent command handler.
pub struct TickDispatcher {
    queue: Arc<RequestQueue>,
    handler: Box<dyn AgentCommandHandler>,
}

impl TickDispatcher {
    pub fn new(queue: Arc<RequestQueue>, handler: Box<dyn AgentCommandHandler>) -> Self {
        Self { queue, handler }
    }

    /// One drain-and-reply pass. Call exactly once per simulation tick.
    pub fn process_requests(&mut self) {
        for request in self.queue.take_pending() {
            debug!(payload = request.payload(), "executing agent command");
            let body = match self.handler.execute(request.payload()) {
                Ok(body) => body,
                Err(error) => {
                    warn!(%error, "agent command handler failed");
                    REPLY_FALSE.to_owned()
                }
            };

            match self.queue.deposit(request.into_reply(body)) {
                Ok(()) => {}
                Err(QueueError::ReplyAbandoned) => {
                    // The network thread timed out and dropped the
                    // connection while we were executing.
                    debug!("reply discarded, waiter already gone");
                }
                Err(error) => warn!(%error, "could not deposit reply"),
            }
        }
    }
}
