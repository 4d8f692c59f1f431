// ironhull_bridge — remote command bridge for the host simulation.
//
// The bridge lets an external automation client drive the single-threaded
// host simulation over TCP without the tick loop ever blocking on network
// I/O. A dedicated network thread accepts one connection at a time and reads
// newline-delimited command records; agent commands are handed to the tick
// loop through a single-slot request/reply queue, session commands are
// answered inline on the network thread, and everything unroutable closes
// the connection.
//
// Module overview:
// - `command.rs`:  Request envelopes, replies, and the handler traits the
//                  host implements (`AgentCommandHandler` runs inside the
//                  tick, `SessionCommandHandler` runs on the network thread).
// - `queue.rs`:    `RequestQueue` — the only state shared between the
//                  network thread and the tick thread. Strict single-slot
//                  hand-off: one request in flight at a time, so replies
//                  need no correlation IDs.
// - `server.rs`:   TCP listener and the serial accept/serve loop. Uses
//                  `std::net` blocking sockets on one background thread.
// - `dispatch.rs`: `TickDispatcher` — the drain-and-reply pass the host
//                  invokes once per simulation tick.
// - `client.rs`:   Blocking TCP client for automation harnesses and tests.
//
// Dependencies: `ironhull_protocol` (record classification and reply
// encoding). No dependency on any concrete simulation code — world control
// stays behind the handler traits.
//
// The bridge can be embedded in a host process via the library API
// (`start_bridge` + `TickDispatcher`) or run standalone against stub
// handlers via the `bridge_host` binary (`main.rs`).

pub mod client;
pub mod command;
pub mod dispatch;
pub mod queue;
pub mod server;

pub use client::BridgeClient;
pub use command::{AgentCommandHandler, ExecuteError, Reply, RequestEnvelope, SessionCommandHandler};
pub use dispatch::TickDispatcher;
pub use queue::{QueueError, RequestQueue};
pub use server::{BridgeConfig, BridgeHandle, start_bridge};
