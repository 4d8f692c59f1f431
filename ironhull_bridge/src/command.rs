// Command envelopes, replies, and the handler traits the host implements.
//
// A `RequestEnvelope` is created by the connection server for every line it
// routes and is immutable from then on. For agent commands, ownership moves
// into the `RequestQueue` and from there to the tick thread; the envelope
// carries a cloned `TcpStream` handle so the eventual `Reply` can be written
// to the originating connection even if the server has already moved on to
// closing it. The stream handle only routes the single in-flight reply — it
// is never used to multiplex concurrent requests.
//
// Handlers never see the sockets. They receive the raw record text (the
// bridge does not parse payloads beyond the command header) and return reply
// text, or an `ExecuteError` that the caller converts into a `false` reply.

use std::io;
use std::net::TcpStream;

use ironhull_protocol::{CommandKind, write_reply};
use thiserror::Error;

/// Failure raised by an agent or session command handler. Converted into a
/// `false` reply by whoever invoked the handler; never propagated as a
/// transport error.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The record's payload did not make sense to the handler.
    #[error("malformed command payload: {0}")]
    BadPayload(String),
    /// The world interaction itself failed (missing entity, blocked
    /// movement, raycast outside the loaded area, ...).
    #[error("world interaction failed: {0}")]
    WorldFault(String),
}

/// Executes agent commands. Implementations run inside the host simulation
/// tick (via `TickDispatcher`) and may freely touch world state, but must
/// stay bounded — a slow handler stalls the tick and the blocked client
/// alike.
pub trait AgentCommandHandler: Send {
    fn execute(&mut self, payload: &str) -> Result<String, ExecuteError>;
}

/// Executes session commands inline on the network thread. Implementations
/// must only touch session-scoped state that is safe outside the tick; they
/// never go near the request queue.
pub trait SessionCommandHandler: Send + Sync {
    fn execute(&self, payload: &str) -> Result<String, ExecuteError>;
}

/// One routed command record: the originating connection, the raw line
/// (terminator stripped), and its command class.
#[derive(Debug)]
pub struct RequestEnvelope {
    stream: TcpStream,
    line: String,
    kind: CommandKind,
}

impl RequestEnvelope {
    pub fn new(stream: TcpStream, line: String, kind: CommandKind) -> Self {
        Self { stream, line, kind }
    }

    /// The raw record text handed to handlers.
    pub fn payload(&self) -> &str {
        &self.line
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Consume the envelope into the reply for it, keeping the connection
    /// routing intact.
    pub fn into_reply(self, body: String) -> Reply {
        Reply {
            stream: self.stream,
            body,
        }
    }
}

/// Reply text destined for the connection its request arrived on. Consumed
/// exactly once by `send`.
#[derive(Debug)]
pub struct Reply {
    stream: TcpStream,
    body: String,
}

impl Reply {
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Write the reply line to its destination connection.
    pub fn send(mut self) -> io::Result<()> {
        write_reply(&mut self.stream, &self.body)
    }
}
