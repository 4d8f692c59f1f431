// TCP server and routing loop for the command bridge.
//
// Architecture: one dedicated network thread, serial connections.
//
// - **Network thread** (`run_bridge`): polls `TcpListener::accept()` against
//   the stop flag, then serves the accepted connection to completion before
//   accepting the next. At most one live connection exists at any time —
//   that serialism is what makes the single-slot request queue sound.
// - **Per line**: classify via `ironhull_protocol::classify_record`, then
//   route. Agent commands are submitted to the `RequestQueue` and the thread
//   blocks in `await_reply` until the tick dispatcher answers; session
//   commands are executed inline; `DISCONNECT` replies `true` and closes;
//   anything unroutable replies `false` and forcibly closes, because once a
//   request reaches the queue there is no way to discard the reply the tick
//   side would produce for it.
//
// Reads are bounded by an idle timeout (20 s canonically); `await_reply` is
// unbounded unless `BridgeConfig::reply_timeout` is set, in which case a
// timeout forces a disconnect and the queue discards the late reply.
//
// Shutdown: the network thread checks a `keep_running` flag once per accept
// poll and before each read. An in-progress blocking read is not interrupted
// — stopping is cooperative and may lag by one connection lifetime.

use std::io::{self, BufRead, BufReader};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use ironhull_protocol::{CommandKind, REPLY_FALSE, REPLY_TRUE, classify_record, write_reply};
use tracing::{debug, error, info, warn};

use crate::command::{RequestEnvelope, SessionCommandHandler};
use crate::queue::RequestQueue;

/// Canonical listen port for the bridge.
pub const DEFAULT_PORT: u16 = 9678;

/// Canonical idle read timeout per connection.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// How often the accept loop re-checks the stop flag while idle.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Configuration for starting a bridge server.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Listen port. Use 0 to let the OS pick a free port (tests).
    pub port: u16,
    /// Idle read timeout per connection; on expiry the connection is
    /// dropped and the server returns to accepting.
    pub read_timeout: Duration,
    /// Bound on `await_reply`. `None` preserves the canonical unbounded
    /// wait; `Some` turns a stalled tick loop into a forced disconnect
    /// instead of a hung network thread.
    pub reply_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            reply_timeout: None,
        }
    }
}

/// Handle returned by `start_bridge` to control the running server.
pub struct BridgeHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl BridgeHandle {
    /// Signal the bridge to stop and wait for the network thread to exit.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread {
            let _ = handle.join();
        }
    }
}

/// Start the bridge server on a background thread. Returns a handle for
/// stopping it and the actual bound address (useful when port 0 is used to
/// let the OS pick a free port).
///
/// Must be called before the host starts ticking, so agent commands never
/// arrive into a queue nothing drains.
pub fn start_bridge(
    config: BridgeConfig,
    queue: Arc<RequestQueue>,
    session: Arc<dyn SessionCommandHandler>,
) -> io::Result<(BridgeHandle, SocketAddr)> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))?;
    let addr = listener.local_addr()?;
    info!(%addr, "bridge listening");

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    let thread = thread::spawn(move || {
        run_bridge(listener, config, queue, session, keep_running_clone);
        info!("bridge server loop ended");
    });

    Ok((
        BridgeHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Accept/serve loop. Serves exactly one connection at a time, serially,
/// until `keep_running` is cleared.
fn run_bridge(
    listener: TcpListener,
    config: BridgeConfig,
    queue: Arc<RequestQueue>,
    session: Arc<dyn SessionCommandHandler>,
    keep_running: Arc<AtomicBool>,
) {
    // Non-blocking accept so the loop can check keep_running periodically.
    listener.set_nonblocking(true).ok();

    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "client connected");
                stream.set_nonblocking(false).ok();
                match serve_connection(stream, &config, &queue, session.as_ref(), &keep_running) {
                    Ok(()) => info!(%peer, "client disconnected"),
                    Err(e) => warn!(%peer, error = %e, "connection error"),
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                error!(error = %e, "accept failed");
                break;
            }
        }
    }
}

/// Whether the connection loop keeps reading after a record was handled.
enum LineOutcome {
    Continue,
    Disconnect,
}

/// Serve one connection to completion: read records one line at a time and
/// route each until disconnect, EOF, idle timeout, or stream error.
fn serve_connection(
    mut stream: TcpStream,
    config: &BridgeConfig,
    queue: &RequestQueue,
    session: &dyn SessionCommandHandler,
    keep_running: &AtomicBool,
) -> io::Result<()> {
    stream.set_read_timeout(Some(config.read_timeout))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut record = String::new();

    while keep_running.load(Ordering::SeqCst) {
        record.clear();
        match reader.read_line(&mut record) {
            Ok(0) => break, // clean EOF
            Ok(_) => {
                debug!(record = record.trim_end(), "read command record");
                match handle_record(&mut stream, &record, config, queue, session)? {
                    LineOutcome::Continue => {}
                    LineOutcome::Disconnect => break,
                }
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                warn!("idle read timeout, dropping connection");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Route a single raw record (terminator still attached).
fn handle_record(
    stream: &mut TcpStream,
    record: &str,
    config: &BridgeConfig,
    queue: &RequestQueue,
    session: &dyn SessionCommandHandler,
) -> io::Result<LineOutcome> {
    let kind = classify_record(record);
    let line = record.trim_end_matches('\n');

    match kind {
        CommandKind::Agent => {
            let envelope = RequestEnvelope::new(stream.try_clone()?, line.to_owned(), kind);
            if let Err(e) = queue.submit(envelope) {
                // Only reachable if a previous reply never arrived; the
                // queue is wedged, so this connection cannot be served.
                error!(error = %e, "could not enqueue agent command");
                return force_disconnect(stream);
            }
            match queue.await_reply(config.reply_timeout) {
                Ok(reply) => {
                    reply.send()?;
                    Ok(LineOutcome::Continue)
                }
                Err(e) => {
                    error!(error = %e, "no reply from tick dispatcher");
                    force_disconnect(stream)
                }
            }
        }
        CommandKind::Session => {
            let body = match session.execute(line) {
                Ok(body) => body,
                Err(error) => {
                    warn!(%error, "session command handler failed");
                    REPLY_FALSE.to_owned()
                }
            };
            write_reply(stream, &body)?;
            Ok(LineOutcome::Continue)
        }
        CommandKind::Disconnect => {
            write_reply(stream, REPLY_TRUE)?;
            let _ = stream.shutdown(Shutdown::Both);
            Ok(LineOutcome::Disconnect)
        }
        CommandKind::Unknown => {
            warn!(record = line, "command unknown, disconnecting");
            force_disconnect(stream)
        }
        CommandKind::Malformed => {
            warn!(record = line, "unexpected record header, disconnecting");
            force_disconnect(stream)
        }
    }
}

/// Failure reply, then close. Used for every unroutable or unanswerable
/// record so the client is never left blocked on a read; write errors are
/// ignored because the connection is going away regardless.
fn force_disconnect(stream: &mut TcpStream) -> io::Result<LineOutcome> {
    let _ = write_reply(stream, REPLY_FALSE);
    let _ = stream.shutdown(Shutdown::Both);
    Ok(LineOutcome::Disconnect)
}
