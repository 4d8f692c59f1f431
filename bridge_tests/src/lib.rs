// Test-only host harness for bridge integration tests.
//
// Wraps a real `RequestQueue`, a real bridge server, and a real
// `TickDispatcher` on its own thread to provide the host's side of the
// pipeline: client → server → queue → tick → handler → reply. The handlers
// record every payload they execute, so tests can assert not just on the
// replies a client sees but on what the host side actually ran — and, just
// as importantly, on what it never saw.
//
// The only test-specific code here is the recording; all routing and
// queuing uses the same code paths as an embedded production bridge.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ironhull_bridge::client::BridgeClient;
use ironhull_bridge::command::{AgentCommandHandler, ExecuteError, SessionCommandHandler};
use ironhull_bridge::dispatch::TickDispatcher;
use ironhull_bridge::queue::RequestQueue;
use ironhull_bridge::server::{BridgeConfig, BridgeHandle, start_bridge};

/// Tick cadence for the harness. Short, so tests spend little time waiting.
const TICK_INTERVAL: Duration = Duration::from_millis(2);

/// Agent handler that records each payload and echoes it back.
struct RecordingAgent {
    log: Arc<Mutex<Vec<String>>>,
}

impl AgentCommandHandler for RecordingAgent {
    fn execute(&mut self, payload: &str) -> Result<String, ExecuteError> {
        self.log.lock().unwrap().push(payload.to_owned());
        Ok(format!("executed:{payload}"))
    }
}

/// Session handler that records each payload and acknowledges inline.
struct RecordingSession {
    log: Arc<Mutex<Vec<String>>>,
}

impl SessionCommandHandler for RecordingSession {
    fn execute(&self, payload: &str) -> Result<String, ExecuteError> {
        self.log.lock().unwrap().push(payload.to_owned());
        Ok(format!("inline:{payload}"))
    }
}

/// A complete host: bridge server, queue, and a running tick loop.
pub struct TestHost {
    addr: SocketAddr,
    handle: Option<BridgeHandle>,
    tick_stop: Arc<AtomicBool>,
    tick_thread: Option<thread::JoinHandle<()>>,
    agent_log: Arc<Mutex<Vec<String>>>,
    session_log: Arc<Mutex<Vec<String>>>,
}

impl TestHost {
    /// Start a bridge on a random port and a tick loop draining it.
    pub fn start() -> Self {
        let agent_log = Arc::new(Mutex::new(Vec::new()));
        let session_log = Arc::new(Mutex::new(Vec::new()));

        let config = BridgeConfig {
            port: 0,
            read_timeout: Duration::from_secs(5),
            reply_timeout: None,
        };
        let queue = Arc::new(RequestQueue::new());
        let session = Arc::new(RecordingSession {
            log: Arc::clone(&session_log),
        });
        let (handle, addr) =
            start_bridge(config, Arc::clone(&queue), session).expect("start_bridge failed");

        let tick_stop = Arc::new(AtomicBool::new(false));
        let tick_thread = {
            let stop = Arc::clone(&tick_stop);
            let log = Arc::clone(&agent_log);
            thread::spawn(move || {
                let mut dispatcher = TickDispatcher::new(queue, Box::new(RecordingAgent { log }));
                while !stop.load(Ordering::SeqCst) {
                    dispatcher.process_requests();
                    thread::sleep(TICK_INTERVAL);
                }
            })
        };

        // Give the network thread a moment to start polling.
        thread::sleep(Duration::from_millis(50));

        Self {
            addr,
            handle: Some(handle),
            tick_stop,
            tick_thread: Some(tick_thread),
            agent_log,
            session_log,
        }
    }

    /// Connect a fresh client to this host.
    pub fn connect(&self) -> BridgeClient {
        BridgeClient::connect(("127.0.0.1", self.addr.port())).expect("connect failed")
    }

    /// Payloads the agent handler executed, in execution order.
    pub fn agent_payloads(&self) -> Vec<String> {
        self.agent_log.lock().unwrap().clone()
    }

    /// Payloads the session handler executed, in execution order.
    pub fn session_payloads(&self) -> Vec<String> {
        self.session_log.lock().unwrap().clone()
    }

    /// Stop the tick loop and the bridge server.
    pub fn shutdown(mut self) {
        self.tick_stop.store(true, Ordering::SeqCst);
        if let Some(t) = self.tick_thread.take() {
            let _ = t.join();
        }
        if let Some(h) = self.handle.take() {
            h.stop();
        }
    }
}
