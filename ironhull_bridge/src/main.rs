// Standalone bridge host with stub handlers.
//
// Runs the full bridge against mock collaborators so automation clients can
// be developed and tested without the real host simulation: the agent stub
// acknowledges each command with its byte count, the session stub answers
// `true` to everything. The tick loop here is a plain sleep loop at a few
// milliseconds, standing in for the real host's update cadence.
//
// Usage:
//   bridge_host [OPTIONS]
//     --port <PORT>                  Listen port (default: 9678)
//     --tick-millis <N>              Tick interval in ms (default: 5)
//     --reply-timeout-millis <N>     Bound the per-command reply wait
//                                    (default: unbounded)
//
// The process runs until killed; the network thread and the listener are
// torn down on exit.

use std::sync::Arc;
use std::time::Duration;

use ironhull_bridge::command::{
    AgentCommandHandler, ExecuteError, SessionCommandHandler,
};
use ironhull_bridge::dispatch::TickDispatcher;
use ironhull_bridge::queue::RequestQueue;
use ironhull_bridge::server::{BridgeConfig, start_bridge};
use ironhull_protocol::REPLY_TRUE;
use tracing::info;

/// Agent stub: acknowledge the command with its size, touch nothing.
struct EchoAgentHandler;

impl AgentCommandHandler for EchoAgentHandler {
    fn execute(&mut self, payload: &str) -> Result<String, ExecuteError> {
        Ok(format!("Got {} bytes, thanks!", payload.len()))
    }
}

/// Session stub: every session command succeeds.
struct AckSessionHandler;

impl SessionCommandHandler for AckSessionHandler {
    fn execute(&self, _payload: &str) -> Result<String, ExecuteError> {
        Ok(REPLY_TRUE.to_owned())
    }
}

struct HostConfig {
    bridge: BridgeConfig,
    tick: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            tick: Duration::from_millis(5),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let config = parse_args();
    let tick = config.tick;

    let queue = Arc::new(RequestQueue::new());
    let (_handle, addr) = match start_bridge(
        config.bridge,
        Arc::clone(&queue),
        Arc::new(AckSessionHandler),
    ) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start bridge: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, tick_millis = tick.as_millis() as u64, "bridge host running");

    let mut dispatcher = TickDispatcher::new(queue, Box::new(EchoAgentHandler));

    // The mock host's whole tick is the dispatcher pass.
    loop {
        dispatcher.process_requests();
        std::thread::sleep(tick);
    }
}

/// Parse command-line arguments into a `HostConfig`. Uses simple
/// `std::env::args()` matching — no clap dependency.
fn parse_args() -> HostConfig {
    let mut config = HostConfig::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                config.bridge.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--tick-millis" => {
                i += 1;
                let millis: u64 = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--tick-millis requires a valid number");
                    std::process::exit(1);
                });
                config.tick = Duration::from_millis(millis);
            }
            "--reply-timeout-millis" => {
                i += 1;
                let millis: u64 = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--reply-timeout-millis requires a valid number");
                    std::process::exit(1);
                });
                config.bridge.reply_timeout = Some(Duration::from_millis(millis));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_usage() {
    println!("Usage: bridge_host [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PORT>                Listen port (default: 9678)");
    println!("  --tick-millis <N>            Tick interval in ms (default: 5)");
    println!("  --reply-timeout-millis <N>   Bound the reply wait (default: unbounded)");
    println!("  --help, -h                   Show this help");
}
