// Blocking TCP client for the command bridge.
//
// The protocol is strictly request/reply — the server never pushes — so the
// client needs no reader thread: write one record line, block on the reply
// line, return it. Automation harnesses drive the whole bridge through this
// one call; the integration tests use it the same way.
//
// Lives in the bridge crate (not a test crate) because the bridge exists to
// be driven by external tooling, and that tooling needs exactly this
// zero-dependency handle: std TCP plus the protocol crate's record helpers.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use ironhull_protocol::format_command;

/// Default reply timeout so a dead server fails a harness instead of
/// hanging it.
const REPLY_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking bridge client: one command line out, one reply line back.
pub struct BridgeClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl BridgeClient {
    /// Connect to a bridge server.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(REPLY_READ_TIMEOUT))?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: stream,
        })
    }

    /// Send one raw record (no terminator) and block for the reply line.
    ///
    /// Returns the reply body with the terminator stripped. `UnexpectedEof`
    /// means the server closed the connection instead of replying further —
    /// which is what it does after an unroutable record.
    pub fn send_record(&mut self, record: &str) -> io::Result<String> {
        self.writer.write_all(record.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.read_reply()
    }

    /// Send a minimal `{"Cmd": "<NAME>"}` record for the given command name.
    pub fn send_command(&mut self, name: &str) -> io::Result<String> {
        self.send_record(&format_command(name))
    }

    /// Send `DISCONNECT`, returning the server's farewell reply. Consumes
    /// the client; the server closes the connection after replying.
    pub fn disconnect(mut self) -> io::Result<String> {
        self.send_command("DISCONNECT")
    }

    fn read_reply(&mut self) -> io::Result<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection before replying",
            ));
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(line)
    }
}
