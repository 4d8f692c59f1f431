// ironhull_protocol — wire protocol for the Ironhull remote command bridge.
//
// This crate defines the line-oriented command protocol spoken between an
// external automation client and the bridge server (`ironhull_bridge`). It is
// shared between both sides and has no dependency on the bridge or any host
// simulation code.
//
// Module overview:
// - `codec.rs`: record classification (`classify_record` / `classify_line`),
//   the `CommandKind` enum, reply encoding (`write_reply`), and the
//   `format_command` helper for composing well-formed command records.
//
// Design decisions:
// - **Newline-delimited ASCII.** One command record per line, one reply line
//   per record. Multi-line payloads are rejected at the framing level rather
//   than reassembled.
// - **Opaque payloads.** The bridge only inspects the fixed `{"Cmd":` header
//   and the command-name field behind it. The rest of the record is forwarded
//   verbatim to whichever handler owns that command class, so this crate
//   never needs a full JSON parser for inbound records.
// - **No async runtime.** Reply encoding works over any `std::io::Write`,
//   compatible with blocking TCP streams and buffered wrappers.

pub mod codec;

pub use codec::{
    COMMAND_FIELD_LEN, CommandKind, HEADER, REPLY_FALSE, REPLY_TRUE, classify_line,
    classify_record, format_command, write_reply,
};
