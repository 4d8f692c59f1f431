// Command record classification and reply encoding.
//
// A command record is a single ASCII line terminated by exactly one `\n`:
//
//     {"Cmd": "AGENTCOMMAND", ...}\n
//
// The codec only parses the fixed `{"Cmd":` header and the quoted
// command-name field immediately behind it. Everything after the name is
// opaque payload owned by whichever handler serves that command class, so
// classification never needs a full JSON parse of the record.
//
// Command names are matched by prefix, case-sensitive, in a fixed precedence
// order, against a fixed-width window of the name field. A record that fails
// framing (missing terminator, embedded newline) or lacks the header is
// `Malformed`; a well-framed record with an unrecognized name is `Unknown`.
// The server disconnects on both — there is no way to discard a reply the
// tick side might otherwise produce for a request that was never enqueued.
//
// Replies travel in the opposite direction as one line each: `true`,
// `false`, or free handler text, terminated by a single `\n`.

use std::io::{self, Write};

/// Fixed literal every valid command record must begin with.
pub const HEADER: &str = "{\"Cmd\":";

/// Width of the command-name window examined after the header. Wide enough
/// for the longest recognized name (`AGENTCOMMAND`).
pub const COMMAND_FIELD_LEN: usize = 12;

/// Canonical positive reply body.
pub const REPLY_TRUE: &str = "true";

/// Canonical negative reply body.
pub const REPLY_FALSE: &str = "false";

/// Command classes recognized by the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Must execute inside the host simulation tick; goes through the
    /// request/reply queue.
    Agent,
    /// Safe to execute inline on the network thread.
    Session,
    /// Client asks to close the connection.
    Disconnect,
    /// Header was present but the command name matched nothing.
    Unknown,
    /// Missing header or broken framing; never reached a name check.
    Malformed,
}

impl CommandKind {
    /// True for the two unroutable classes that force a disconnect.
    pub fn is_unroutable(self) -> bool {
        matches!(self, CommandKind::Unknown | CommandKind::Malformed)
    }
}

/// Classify a raw record as read off the wire, terminator included.
///
/// A record must be exactly one line ending in exactly one `\n`. Anything
/// else (EOF-truncated tail, embedded newline from a buggy client) is
/// `Malformed` — the bridge rejects rather than reassembles.
pub fn classify_record(record: &str) -> CommandKind {
    let Some(line) = record.strip_suffix('\n') else {
        return CommandKind::Malformed;
    };
    if line.contains('\n') {
        return CommandKind::Malformed;
    }
    classify_line(line)
}

/// Classify a single line with the terminator already stripped.
///
/// Recognized names, checked by prefix in this precedence order:
/// `AGENTCOMMAND`, `SESSION`, `DISCONNECT`.
pub fn classify_line(line: &str) -> CommandKind {
    let Some(rest) = line.strip_prefix(HEADER) else {
        return CommandKind::Malformed;
    };

    // Tolerate spaces between the header colon and the quoted name.
    let rest = rest.trim_start_matches(' ');
    let Some(name) = rest.strip_prefix('"') else {
        return CommandKind::Unknown;
    };

    let end = name
        .char_indices()
        .nth(COMMAND_FIELD_LEN)
        .map_or(name.len(), |(i, _)| i);
    let field = &name[..end];

    if field.starts_with("AGENTCOMMAND") {
        CommandKind::Agent
    } else if field.starts_with("SESSION") {
        CommandKind::Session
    } else if field.starts_with("DISCONNECT") {
        CommandKind::Disconnect
    } else {
        CommandKind::Unknown
    }
}

/// Write one reply line: the body followed by exactly one `\n`, flushed.
///
/// Bodies are free text (`true` / `false` / handler output) and must not
/// contain a newline — that would desynchronize the client's line framing,
/// so it is rejected here rather than passed through.
pub fn write_reply<W: Write>(writer: &mut W, body: &str) -> io::Result<()> {
    if body.contains('\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("reply body contains a newline: {body:?}"),
        ));
    }
    writer.write_all(body.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Compose a minimal well-formed command record body (no terminator) for the
/// given command name, e.g. `{"Cmd":"DISCONNECT"}`.
pub fn format_command(name: &str) -> String {
    serde_json::json!({ "Cmd": name }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_agent_command() {
        assert_eq!(
            classify_line(r#"{"Cmd":"AGENTCOMMAND","Cmd2":"MOVE","args":[1,0,0]}"#),
            CommandKind::Agent
        );
    }

    #[test]
    fn classifies_session_command() {
        assert_eq!(
            classify_line(r#"{"Cmd":"SESSION","op":"status"}"#),
            CommandKind::Session
        );
    }

    #[test]
    fn classifies_disconnect() {
        assert_eq!(classify_line(r#"{"Cmd":"DISCONNECT"}"#), CommandKind::Disconnect);
    }

    #[test]
    fn name_match_is_by_prefix() {
        // Names are matched by prefix within the fixed-width window, so
        // suffixed variants still route to the base class.
        assert_eq!(classify_line(r#"{"Cmd": "SESSION_X"}"#), CommandKind::Session);
        assert_eq!(
            classify_line(r#"{"Cmd":"DISCONNECT_NOW"}"#),
            CommandKind::Disconnect
        );
    }

    #[test]
    fn tolerates_space_after_header() {
        assert_eq!(
            classify_line(r#"{"Cmd": "AGENTCOMMAND"}"#),
            CommandKind::Agent
        );
    }

    #[test]
    fn truncated_known_name_is_unknown() {
        // `AGENTCOM` was once accepted by a sloppier fixed-offset parse; the
        // recognized literal is the full name.
        assert_eq!(classify_line(r#"{"Cmd":"AGENTCOM"}"#), CommandKind::Unknown);
    }

    #[test]
    fn match_is_case_sensitive() {
        assert_eq!(classify_line(r#"{"Cmd":"session"}"#), CommandKind::Unknown);
        assert_eq!(classify_line(r#"{"Cmd":"Disconnect"}"#), CommandKind::Unknown);
    }

    #[test]
    fn missing_header_is_malformed() {
        assert_eq!(classify_line("hello there"), CommandKind::Malformed);
        assert_eq!(classify_line(""), CommandKind::Malformed);
        assert_eq!(
            classify_line(r#"{"cmd":"SESSION"}"#),
            CommandKind::Malformed
        );
    }

    #[test]
    fn unquoted_name_is_unknown() {
        assert_eq!(classify_line(r#"{"Cmd":42}"#), CommandKind::Unknown);
    }

    #[test]
    fn record_requires_exactly_one_trailing_newline() {
        assert_eq!(
            classify_record("{\"Cmd\":\"SESSION\"}\n"),
            CommandKind::Session
        );
        // EOF-truncated tail without a terminator.
        assert_eq!(
            classify_record("{\"Cmd\":\"SESSION\"}"),
            CommandKind::Malformed
        );
        // Double terminator means an embedded blank line.
        assert_eq!(
            classify_record("{\"Cmd\":\"SESSION\"}\n\n"),
            CommandKind::Malformed
        );
    }

    #[test]
    fn record_rejects_embedded_newline() {
        assert_eq!(
            classify_record("{\"Cmd\":\"SESS\nION\"}\n"),
            CommandKind::Malformed
        );
    }

    #[test]
    fn unroutable_classes() {
        assert!(CommandKind::Unknown.is_unroutable());
        assert!(CommandKind::Malformed.is_unroutable());
        assert!(!CommandKind::Agent.is_unroutable());
        assert!(!CommandKind::Session.is_unroutable());
        assert!(!CommandKind::Disconnect.is_unroutable());
    }

    #[test]
    fn write_reply_appends_single_newline() {
        let mut buf = Vec::new();
        write_reply(&mut buf, REPLY_TRUE).unwrap();
        assert_eq!(buf, b"true\n");

        let mut buf = Vec::new();
        write_reply(&mut buf, "observed 3 entities").unwrap();
        assert_eq!(buf, b"observed 3 entities\n");
    }

    #[test]
    fn write_reply_rejects_embedded_newline() {
        let mut buf = Vec::new();
        let err = write_reply(&mut buf, "two\nlines").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty());
    }

    #[test]
    fn format_command_roundtrips_through_classifier() {
        let record = format!("{}\n", format_command("AGENTCOMMAND"));
        assert_eq!(classify_record(&record), CommandKind::Agent);

        let record = format!("{}\n", format_command("DISCONNECT"));
        assert_eq!(classify_record(&record), CommandKind::Disconnect);
    }

    #[test]
    fn format_command_starts_with_header() {
        assert!(format_command("SESSION").starts_with(HEADER));
    }
}
