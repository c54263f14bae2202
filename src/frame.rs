use log::debug;

use crate::error::{Result, WsprError};
use crate::transport::Transport;

/// First byte of every inbound frame.
const FRAME_OPEN: u8 = b'{';
/// Opcodes are exactly three letters.
pub const OPCODE_LEN: usize = 3;
/// Byte offset of the opcode within an inbound line (`{OPC} ...`).
const OPCODE_OFFSET: usize = 1;
/// Byte offset of the payload, past the closing delimiter.
const PAYLOAD_OFFSET: usize = 5;
/// Ceiling on per-byte reads while assembling one line. A stream that never
/// terminates a line has lost framing and cannot be resynchronized.
const MAX_LINE_READS: usize = 1_000_000;

/// One inbound protocol message: a three-letter opcode and its payload text.
///
/// The payload never contains a line terminator; payload grammar is the
/// per-opcode parsers' concern, not the codec's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: String,
    pub payload: String,
}

impl Frame {
    /// Decode one line (already stripped of its terminator) into a frame.
    ///
    /// Returns `None` unless the line opens with `{` and carries three
    /// ASCII letters at the opcode offset. The payload starts after the
    /// delimiter byte, with exactly one separator space trimmed; some
    /// firmware revisions omit that space (`MIN` is known to).
    pub fn decode_line(raw: &str) -> Option<Frame> {
        let bytes = raw.as_bytes();
        if bytes.first() != Some(&FRAME_OPEN) {
            return None;
        }
        if bytes.len() < PAYLOAD_OFFSET {
            debug!("short frame: {raw:?}");
            return None;
        }
        let code = &bytes[OPCODE_OFFSET..OPCODE_OFFSET + OPCODE_LEN];
        if !code.iter().all(u8::is_ascii_alphabetic) || !bytes[PAYLOAD_OFFSET - 1].is_ascii() {
            debug!("malformed frame: {raw:?}");
            return None;
        }

        let rest = &raw[PAYLOAD_OFFSET..];
        let payload = rest.strip_prefix(' ').unwrap_or(rest);
        Some(Frame {
            opcode: raw[OPCODE_OFFSET..OPCODE_OFFSET + OPCODE_LEN].to_string(),
            payload: payload.to_string(),
        })
    }
}

/// Encode an outbound command to its wire representation.
///
/// A non-empty opcode renders as `[OPC] payload\r\n`. An empty opcode is the
/// raw diagnostic passthrough: the payload goes out verbatim and the caller
/// supplies any terminator it wants.
pub fn encode_command(opcode: &str, payload: &str) -> Vec<u8> {
    if opcode.is_empty() {
        return payload.as_bytes().to_vec();
    }
    format!("[{opcode}] {payload}\r\n").into_bytes()
}

/// Read one line without waiting.
///
/// Returns an empty string immediately when the transport has no bytes
/// pending; otherwise accumulates until CR or LF.
pub fn read_line(transport: &mut dyn Transport) -> Result<String> {
    if transport.bytes_to_read()? == 0 {
        return Ok(String::new());
    }
    collect_line(transport, Vec::new())
}

/// Read one line, spending a single bounded transport read waiting for the
/// first byte. Returns an empty string if nothing arrives in time.
///
/// The resync routine uses this so each of its counted reads gives the
/// device one timeout's worth of opportunity to reply.
pub fn read_line_wait(transport: &mut dyn Transport) -> Result<String> {
    match transport.read_byte()? {
        None | Some(b'\r') | Some(b'\n') => Ok(String::new()),
        Some(first) => collect_line(transport, vec![first]),
    }
}

/// Accumulate bytes one at a time until a terminator, discarding empty
/// reads. Hitting the iteration ceiling is a fatal framing condition, not
/// an indefinite wait.
fn collect_line(transport: &mut dyn Transport, mut buf: Vec<u8>) -> Result<String> {
    for _ in 0..MAX_LINE_READS {
        match transport.read_byte()? {
            None => continue,
            Some(b'\r') | Some(b'\n') => return Ok(String::from_utf8_lossy(&buf).into_owned()),
            Some(byte) => buf.push(byte),
        }
    }
    Err(WsprError::Framing)
}
