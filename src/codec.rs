use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::frame::Frame;
use crate::parser::frame_length;

/// Raw heartbeat written back to the broker when it pings us.
pub const HEARTBEAT: &str = "\n";

/// Frame terminator.
pub const NUL: char = '\0';

/// Serialize a frame to wire text.
///
/// Layout: `COMMAND\n`, one `key:value\n` line per header in the order of
/// the frame's header collection, a blank line, the body and a single NUL.
/// The command line is omitted for an empty command. Header values are
/// written verbatim.
pub fn encode_frame(frame: &Frame) -> String {
    let headers_len: usize = frame
        .headers
        .iter()
        .map(|(k, v)| k.len() + v.len() + 2)
        .sum();
    let mut out = String::with_capacity(frame.command.len() + headers_len + frame.body.len() + 3);

    if !frame.command.is_empty() {
        out.push_str(&frame.command);
        out.push('\n');
    }
    for (k, v) in &frame.headers {
        out.push_str(k);
        out.push(':');
        out.push_str(v);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&frame.body);
    out.push(NUL);
    out
}

fn trim_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Parse wire text into a frame.
///
/// One leading empty line is skipped (the EOL that commonly trails the
/// previous frame). The first line is the command, which is empty for a
/// heartbeat. Header lines are split on their first colon, so values may
/// themselves contain colons; a later duplicate key overwrites an earlier
/// one. Everything after the blank line is the body, cut at the first NUL.
///
/// A trailing `\r` is stripped from the command and from every header line
/// so CRLF input parses. A header value that really ends in `\r` therefore
/// loses it: such values do not survive an encode/decode round trip.
///
/// Returns `None` for empty input.
pub fn decode_frame(text: &str) -> Option<Frame> {
    let text = match text.find(NUL) {
        Some(end) => &text[..end],
        None => text,
    };

    let mut lines = text.split('\n');
    let mut command = lines.next()?;
    if command.is_empty() {
        command = lines.next()?;
    }

    let mut frame = Frame::new(trim_cr(command));
    for line in lines.by_ref() {
        let line = trim_cr(line);
        if line.is_empty() {
            break;
        }
        match line.split_once(':') {
            Some((key, value)) => {
                frame.headers.insert(key, value);
            }
            None => debug!(line, "ignoring header line without ':'"),
        }
    }

    frame.body = lines.collect::<Vec<_>>().join("\n");
    Some(frame)
}

/// `StompCodec` implements `tokio_util::codec::{Decoder, Encoder}` for
/// byte-stream transports (plain TCP).
///
/// It does not interpret frames: the decoder splits the inbound buffer
/// into complete frame texts which the connection then hands to
/// [`decode_frame`], exactly like text received from a WebSocket.
///
/// Responsibilities:
/// - Yield [`HEARTBEAT`] for every EOL found between frames.
/// - Yield the full text of each NUL-terminated frame, honouring the
///   `content-length` header so a NUL inside a sized body does not end it.
/// - Leave the buffer untouched and return `Ok(None)` while a frame is
///   incomplete.
#[derive(Debug, Default)]
pub struct StompCodec {
    // Parsing works directly on the provided buffer; no state is kept
}

impl StompCodec {
    pub fn new() -> Self {
        Self {}
    }
}

impl Decoder for StompCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src[0] == b'\n' {
            src.advance(1);
            return Ok(Some(HEARTBEAT.to_string()));
        }
        if src[0] == b'\r' {
            if src.len() < 2 {
                return Ok(None);
            }
            if src[1] == b'\n' {
                src.advance(2);
                return Ok(Some(HEARTBEAT.to_string()));
            }
        }

        match frame_length(&src[..]) {
            Ok(Some(len)) => {
                let raw = src.split_to(len);
                String::from_utf8(raw.to_vec()).map(Some).map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("invalid utf8 in frame: {}", e),
                    )
                })
            }
            Ok(None) => Ok(None),
            Err(e) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("parse error: {}", e),
            )),
        }
    }
}

impl Encoder<String> for StompCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(item.as_bytes());
        Ok(())
    }
}
