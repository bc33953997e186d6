//! Transport-agnostic frame codec contract.
//!
//! The engine does not assume any particular framing: a transport owns a
//! [`Protocol`] instance, feeds it raw bytes as they arrive (in whatever
//! fragments the transport produces) and injects every decoded message
//! through [`App::ingress`](crate::App::ingress), the same path
//! in-process messages take.
//!
//! [`JsonFraming`] is the reference plug-in: a 4-byte big-endian length
//! prefix followed by the message's JSON envelope. A frame that fails to
//! parse is dropped with a warning and decoding continues with the next
//! frame.

use tracing::warn;
use weft_msg::Message;
use weft_types::ErrorCode;

/// Protocol layer error.
///
/// | Error | Code | Recoverable |
/// |-------|------|-------------|
/// | [`FrameTooLarge`](ProtocolError::FrameTooLarge) | `PROTOCOL_FRAME_TOO_LARGE` | No |
/// | [`Encode`](ProtocolError::Encode) | `PROTOCOL_ENCODE` | No |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A declared frame length exceeds the configured bound; the stream
    /// is considered corrupt.
    #[error("frame of {0} bytes exceeds the configured maximum")]
    FrameTooLarge(usize),

    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

impl ErrorCode for ProtocolError {
    fn code(&self) -> &'static str {
        match self {
            Self::FrameTooLarge(_) => "PROTOCOL_FRAME_TOO_LARGE",
            Self::Encode(_) => "PROTOCOL_ENCODE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// A stateful frame codec.
///
/// Implementations must tolerate arbitrary fragmentation: `decode` may
/// be called with half a frame, three frames, or a single byte, and
/// returns every message completed so far.
pub trait Protocol: Send {
    /// Encodes one message into wire bytes.
    fn encode(&mut self, msg: &Message) -> Result<Vec<u8>, ProtocolError>;

    /// Feeds raw bytes into the parser and returns completed messages.
    ///
    /// Frames whose payload fails to parse are dropped (with a warning);
    /// the parser stays usable for subsequent frames.
    fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Message>, ProtocolError>;
}

/// Default bound on a single frame.
const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Length-prefixed JSON-envelope framing.
#[derive(Debug)]
pub struct JsonFraming {
    buf: Vec<u8>,
    max_frame: usize,
}

impl JsonFraming {
    /// Creates a codec with the default frame bound.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Creates a codec with an explicit frame bound.
    #[must_use]
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame,
        }
    }
}

impl Default for JsonFraming {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for JsonFraming {
    fn encode(&mut self, msg: &Message) -> Result<Vec<u8>, ProtocolError> {
        let payload = msg.to_envelope_string().into_bytes();
        if payload.len() > self.max_frame {
            return Err(ProtocolError::FrameTooLarge(payload.len()));
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| ProtocolError::FrameTooLarge(payload.len()))?;
        let mut out = Vec::with_capacity(4 + payload.len());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Message>, ProtocolError> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();

        loop {
            if self.buf.len() < 4 {
                break;
            }
            let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]])
                as usize;
            if len > self.max_frame {
                self.buf.clear();
                return Err(ProtocolError::FrameTooLarge(len));
            }
            if self.buf.len() < 4 + len {
                break;
            }
            let payload: Vec<u8> = self.buf.drain(..4 + len).skip(4).collect();
            match std::str::from_utf8(&payload)
                .map_err(|e| e.to_string())
                .and_then(|text| Message::from_envelope(text).map_err(|e| e.to_string()))
            {
                Ok(msg) => out.push(msg),
                Err(e) => warn!(error = %e, "dropping undecodable frame"),
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::Location;

    fn sample_cmd(seq: &str) -> Message {
        let mut cmd = Message::cmd("hello_world");
        cmd.set_seq_id(seq);
        cmd.add_dest(Location::extension("u", "0", "g", "b"));
        cmd
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut codec = JsonFraming::new();
        let msg = sample_cmd("1");

        let bytes = codec.encode(&msg).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn decode_survives_byte_at_a_time_fragmentation() {
        let mut codec = JsonFraming::new();
        let msg = sample_cmd("2");
        let bytes = codec.encode(&msg).unwrap();

        let mut decoded = Vec::new();
        for b in bytes {
            decoded.extend(codec.decode(&[b]).unwrap());
        }
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn decode_handles_coalesced_frames() {
        let mut codec = JsonFraming::new();
        let a = sample_cmd("a");
        let b = Message::data("frame").with_buf(vec![1, 2, 3]);

        let mut stream = codec.encode(&a).unwrap();
        stream.extend(codec.encode(&b).unwrap());

        let decoded = codec.decode(&stream).unwrap();
        assert_eq!(decoded, vec![a, b]);
    }

    #[test]
    fn bad_frame_is_dropped_and_stream_continues() {
        let mut codec = JsonFraming::new();

        // A frame carrying junk, followed by a good frame.
        let junk = b"not json at all";
        let mut stream = Vec::new();
        stream.extend_from_slice(&(junk.len() as u32).to_be_bytes());
        stream.extend_from_slice(junk);
        let good = sample_cmd("3");
        stream.extend(codec.encode(&good).unwrap());

        let decoded = codec.decode(&stream).unwrap();
        assert_eq!(decoded, vec![good]);
    }

    #[test]
    fn oversized_frame_is_fatal_for_the_stream() {
        let mut codec = JsonFraming::with_max_frame(8);
        let stream = 1024u32.to_be_bytes();
        let err = codec.decode(&stream).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge(_)));
    }

    #[test]
    fn oversized_message_refuses_to_encode() {
        let mut codec = JsonFraming::with_max_frame(8);
        let err = codec.encode(&sample_cmd("4")).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge(_)));
    }
}
