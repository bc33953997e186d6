//! JSON envelope for the wire form of a message.
//!
//! The header travels under the reserved [`ENVELOPE_KEY`] object; user
//! properties sit at the top level beside it. A client command looks like:
//!
//! ```json
//! {
//!   "_ten": {
//!     "name": "hello_world",
//!     "seq_id": "137",
//!     "dest": [{ "app": "...", "graph": "0",
//!                "extension_group": "g1", "extension": "a" }]
//!   }
//! }
//! ```
//!
//! A missing `type` defaults to `cmd`, except when the name is one of the
//! reserved built-in command names, which select their own type.

use crate::error::MsgError;
use crate::message::{
    AudioFrameFields, CmdFields, CmdResultFields, DataFields, Message, Payload, PixelFormat,
    VideoFrameFields,
};
use uuid::Uuid;
use weft_types::{Location, MsgType, StatusCode};
use weft_value::Value;

/// Reserved top-level key carrying the message header.
pub const ENVELOPE_KEY: &str = "_ten";

type JsonMap = serde_json::Map<String, serde_json::Value>;

impl Message {
    /// Serialises this message into its envelope form.
    #[must_use]
    pub fn to_envelope(&self) -> serde_json::Value {
        let mut header = JsonMap::new();
        for (name, value, user_defined) in self.materialize_fields() {
            if user_defined {
                continue;
            }
            // Compact form: empty coordinates and tokens are implied.
            let skip = match name.as_str() {
                "name" | "seq_id" => matches!(&value, Value::String(s) if s.is_empty()),
                "src" => self.src().is_empty(),
                "dest" => self.dests().is_empty(),
                _ => false,
            };
            if skip {
                continue;
            }
            header.insert(name, value.to_serde_json());
        }

        let mut root = JsonMap::new();
        root.insert(
            ENVELOPE_KEY.to_string(),
            serde_json::Value::Object(header),
        );
        if let serde_json::Value::Object(props) = self.properties().to_serde_json() {
            for (k, v) in props {
                root.insert(k, v);
            }
        }
        serde_json::Value::Object(root)
    }

    /// Serialises this message into envelope JSON text.
    #[must_use]
    pub fn to_envelope_string(&self) -> String {
        self.to_envelope().to_string()
    }

    /// Parses envelope JSON text.
    pub fn from_envelope(text: &str) -> Result<Message, MsgError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| MsgError::Parse(e.to_string()))?;
        Self::from_envelope_value(value)
    }

    /// Parses an already-decoded envelope tree.
    pub fn from_envelope_value(value: serde_json::Value) -> Result<Message, MsgError> {
        let serde_json::Value::Object(mut root) = value else {
            return Err(MsgError::Parse("envelope must be an object".into()));
        };
        let Some(serde_json::Value::Object(header)) = root.shift_remove(ENVELOPE_KEY) else {
            return Err(MsgError::MissingEnvelope);
        };

        let name = header
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        let msg_type = match header.get("type").and_then(serde_json::Value::as_str) {
            Some(tag) => {
                MsgType::from_str_opt(tag).ok_or_else(|| MsgError::UnknownType(tag.into()))?
            }
            // Reserved names select their built-in type; everything else
            // is a plain command.
            None => match name.as_str() {
                "start_graph" => MsgType::CmdStartGraph,
                "stop_graph" => MsgType::CmdStopGraph,
                "timer" => MsgType::CmdTimer,
                "timeout" => MsgType::CmdTimeout,
                "close_app" => MsgType::CmdCloseApp,
                _ => MsgType::Cmd,
            },
        };

        let name = if name.is_empty() && msg_type.is_cmd_like() && msg_type != MsgType::Cmd {
            msg_type.as_str().to_string()
        } else {
            name
        };

        let str_field = |header: &JsonMap, key: &str| {
            header
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let i64_field = |header: &JsonMap, key: &str| {
            header.get(key).and_then(serde_json::Value::as_i64)
        };
        let i32_field = |header: &JsonMap, key: &str| {
            i64_field(header, key)
                .and_then(|n| i32::try_from(n).ok())
                .unwrap_or(0)
        };
        let buf_field = |header: &JsonMap, key: &str| -> Vec<u8> {
            header
                .get(key)
                .cloned()
                .map(Value::from_serde_json)
                .and_then(|v| v.get_buf().map(<[u8]>::to_vec).ok())
                .unwrap_or_default()
        };

        let payload = match msg_type {
            MsgType::CmdResult => {
                let status_raw = header
                    .get("status_code")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0);
                let status = u8::try_from(status_raw)
                    .ok()
                    .and_then(|n| StatusCode::try_from(n).ok())
                    .ok_or_else(|| {
                        MsgError::field("status_code", format!("unknown code {status_raw}"))
                    })?;
                Payload::CmdResult(CmdResultFields {
                    cmd_id: str_field(&header, "cmd_id"),
                    seq_id: str_field(&header, "seq_id"),
                    status,
                    is_final: header
                        .get("is_final")
                        .and_then(serde_json::Value::as_bool)
                        .unwrap_or(true),
                })
            }
            MsgType::Data => Payload::Data(DataFields {
                buf: buf_field(&header, "buf"),
            }),
            MsgType::AudioFrame => Payload::AudioFrame(AudioFrameFields {
                timestamp: i64_field(&header, "frame_timestamp").unwrap_or(0),
                sample_rate: i32_field(&header, "sample_rate"),
                channels: i32_field(&header, "channels"),
                bytes_per_sample: i32_field(&header, "bytes_per_sample"),
                samples_per_channel: i32_field(&header, "samples_per_channel"),
                buf: buf_field(&header, "buf"),
            }),
            MsgType::VideoFrame => {
                let fmt_name = str_field(&header, "pixel_format");
                let pixel_format = if fmt_name.is_empty() {
                    PixelFormat::default()
                } else {
                    PixelFormat::from_str_opt(&fmt_name).ok_or_else(|| {
                        MsgError::field("pixel_format", format!("unknown pixel format '{fmt_name}'"))
                    })?
                };
                Payload::VideoFrame(VideoFrameFields {
                    timestamp: i64_field(&header, "frame_timestamp").unwrap_or(0),
                    width: i32_field(&header, "width"),
                    height: i32_field(&header, "height"),
                    pixel_format,
                    buf: buf_field(&header, "buf"),
                })
            }
            // Every remaining type is a command.
            _ => {
                let cmd_id = match str_field(&header, "cmd_id") {
                    id if id.is_empty() => Uuid::new_v4().to_string(),
                    id => id,
                };
                Payload::Cmd(CmdFields {
                    cmd_id,
                    seq_id: str_field(&header, "seq_id"),
                })
            }
        };

        let mut msg = Message::with_payload(msg_type, name, payload);

        if let Some(src) = header.get("src") {
            let loc: Location = serde_json::from_value(src.clone())
                .map_err(|e| MsgError::field("src", e.to_string()))?;
            msg.set_src(loc);
        }
        if let Some(dest) = header.get("dest") {
            let dests: Vec<Location> = serde_json::from_value(dest.clone())
                .map_err(|e| MsgError::field("dest", e.to_string()))?;
            msg.set_dests(dests);
        }
        if let Some(us) = i64_field(&header, "timestamp") {
            msg.set_timestamp_us(us);
        }

        msg.set_properties(Value::from_serde_json(serde_json::Value::Object(root)));
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_command_parses_with_defaults() {
        let msg = Message::from_envelope(
            r#"{
                "_ten": {
                    "name": "hello_world",
                    "seq_id": "137",
                    "dest": [{
                        "app": "msgpack://127.0.0.1:8001/",
                        "graph": "0",
                        "extension_group": "g1",
                        "extension": "a"
                    }]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(msg.msg_type(), MsgType::Cmd);
        assert_eq!(msg.name(), "hello_world");
        assert_eq!(msg.seq_id(), Some("137"));
        assert!(!msg.cmd_id().unwrap().is_empty());
        assert_eq!(msg.dests().len(), 1);
        assert_eq!(msg.dests()[0].extension.as_deref(), Some("a"));
    }

    #[test]
    fn reserved_name_selects_builtin_type() {
        let msg = Message::from_envelope(r#"{"_ten": {"name": "stop_graph"}}"#).unwrap();
        assert_eq!(msg.msg_type(), MsgType::CmdStopGraph);
    }

    #[test]
    fn envelope_round_trip_cmd() {
        let mut cmd = Message::cmd("hello_world");
        cmd.set_seq_id("9");
        cmd.set_src(Location::extension("u", "0", "g", "a"));
        cmd.add_dest(Location::extension("u", "0", "g", "b"));
        cmd.set_property("k", Value::from("v")).unwrap();
        cmd.set_property("n", Value::from(3i64)).unwrap();

        let back = Message::from_envelope(&cmd.to_envelope_string()).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn envelope_round_trip_result() {
        let mut cmd = Message::cmd("op");
        cmd.set_seq_id("5");
        cmd.set_src(Location::extension("u", "0", "g", "a"));
        let mut result =
            Message::cmd_result_for(StatusCode::Timeout, &cmd).with_is_final(false);
        result.set_property("detail", Value::from("late")).unwrap();

        let back = Message::from_envelope(&result.to_envelope_string()).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.status_code(), Some(StatusCode::Timeout));
        assert_eq!(back.is_final(), Some(false));
    }

    #[test]
    fn envelope_round_trip_data_frame() {
        let mut data = Message::data("chunk").with_buf(vec![0, 1, 254, 255]);
        data.set_src(Location::extension("u", "0", "g", "a"));
        data.add_dest(Location::extension("u", "0", "g", "b"));

        let back = Message::from_envelope(&data.to_envelope_string()).unwrap();
        assert_eq!(back, data);
        assert_eq!(back.buf(), Some(&[0u8, 1, 254, 255][..]));
    }

    #[test]
    fn envelope_round_trip_video_frame() {
        let mut frame = Message::video_frame("camera");
        if let Payload::VideoFrame(v) = frame.payload_mut() {
            v.width = 640;
            v.height = 480;
            v.pixel_format = PixelFormat::I420;
            v.timestamp = 123;
        }
        frame.set_buf(vec![7; 16]);

        let back = Message::from_envelope(&frame.to_envelope_string()).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn user_properties_sit_beside_the_header() {
        let mut cmd = Message::cmd("op");
        cmd.set_property("retries", Value::from(2i64)).unwrap();

        let envelope = cmd.to_envelope();
        assert!(envelope.get(ENVELOPE_KEY).is_some());
        assert_eq!(envelope["retries"], 2);
        // Properties never leak into the header object.
        assert!(envelope[ENVELOPE_KEY].get("retries").is_none());
    }

    #[test]
    fn missing_header_object_is_an_error() {
        let err = Message::from_envelope(r#"{"name": "x"}"#).unwrap_err();
        assert_eq!(err, MsgError::MissingEnvelope);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let err =
            Message::from_envelope(r#"{"_ten": {"type": "blob", "name": "x"}}"#).unwrap_err();
        assert!(matches!(err, MsgError::UnknownType(_)));
    }

    #[test]
    fn unknown_status_code_is_an_error() {
        let err = Message::from_envelope(
            r#"{"_ten": {"type": "cmd_result", "status_code": 200}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, MsgError::Field { .. }));
    }
}
