//! The message type and its payloads.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use weft_types::{Location, MsgType, StatusCode};
use weft_value::{Value, ValueError};

/// Correlation fields carried by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdFields {
    /// Immutable correlation id, minted at construction.
    pub cmd_id: String,
    /// Client-chosen correlation token; empty when unset.
    pub seq_id: String,
}

/// Fields carried by a command result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdResultFields {
    /// Correlation id copied from the command being answered.
    pub cmd_id: String,
    /// Correlation token copied from the command being answered.
    pub seq_id: String,
    /// Outcome of the command.
    pub status: StatusCode,
    /// Whether this result terminates the command. Streaming results set
    /// this to `false`; finality is never inferred from the status code.
    pub is_final: bool,
}

/// Payload of a data frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataFields {
    /// Opaque bytes.
    pub buf: Vec<u8>,
}

/// Payload of an audio frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioFrameFields {
    /// Capture timestamp in microseconds.
    pub timestamp: i64,
    /// Samples per second.
    pub sample_rate: i32,
    /// Channel count.
    pub channels: i32,
    /// Bytes per sample.
    pub bytes_per_sample: i32,
    /// Samples per channel in this frame.
    pub samples_per_channel: i32,
    /// Sample data.
    pub buf: Vec<u8>,
}

/// Pixel layouts understood by video frame consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 24-bit RGB.
    #[default]
    Rgb24,
    /// 32-bit RGBA.
    Rgba,
    /// 24-bit BGR.
    Bgr24,
    /// 32-bit BGRA.
    Bgra,
    /// Planar YUV 4:2:0.
    I420,
    /// Semi-planar YUV 4:2:0, UV interleaved.
    Nv12,
    /// Semi-planar YUV 4:2:0, VU interleaved.
    Nv21,
}

impl PixelFormat {
    /// The wire name of this format.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rgb24 => "rgb24",
            Self::Rgba => "rgba",
            Self::Bgr24 => "bgr24",
            Self::Bgra => "bgra",
            Self::I420 => "i420",
            Self::Nv12 => "nv12",
            Self::Nv21 => "nv21",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "rgb24" => Self::Rgb24,
            "rgba" => Self::Rgba,
            "bgr24" => Self::Bgr24,
            "bgra" => Self::Bgra,
            "i420" => Self::I420,
            "nv12" => Self::Nv12,
            "nv21" => Self::Nv21,
            _ => return None,
        })
    }
}

/// Payload of a video frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFrameFields {
    /// Capture timestamp in microseconds.
    pub timestamp: i64,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Pixel layout of `buf`.
    pub pixel_format: PixelFormat,
    /// Pixel data.
    pub buf: Vec<u8>,
}

/// Typed payload of a message, selected by its [`MsgType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No payload beyond the header.
    None,
    /// Command correlation fields (all `Cmd*` types except results).
    Cmd(CmdFields),
    /// Result fields.
    CmdResult(CmdResultFields),
    /// Data frame.
    Data(DataFields),
    /// Audio frame.
    AudioFrame(AudioFrameFields),
    /// Video frame.
    VideoFrame(VideoFrameFields),
}

/// Shared part of a message: user properties plus the typed payload.
#[derive(Debug, Clone, PartialEq)]
struct Body {
    properties: Value,
    payload: Payload,
}

/// A message moving through the runtime.
///
/// See the [crate docs](crate) for the ownership model. The per-handle
/// header (type, name, src, dests, timestamp) is cheap to rewrite; the
/// body is shared between fan-out handles and copied on first write.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    msg_type: MsgType,
    name: String,
    src: Location,
    dests: Vec<Location>,
    timestamp_us: i64,
    body: Arc<Body>,
}

fn now_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

impl Message {
    pub(crate) fn with_payload(msg_type: MsgType, name: impl Into<String>, payload: Payload) -> Self {
        Self {
            msg_type,
            name: name.into(),
            src: Location::empty(),
            dests: Vec::new(),
            timestamp_us: now_us(),
            body: Arc::new(Body {
                properties: Value::object(),
                payload,
            }),
        }
    }

    /// Inserts a top-level property. The property tree is always an
    /// object, so a plain key insert cannot fail.
    fn insert_property(&mut self, key: &str, value: Value) {
        if let Some(map) = self.properties_mut().as_object_mut() {
            map.insert(key, value);
        }
    }

    fn fresh_cmd_fields() -> CmdFields {
        CmdFields {
            cmd_id: Uuid::new_v4().to_string(),
            seq_id: String::new(),
        }
    }

    /// Creates an application-defined command with a fresh `cmd_id`.
    #[must_use]
    pub fn cmd(name: impl Into<String>) -> Self {
        Self::with_payload(MsgType::Cmd, name, Payload::Cmd(Self::fresh_cmd_fields()))
    }

    /// Creates a `start_graph` command carrying a graph descriptor.
    ///
    /// The descriptor sits in the `graph` property.
    #[must_use]
    pub fn start_graph(graph: Value) -> Self {
        let mut msg = Self::with_payload(
            MsgType::CmdStartGraph,
            "start_graph",
            Payload::Cmd(Self::fresh_cmd_fields()),
        );
        msg.insert_property("graph", graph);
        msg
    }

    /// Creates a `stop_graph` command. The target graph is named by the
    /// destination location.
    #[must_use]
    pub fn stop_graph() -> Self {
        Self::with_payload(
            MsgType::CmdStopGraph,
            "stop_graph",
            Payload::Cmd(Self::fresh_cmd_fields()),
        )
    }

    /// Creates a `timer` command arming an engine timer.
    ///
    /// `times` is the number of firings; `0` fires until cancelled.
    #[must_use]
    pub fn timer(timer_id: impl Into<String>, timeout_us: i64, times: i64) -> Self {
        let mut msg = Self::with_payload(
            MsgType::CmdTimer,
            "timer",
            Payload::Cmd(Self::fresh_cmd_fields()),
        );
        msg.insert_property("timer_id", Value::from(timer_id.into()));
        msg.insert_property("timeout_us", Value::from(timeout_us));
        msg.insert_property("times", Value::from(times));
        msg
    }

    /// Creates a `timer` command cancelling a previously armed timer.
    #[must_use]
    pub fn timer_cancel(timer_id: impl Into<String>) -> Self {
        let mut msg = Self::with_payload(
            MsgType::CmdTimer,
            "timer",
            Payload::Cmd(Self::fresh_cmd_fields()),
        );
        msg.insert_property("timer_id", Value::from(timer_id.into()));
        msg.insert_property("cancel", Value::from(true));
        msg
    }

    /// Creates a `timeout` command, fired by the engine when a timer
    /// elapses.
    #[must_use]
    pub fn timeout(timer_id: impl Into<String>) -> Self {
        let mut msg = Self::with_payload(
            MsgType::CmdTimeout,
            "timeout",
            Payload::Cmd(Self::fresh_cmd_fields()),
        );
        msg.insert_property("timer_id", Value::from(timer_id.into()));
        msg
    }

    /// Creates a `close_app` command.
    #[must_use]
    pub fn close_app() -> Self {
        Self::with_payload(
            MsgType::CmdCloseApp,
            "close_app",
            Payload::Cmd(Self::fresh_cmd_fields()),
        )
    }

    /// Creates a bare result with the given status. Final by default.
    ///
    /// Use [`cmd_result_for`](Self::cmd_result_for) to copy correlation
    /// fields from the command being answered.
    #[must_use]
    pub fn cmd_result(status: StatusCode) -> Self {
        Self::with_payload(
            MsgType::CmdResult,
            "",
            Payload::CmdResult(CmdResultFields {
                cmd_id: String::new(),
                seq_id: String::new(),
                status,
                is_final: true,
            }),
        )
    }

    /// Creates a result correlated with `cmd`: `cmd_id` and `seq_id` are
    /// copied, and the command's source becomes the destination.
    #[must_use]
    pub fn cmd_result_for(status: StatusCode, cmd: &Message) -> Self {
        let mut result = Self::cmd_result(status);
        result.correlate_with(cmd);
        result
    }

    /// Sets correlation fields directly. Intended for results synthesized
    /// without access to the original command (timeouts, cancellations).
    #[must_use]
    pub fn with_correlation(
        mut self,
        cmd_id: impl Into<String>,
        seq_id: impl Into<String>,
    ) -> Self {
        match &mut Arc::make_mut(&mut self.body).payload {
            Payload::Cmd(f) => {
                f.cmd_id = cmd_id.into();
                f.seq_id = seq_id.into();
            }
            Payload::CmdResult(f) => {
                f.cmd_id = cmd_id.into();
                f.seq_id = seq_id.into();
            }
            _ => {}
        }
        self
    }

    /// Copies correlation fields and the reply destination from `cmd`.
    pub fn correlate_with(&mut self, cmd: &Message) {
        if let Payload::CmdResult(fields) = &mut Arc::make_mut(&mut self.body).payload {
            fields.cmd_id = cmd.cmd_id().unwrap_or_default().to_string();
            fields.seq_id = cmd.seq_id().unwrap_or_default().to_string();
        }
        self.dests = vec![cmd.src.clone()];
    }

    /// Creates a data frame.
    #[must_use]
    pub fn data(name: impl Into<String>) -> Self {
        Self::with_payload(MsgType::Data, name, Payload::Data(DataFields::default()))
    }

    /// Creates an audio frame.
    #[must_use]
    pub fn audio_frame(name: impl Into<String>) -> Self {
        Self::with_payload(
            MsgType::AudioFrame,
            name,
            Payload::AudioFrame(AudioFrameFields::default()),
        )
    }

    /// Creates a video frame.
    #[must_use]
    pub fn video_frame(name: impl Into<String>) -> Self {
        Self::with_payload(
            MsgType::VideoFrame,
            name,
            Payload::VideoFrame(VideoFrameFields::default()),
        )
    }

    // --- header accessors -------------------------------------------------

    /// The message type tag.
    #[must_use]
    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    pub(crate) fn set_msg_type(&mut self, msg_type: MsgType) {
        self.msg_type = msg_type;
    }

    /// The application-chosen name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Source location.
    #[must_use]
    pub fn src(&self) -> &Location {
        &self.src
    }

    /// Stamps the source location.
    pub fn set_src(&mut self, src: Location) {
        self.src = src;
    }

    /// Destination set.
    #[must_use]
    pub fn dests(&self) -> &[Location] {
        &self.dests
    }

    /// Replaces the destination set.
    pub fn set_dests(&mut self, dests: Vec<Location>) {
        self.dests = dests;
    }

    /// Appends a destination.
    pub fn add_dest(&mut self, dest: Location) {
        self.dests.push(dest);
    }

    /// Builder form of [`add_dest`](Self::add_dest).
    #[must_use]
    pub fn with_dest(mut self, dest: Location) -> Self {
        self.add_dest(dest);
        self
    }

    /// Creation timestamp in microseconds since the epoch.
    #[must_use]
    pub fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }

    pub(crate) fn set_timestamp_us(&mut self, us: i64) {
        self.timestamp_us = us;
    }

    // --- command / result fields ------------------------------------------

    /// Correlation id, for commands and results.
    #[must_use]
    pub fn cmd_id(&self) -> Option<&str> {
        match &self.body.payload {
            Payload::Cmd(f) => Some(&f.cmd_id),
            Payload::CmdResult(f) => Some(&f.cmd_id),
            _ => None,
        }
    }

    pub(crate) fn set_cmd_id(&mut self, cmd_id: impl Into<String>) {
        match &mut Arc::make_mut(&mut self.body).payload {
            Payload::Cmd(f) => f.cmd_id = cmd_id.into(),
            Payload::CmdResult(f) => f.cmd_id = cmd_id.into(),
            _ => {}
        }
    }

    /// Client-chosen correlation token, for commands and results.
    #[must_use]
    pub fn seq_id(&self) -> Option<&str> {
        match &self.body.payload {
            Payload::Cmd(f) => Some(&f.seq_id),
            Payload::CmdResult(f) => Some(&f.seq_id),
            _ => None,
        }
    }

    /// Sets the correlation token. No-op for payload types without one.
    pub fn set_seq_id(&mut self, seq_id: impl Into<String>) {
        match &mut Arc::make_mut(&mut self.body).payload {
            Payload::Cmd(f) => f.seq_id = seq_id.into(),
            Payload::CmdResult(f) => f.seq_id = seq_id.into(),
            _ => {}
        }
    }

    /// Result status, if this is a result.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        match &self.body.payload {
            Payload::CmdResult(f) => Some(f.status),
            _ => None,
        }
    }

    /// Result finality, if this is a result.
    #[must_use]
    pub fn is_final(&self) -> Option<bool> {
        match &self.body.payload {
            Payload::CmdResult(f) => Some(f.is_final),
            _ => None,
        }
    }

    /// Marks a result as streaming (`false`) or terminal (`true`).
    #[must_use]
    pub fn with_is_final(mut self, is_final: bool) -> Self {
        if let Payload::CmdResult(f) = &mut Arc::make_mut(&mut self.body).payload {
            f.is_final = is_final;
        }
        self
    }

    // --- payload ----------------------------------------------------------

    /// Borrows the typed payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.body.payload
    }

    /// Mutably borrows the typed payload, copying the body if it is
    /// currently shared with fan-out handles.
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut Arc::make_mut(&mut self.body).payload
    }

    /// Replaces the byte buffer of a data, audio or video payload.
    /// No-op for other payload types.
    pub fn set_buf(&mut self, buf: Vec<u8>) {
        match self.payload_mut() {
            Payload::Data(f) => f.buf = buf,
            Payload::AudioFrame(f) => f.buf = buf,
            Payload::VideoFrame(f) => f.buf = buf,
            _ => {}
        }
    }

    /// Builder form of [`set_buf`](Self::set_buf).
    #[must_use]
    pub fn with_buf(mut self, buf: Vec<u8>) -> Self {
        self.set_buf(buf);
        self
    }

    /// Borrows the byte buffer of a data, audio or video payload.
    #[must_use]
    pub fn buf(&self) -> Option<&[u8]> {
        match &self.body.payload {
            Payload::Data(f) => Some(&f.buf),
            Payload::AudioFrame(f) => Some(&f.buf),
            Payload::VideoFrame(f) => Some(&f.buf),
            _ => None,
        }
    }

    // --- properties -------------------------------------------------------

    /// Borrows the user property tree (always an object).
    #[must_use]
    pub fn properties(&self) -> &Value {
        &self.body.properties
    }

    /// Mutably borrows the property tree, copying the body if it is
    /// currently shared with fan-out handles.
    pub fn properties_mut(&mut self) -> &mut Value {
        &mut Arc::make_mut(&mut self.body).properties
    }

    /// Replaces the whole property tree. The value must be an object.
    pub(crate) fn set_properties(&mut self, properties: Value) {
        Arc::make_mut(&mut self.body).properties = properties;
    }

    /// Borrows the property at a dotted path.
    #[must_use]
    pub fn peek_property(&self, path: &str) -> Option<&Value> {
        self.body.properties.peek_path(path)
    }

    /// Clones the property at a dotted path.
    #[must_use]
    pub fn get_property(&self, path: &str) -> Option<Value> {
        self.body.properties.get_path(path)
    }

    /// Writes a property at a dotted path.
    pub fn set_property(&mut self, path: &str, value: Value) -> Result<(), ValueError> {
        self.properties_mut().set_path(path, value)
    }

    /// Sets the conventional `detail` property carried by results.
    ///
    /// Inserting a plain key into the property object cannot fail, which
    /// makes this safe to use in default callback paths.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.insert_property("detail", Value::from(detail.into()));
        self
    }

    /// Reads the conventional `detail` property.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.peek_property("detail").and_then(|v| v.get_string().ok())
    }

    // --- fan-out ----------------------------------------------------------

    /// Produces a handle addressed at a single destination, sharing the
    /// body with `self` until either side mutates it.
    #[must_use]
    pub fn clone_for_fanout(&self, dest: Location) -> Self {
        let mut clone = self.clone();
        clone.dests = vec![dest];
        clone
    }

    /// Returns `true` if two handles still share one body.
    #[must_use]
    pub fn shares_body_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_gets_a_fresh_uuid() {
        let a = Message::cmd("ping");
        let b = Message::cmd("ping");
        assert!(a.cmd_id().is_some());
        assert_ne!(a.cmd_id(), b.cmd_id());
        assert_eq!(a.seq_id(), Some(""));
    }

    #[test]
    fn result_copies_correlation_from_cmd() {
        let mut cmd = Message::cmd("hello_world");
        cmd.set_seq_id("137");
        cmd.set_src(Location::extension("uri", "0", "g1", "a"));

        let result = Message::cmd_result_for(StatusCode::Ok, &cmd);
        assert_eq!(result.cmd_id(), cmd.cmd_id());
        assert_eq!(result.seq_id(), Some("137"));
        assert_eq!(result.dests(), &[cmd.src().clone()]);
        assert_eq!(result.is_final(), Some(true));
    }

    #[test]
    fn streaming_result_is_marked_explicitly() {
        let result = Message::cmd_result(StatusCode::Ok).with_is_final(false);
        assert_eq!(result.is_final(), Some(false));
        // Finality never comes from the status code.
        assert_eq!(result.status_code(), Some(StatusCode::Ok));
    }

    #[test]
    fn fanout_shares_body_until_mutation() {
        let mut original = Message::data("frame");
        original.set_property("shared", Value::from(1i64)).unwrap();

        let mut fanned = original.clone_for_fanout(Location::extension("u", "0", "g", "x"));
        assert!(fanned.shares_body_with(&original));
        assert_eq!(fanned.dests().len(), 1);

        // First write on the fan-out handle detaches it.
        fanned.set_property("private", Value::from(2i64)).unwrap();
        assert!(!fanned.shares_body_with(&original));
        assert!(original.peek_property("private").is_none());
        assert!(fanned.peek_property("shared").is_some());
    }

    #[test]
    fn set_buf_applies_to_frame_payloads() {
        let data = Message::data("d").with_buf(vec![1, 2, 3]);
        assert_eq!(data.buf(), Some(&[1u8, 2, 3][..]));

        let mut cmd = Message::cmd("c");
        cmd.set_buf(vec![9]);
        assert_eq!(cmd.buf(), None);
    }

    #[test]
    fn start_graph_carries_descriptor_property() {
        let graph = Value::from_json(r#"{"nodes": []}"#).unwrap();
        let msg = Message::start_graph(graph);
        assert_eq!(msg.msg_type(), MsgType::CmdStartGraph);
        assert!(msg.peek_property("graph.nodes").is_some());
    }

    #[test]
    fn timer_properties() {
        let msg = Message::timer("t1", 5_000, 3);
        assert_eq!(
            msg.peek_property("timer_id").unwrap().get_string().unwrap(),
            "t1"
        );
        assert_eq!(
            msg.peek_property("timeout_us").unwrap().get_int64().unwrap(),
            5_000
        );
        assert_eq!(msg.peek_property("times").unwrap().get_int64().unwrap(), 3);

        let cancel = Message::timer_cancel("t1");
        assert_eq!(
            cancel.peek_property("cancel").unwrap().get_bool().unwrap(),
            true
        );
    }

    #[test]
    fn audio_frame_field_defaults() {
        let mut frame = Message::audio_frame("pcm");
        if let Payload::AudioFrame(f) = frame.payload_mut() {
            f.sample_rate = 16_000;
            f.channels = 1;
        }
        match frame.payload() {
            Payload::AudioFrame(f) => {
                assert_eq!(f.sample_rate, 16_000);
                assert_eq!(f.samples_per_channel, 0);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn pixel_format_names_round_trip() {
        for fmt in [
            PixelFormat::Rgb24,
            PixelFormat::Rgba,
            PixelFormat::Bgr24,
            PixelFormat::Bgra,
            PixelFormat::I420,
            PixelFormat::Nv12,
            PixelFormat::Nv21,
        ] {
            assert_eq!(PixelFormat::from_str_opt(fmt.as_str()), Some(fmt));
        }
    }
}
