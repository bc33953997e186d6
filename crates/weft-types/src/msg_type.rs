//! Message type tags.

use serde::{Deserialize, Serialize};

/// The type of a message moving through the runtime.
///
/// Commands expect exactly one final result; data and frame messages are
/// one-way. The `Cmd*` variants other than [`Cmd`](Self::Cmd) are the
/// built-in commands the runtime itself understands.
///
/// | variant | direction | result |
/// |---------|-----------|--------|
/// | `Cmd` | extension → extension | yes |
/// | `CmdResult` | backwards along the command's path | n/a |
/// | `Data`, `AudioFrame`, `VideoFrame` | extension → extension | no |
/// | `CmdStartGraph`, `CmdStopGraph`, `CmdCloseApp` | client → app/engine | yes |
/// | `CmdTimer`, `CmdTimeout` | extension ↔ engine | yes / delivered |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgType {
    /// Application-defined command.
    Cmd,
    /// Result for a previously issued command.
    CmdResult,
    /// One-way data frame.
    Data,
    /// One-way audio frame.
    AudioFrame,
    /// One-way video frame.
    VideoFrame,
    /// Built-in: start a graph described in the command payload.
    CmdStartGraph,
    /// Built-in: stop a running graph.
    CmdStopGraph,
    /// Built-in: arm or cancel an engine timer.
    CmdTimer,
    /// Built-in: a timer fired.
    CmdTimeout,
    /// Built-in: shut the whole application down.
    CmdCloseApp,
}

impl MsgType {
    /// Returns `true` for every command variant (anything that expects a
    /// result), excluding `CmdResult` itself.
    #[must_use]
    pub fn is_cmd_like(&self) -> bool {
        matches!(
            self,
            Self::Cmd
                | Self::CmdStartGraph
                | Self::CmdStopGraph
                | Self::CmdTimer
                | Self::CmdTimeout
                | Self::CmdCloseApp
        )
    }

    /// Returns `true` for the one-way payload-carrying variants.
    #[must_use]
    pub fn is_frame_like(&self) -> bool {
        matches!(self, Self::Data | Self::AudioFrame | Self::VideoFrame)
    }

    /// The wire name of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cmd => "cmd",
            Self::CmdResult => "cmd_result",
            Self::Data => "data",
            Self::AudioFrame => "audio_frame",
            Self::VideoFrame => "video_frame",
            Self::CmdStartGraph => "start_graph",
            Self::CmdStopGraph => "stop_graph",
            Self::CmdTimer => "timer",
            Self::CmdTimeout => "timeout",
            Self::CmdCloseApp => "close_app",
        }
    }

    /// Parses a wire name back into a tag.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "cmd" => Self::Cmd,
            "cmd_result" => Self::CmdResult,
            "data" => Self::Data,
            "audio_frame" => Self::AudioFrame,
            "video_frame" => Self::VideoFrame,
            "start_graph" => Self::CmdStartGraph,
            "stop_graph" => Self::CmdStopGraph,
            "timer" => Self::CmdTimer,
            "timeout" => Self::CmdTimeout,
            "close_app" => Self::CmdCloseApp,
            _ => return None,
        })
    }
}

impl std::fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
