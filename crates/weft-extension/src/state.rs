//! Extension lifecycle states and phases.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one extension.
///
/// Transitions are driven exclusively by the owning engine; extensions
/// acknowledge each phase through their env. [`Faulted`](Self::Faulted) is
/// reachable from any state when a callback panics and is contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionState {
    /// Constructed, not yet wired into a graph.
    #[default]
    Created,
    /// `on_configure` has been entered.
    Configuring,
    /// `init_done` acknowledged; resources acquired.
    Inited,
    /// `on_start` has been entered; the graph is fully wired.
    Starting,
    /// All extensions started; user traffic flows.
    Running,
    /// `on_stop` has been entered.
    Stopping,
    /// `deinit_done` acknowledged; resources released.
    Deinited,
    /// Removed from its group; no callback will run again.
    Destroyed,
    /// A callback panicked; the extension is quarantined.
    Faulted,
}

impl ExtensionState {
    /// Returns `true` once no further callbacks may run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Destroyed | Self::Faulted)
    }

    /// Returns `true` while the extension may receive user messages.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Configuring => "configuring",
            Self::Inited => "inited",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Deinited => "deinited",
            Self::Destroyed => "destroyed",
            Self::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// One of the five engine-driven lifecycle phases.
///
/// Startup runs `Configure → Init → Start` as barriers across the whole
/// graph; shutdown runs `Stop → Deinit` the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Declare properties and schemas.
    Configure,
    /// Acquire resources.
    Init,
    /// The graph is fully wired; begin work.
    Start,
    /// Graceful shutdown begins.
    Stop,
    /// Release resources.
    Deinit,
}

impl LifecyclePhase {
    /// The state an extension enters when this phase's callback begins.
    #[must_use]
    pub fn entry_state(&self) -> ExtensionState {
        match self {
            Self::Configure => ExtensionState::Configuring,
            Self::Init => ExtensionState::Configuring,
            Self::Start => ExtensionState::Starting,
            Self::Stop => ExtensionState::Stopping,
            Self::Deinit => ExtensionState::Stopping,
        }
    }

    /// The state an extension reaches when this phase is acknowledged.
    #[must_use]
    pub fn ack_state(&self) -> ExtensionState {
        match self {
            Self::Configure => ExtensionState::Configuring,
            Self::Init => ExtensionState::Inited,
            Self::Start => ExtensionState::Running,
            Self::Stop => ExtensionState::Stopping,
            Self::Deinit => ExtensionState::Deinited,
        }
    }

    /// Phase name for logs and acks.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Init => "init",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Deinit => "deinit",
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
