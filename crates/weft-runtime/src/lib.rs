//! weft runtime: the internal implementation layer.
//!
//! This crate hosts everything above the extension SDK: the engine that
//! owns a running graph, the extension group threads, the command/result
//! path tables, the graph descriptor, the transport-agnostic protocol
//! contract, and the process-level app container.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Extension SDK Layer                       │
//! │  weft-types / weft-value / weft-msg / weft-extension        │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Runtime Layer (THIS CRATE)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  graph/    : descriptor parsing, compiled routing table     │
//! │  addon     : named extension factories                      │
//! │  path      : PathIn / PathOut correlation tables            │
//! │  group     : one OS thread per extension group              │
//! │  engine/   : routing loop, barriers, timers, stop protocol  │
//! │  protocol  : frame codec contract + JSON framing plug-in    │
//! │  app       : engine container, ingress/egress               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Data flow
//!
//! External bytes are decoded by a [`Protocol`] and injected through
//! [`App::ingress`], the same path extensions' own messages take. The
//! engine routes each message to its destination extensions, whose
//! callbacks run on their group's thread; replies flow back through the
//! path tables to the originating extension or out through the app's
//! egress stream.

pub mod addon;
pub mod app;
pub mod engine;
pub mod graph;
pub mod group;
pub mod path;
pub mod protocol;

mod env;

pub use addon::{AddonRegistry, ExtensionFactory};
pub use app::{App, AppError};
pub use engine::{EngineError, EngineHandle};
pub use graph::{Graph, GraphDefinition, GraphError, RouteKind};
pub use protocol::{JsonFraming, Protocol, ProtocolError};
