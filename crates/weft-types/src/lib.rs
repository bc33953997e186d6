//! Core types for the weft runtime.
//!
//! This crate provides the foundational vocabulary shared by every other
//! weft crate: message locations, message type tags, result status codes,
//! and the workspace-wide [`ErrorCode`] convention.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Extension SDK Layer                       │
//! │  (stable, safe for extension authors to depend on)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  weft-types     : Location, MsgType, StatusCode  ◄── HERE   │
//! │  weft-value     : Value tree, Schema                        │
//! │  weft-msg       : Cmd / CmdResult / Data / frames           │
//! │  weft-extension : Extension trait, Env, EnvProxy            │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runtime Layer                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  weft-runtime   : Engine, groups, paths, graph, app         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use weft_types::{Location, MsgType, StatusCode};
//!
//! let loc = Location::extension("msgpack://127.0.0.1:8001/", "0", "g1", "producer");
//! assert_eq!(loc.extension.as_deref(), Some("producer"));
//!
//! assert!(MsgType::Cmd.is_cmd_like());
//! assert!(StatusCode::Ok.is_ok());
//! ```

mod error;
mod location;
mod msg_type;
mod status;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use location::Location;
pub use msg_type::MsgType;
pub use status::StatusCode;
