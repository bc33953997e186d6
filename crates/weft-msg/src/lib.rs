//! Message model for the weft runtime.
//!
//! Everything that moves through an engine is a [`Message`]: a common
//! header (type, name, source, destinations, user properties) over a typed
//! payload: command correlation ids, result status, byte buffers, audio
//! and video frame fields.
//!
//! # Ownership and fan-out
//!
//! A message owns its properties. The header fields that differ per
//! delivery (destinations) live on the handle; the body (properties +
//! payload) sits behind a shared pointer. [`Message::clone_for_fanout`]
//! hands each destination a cheap shared handle, and the first mutation
//! through [`Message::properties_mut`] (or any setter) copies the body,
//! so fan-out recipients can never observe each other's mutations.
//!
//! # Wire form
//!
//! [`Message::to_envelope_string`] / [`Message::from_envelope`] map a
//! message to the JSON envelope carrying the header under the reserved
//! [`ENVELOPE_KEY`] object, with user properties at the top level beside
//! it:
//!
//! ```json
//! {
//!   "_ten": { "name": "hello_world", "seq_id": "137", "dest": [ ... ] },
//!   "retries": 3
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use weft_msg::Message;
//! use weft_types::{Location, StatusCode};
//! use weft_value::Value;
//!
//! let mut cmd = Message::cmd("hello_world");
//! cmd.set_seq_id("137");
//! cmd.add_dest(Location::extension("uri", "0", "g1", "a"));
//! cmd.set_property("greeting", Value::from("hi")).unwrap();
//!
//! let result = Message::cmd_result_for(StatusCode::Ok, &cmd);
//! assert_eq!(result.cmd_id(), cmd.cmd_id());
//! assert_eq!(result.is_final(), Some(true));
//! ```

mod envelope;
mod error;
mod fields;
mod message;

pub use envelope::ENVELOPE_KEY;
pub use error::MsgError;
pub use fields::MsgField;
pub use message::{
    AudioFrameFields, CmdFields, CmdResultFields, DataFields, Message, Payload, PixelFormat,
    VideoFrameFields,
};
