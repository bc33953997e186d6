//! Typed value tree for the weft runtime.
//!
//! Every property bag, message payload field and graph descriptor in weft
//! is a [`Value`]: a tagged union over booleans, sized integers, floats,
//! strings, byte buffers, opaque host pointers, arrays and insertion-ordered
//! objects.
//!
//! # What lives here
//!
//! - [`Value`] and its tag set [`ValueType`]
//! - dotted-path access: [`Value::set_path`], [`Value::peek_path`],
//!   [`Value::get_path`]
//! - JSON round-trip: [`Value::from_json`], [`Value::to_json`]
//! - the keyword validator [`Schema`] with its lossless
//!   [`adjust`](Schema::adjust) widening
//!
//! # Cloning discipline
//!
//! `Value::clone()` never shares mutable state with the original: byte
//! buffers are copied, containers clone recursively, and [`PtrValue`]
//! bumps a shared reference (the pointee itself is immutable from the
//! tree's point of view). This is what makes it safe to hand a cloned
//! property snapshot across threads.
//!
//! # Example
//!
//! ```
//! use weft_value::Value;
//!
//! let mut v = Value::object();
//! v.set_path("server.port", Value::from(8001i64)).unwrap();
//! v.set_path("server.hosts.0", Value::from("localhost")).unwrap();
//!
//! assert_eq!(v.peek_path("server.port").unwrap().get_int64().unwrap(), 8001);
//!
//! let text = v.to_json();
//! let back = Value::from_json(&text).unwrap();
//! assert_eq!(back, v);
//! ```

mod error;
mod json;
mod path;
mod schema;
mod value;

pub use error::ValueError;
pub use schema::{Schema, SchemaError, SchemaViolation};
pub use value::{ObjectMap, PtrValue, Value, ValueType};
