//! Extension SDK for the weft runtime.
//!
//! An *extension* is a user-written node in a graph. It implements the
//! [`Extension`] trait (nine optional callbacks) and talks to the rest
//! of the system exclusively through the [`Env`] capability object handed
//! to every callback.
//!
//! # Lifecycle
//!
//! ```text
//! Created → Configuring → Inited → Starting → Running
//!                                                │
//!                                          Stopping → Deinited → Destroyed
//! ```
//!
//! The owning engine drives every transition; an extension only
//! acknowledges them by calling the matching `xxx_done` on its env.
//! Each acknowledgement is idempotent-once: the second call fails with a
//! lifecycle-misuse error.
//!
//! # Threading
//!
//! Callbacks run on the extension group's own thread; extensions in one
//! group never run concurrently with each other. The [`Env`] is bound to
//! that thread. Code running anywhere else holds an [`EnvProxy`] and
//! reaches the env only through [`EnvProxy::notify`], which enqueues a
//! closure onto the owning thread.
//!
//! # Example
//!
//! ```
//! use weft_extension::{Env, Extension};
//! use weft_msg::Message;
//! use weft_types::StatusCode;
//!
//! struct Greeter;
//!
//! impl Extension for Greeter {
//!     fn on_cmd(&mut self, env: &mut dyn Env, cmd: Message) {
//!         let result = Message::cmd_result_for(StatusCode::Ok, &cmd)
//!             .with_detail("hello world, too");
//!         if let Err(e) = env.return_result(result, &cmd) {
//!             tracing::warn!(error = %e, "could not return result");
//!         }
//!     }
//! }
//! ```

mod env;
mod error;
mod extension;
mod state;
pub mod testing;

pub use env::{Env, EnvProxy, NotifyFn, NotifySink, ProxyError, ReplyHandler};
pub use error::EnvError;
pub use extension::Extension;
pub use state::{ExtensionState, LifecyclePhase};
