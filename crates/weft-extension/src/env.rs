//! The env capability surface and its cross-thread proxy.

use crate::error::EnvError;
use std::sync::Arc;
use std::time::Duration;
use weft_msg::Message;
use weft_types::{ErrorCode, Location};
use weft_value::Value;

/// Handler invoked on the originating extension's thread for every result
/// answering a command it sent. Streaming commands invoke it once per
/// result; it is dropped after the last final result (or timeout).
pub type ReplyHandler = Box<dyn FnMut(&mut dyn Env, Message) + Send>;

/// Closure shipped to an env's owning thread by [`EnvProxy::notify`].
pub type NotifyFn = Box<dyn FnOnce(&mut dyn Env) + Send>;

/// Side-effect capability object handed to every extension callback.
///
/// An env is bound to its extension group's thread; it is never `Send`.
/// All message emission, property access and lifecycle acknowledgement
/// flows through it. Off-thread code uses [`EnvProxy`].
pub trait Env {
    /// This extension's fully resolved location.
    fn location(&self) -> &Location;

    /// Emits a command. Destinations left empty are resolved against the
    /// graph by the engine. Without a handler, results are routed back
    /// along the command's incoming path instead.
    fn send_cmd(&mut self, cmd: Message) -> Result<(), EnvError>;

    /// Emits a command and registers `handler` for its results.
    fn send_cmd_with_reply(&mut self, cmd: Message, handler: ReplyHandler)
        -> Result<(), EnvError>;

    /// Emits a command with a reply handler and a deadline. If no final
    /// result arrives in time, the handler receives exactly one final
    /// timeout result.
    fn send_cmd_with_deadline(
        &mut self,
        cmd: Message,
        handler: ReplyHandler,
        deadline: Duration,
    ) -> Result<(), EnvError>;

    /// Emits a data frame.
    fn send_data(&mut self, data: Message) -> Result<(), EnvError>;

    /// Emits an audio frame.
    fn send_audio_frame(&mut self, frame: Message) -> Result<(), EnvError>;

    /// Emits a video frame.
    fn send_video_frame(&mut self, frame: Message) -> Result<(), EnvError>;

    /// Returns a result for a received command. Correlation fields and the
    /// reply destination are copied from `cmd`.
    fn return_result(&mut self, result: Message, cmd: &Message) -> Result<(), EnvError>;

    /// Borrows a property of this extension at a dotted path.
    fn peek_property(&self, path: &str) -> Option<&Value>;

    /// Clones a property of this extension at a dotted path.
    fn get_property(&self, path: &str) -> Option<Value>;

    /// Writes a property of this extension at a dotted path.
    fn set_property(&mut self, path: &str, value: Value) -> Result<(), EnvError>;

    /// Acknowledges `on_configure`.
    fn configure_done(&mut self) -> Result<(), EnvError>;

    /// Acknowledges `on_init`.
    fn init_done(&mut self) -> Result<(), EnvError>;

    /// Acknowledges `on_start`.
    fn start_done(&mut self) -> Result<(), EnvError>;

    /// Acknowledges `on_stop`.
    fn stop_done(&mut self) -> Result<(), EnvError>;

    /// Acknowledges `on_deinit`.
    fn deinit_done(&mut self) -> Result<(), EnvError>;

    /// Returns a clonable, thread-safe proxy to this env.
    fn proxy(&self) -> EnvProxy;
}

/// Error produced by [`EnvProxy::notify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// The owning group thread has exited.
    #[error("env proxy target is gone")]
    Closed,

    /// The proxy is not connected to a live runtime (test harness).
    #[error("env proxy is detached")]
    Detached,
}

impl ErrorCode for ProxyError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "PROXY_CLOSED",
            Self::Detached => "PROXY_DETACHED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Runtime-provided delivery seam behind [`EnvProxy`].
///
/// The runtime implements this over the owning group's inbox; the SDK
/// never depends on the runtime's channel types.
pub trait NotifySink: Send + Sync {
    /// Enqueues `f` to run on the named extension's owning thread.
    fn notify(&self, extension: &str, f: NotifyFn) -> Result<(), ProxyError>;
}

/// Clonable, thread-safe handle to an [`Env`].
///
/// The only operation is [`notify`](Self::notify): enqueue a closure onto
/// the env's owning thread and return immediately. A property read from a
/// foreign thread clones inside the closure and hands the clone out
/// through a caller-owned completion:
///
/// ```no_run
/// # use weft_extension::EnvProxy;
/// # fn demo(proxy: EnvProxy) {
/// let (tx, rx) = std::sync::mpsc::channel();
/// proxy
///     .notify(move |env| {
///         // The clone is mandatory: the owning thread may mutate the
///         // property after this closure returns.
///         let snapshot = env.get_property("counter");
///         let _ = tx.send(snapshot);
///     })
///     .unwrap();
/// let snapshot = rx.recv().unwrap();
/// # let _ = snapshot;
/// # }
/// ```
#[derive(Clone)]
pub struct EnvProxy {
    extension: String,
    sink: Arc<dyn NotifySink>,
}

impl EnvProxy {
    /// Creates a proxy over a delivery sink.
    #[must_use]
    pub fn new(extension: impl Into<String>, sink: Arc<dyn NotifySink>) -> Self {
        Self {
            extension: extension.into(),
            sink,
        }
    }

    /// The extension this proxy is bound to.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Enqueues `f` onto the env's owning thread and returns without
    /// waiting for it to run.
    pub fn notify<F>(&self, f: F) -> Result<(), ProxyError>
    where
        F: FnOnce(&mut dyn Env) + Send + 'static,
    {
        self.sink.notify(&self.extension, Box::new(f))
    }
}

impl std::fmt::Debug for EnvProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvProxy")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        notified: Mutex<Vec<String>>,
    }

    impl NotifySink for RecordingSink {
        fn notify(&self, extension: &str, _f: NotifyFn) -> Result<(), ProxyError> {
            self.notified
                .lock()
                .expect("sink mutex")
                .push(extension.to_string());
            Ok(())
        }
    }

    #[test]
    fn proxy_routes_through_its_sink() {
        let sink = Arc::new(RecordingSink {
            notified: Mutex::new(Vec::new()),
        });
        let dyn_sink: Arc<dyn NotifySink> = sink.clone();
        let proxy = EnvProxy::new("worker", dyn_sink);

        proxy.notify(|_env| {}).unwrap();
        proxy.notify(|_env| {}).unwrap();

        assert_eq!(
            *sink.notified.lock().unwrap(),
            vec!["worker".to_string(), "worker".to_string()]
        );
    }

    #[test]
    fn proxy_is_clonable_and_shares_the_sink() {
        let sink = Arc::new(RecordingSink {
            notified: Mutex::new(Vec::new()),
        });
        let dyn_sink: Arc<dyn NotifySink> = sink.clone();
        let proxy = EnvProxy::new("a", dyn_sink);
        let clone = proxy.clone();

        clone.notify(|_env| {}).unwrap();
        assert_eq!(sink.notified.lock().unwrap().len(), 1);
        assert_eq!(clone.extension(), "a");
    }

    #[test]
    fn proxy_error_codes() {
        weft_types::assert_error_codes(&[ProxyError::Closed, ProxyError::Detached], "PROXY_");
    }
}
