//! Test harness for extensions.
//!
//! [`TestEnv`] is an in-memory [`Env`] that records everything an
//! extension does to it, so unit tests can drive callbacks directly
//! without a running engine:
//!
//! ```
//! use weft_extension::testing::TestEnv;
//! use weft_extension::{Env, Extension};
//! use weft_msg::Message;
//!
//! struct Probe;
//! impl Extension for Probe {
//!     fn on_data(&mut self, env: &mut dyn Env, data: Message) {
//!         let copy = Message::data("echoed").with_buf(data.buf().unwrap_or_default().to_vec());
//!         env.send_data(copy).unwrap();
//!     }
//! }
//!
//! let mut env = TestEnv::new("probe");
//! Probe.on_data(&mut env, Message::data("in").with_buf(vec![1]));
//! assert_eq!(env.sent().len(), 1);
//! ```

use crate::env::{Env, EnvProxy, NotifyFn, NotifySink, ProxyError, ReplyHandler};
use crate::error::EnvError;
use crate::state::LifecyclePhase;
use std::sync::Arc;
use std::time::Duration;
use weft_msg::Message;
use weft_types::Location;
use weft_value::Value;

/// Sink used by [`TestEnv::proxy`]; notifications have nowhere to go.
struct DetachedSink;

impl NotifySink for DetachedSink {
    fn notify(&self, _extension: &str, _f: NotifyFn) -> Result<(), ProxyError> {
        Err(ProxyError::Detached)
    }
}

/// Recording env for extension unit tests.
pub struct TestEnv {
    location: Location,
    properties: Value,
    sent: Vec<Message>,
    returned: Vec<Message>,
    handlers: Vec<(String, ReplyHandler)>,
    acked: Vec<LifecyclePhase>,
}

impl TestEnv {
    /// Creates an env for an extension named `extension`, placed in a
    /// synthetic test location.
    #[must_use]
    pub fn new(extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            location: Location::extension("test://app/", "test", "test_group", extension),
            properties: Value::object(),
            sent: Vec::new(),
            returned: Vec::new(),
            handlers: Vec::new(),
            acked: Vec::new(),
        }
    }

    /// Messages emitted through the `send_*` operations, in order.
    #[must_use]
    pub fn sent(&self) -> &[Message] {
        &self.sent
    }

    /// Results handed to [`Env::return_result`], in order.
    #[must_use]
    pub fn returned(&self) -> &[Message] {
        &self.returned
    }

    /// Lifecycle phases acknowledged so far, in order.
    #[must_use]
    pub fn acked(&self) -> &[LifecyclePhase] {
        &self.acked
    }

    /// Reply handlers registered via `send_cmd_with_reply`, keyed by
    /// `cmd_id`. Tests may invoke them to simulate result delivery.
    pub fn take_handlers(&mut self) -> Vec<(String, ReplyHandler)> {
        std::mem::take(&mut self.handlers)
    }

    /// Seeds a property before driving a callback.
    pub fn seed_property(&mut self, path: &str, value: Value) {
        self.properties
            .set_path(path, value)
            .expect("test property path");
    }

    fn ack(&mut self, phase: LifecyclePhase) -> Result<(), EnvError> {
        if self.acked.contains(&phase) {
            return Err(EnvError::LifecycleMisuse(format!(
                "{phase} acknowledged twice"
            )));
        }
        self.acked.push(phase);
        Ok(())
    }
}

impl Env for TestEnv {
    fn location(&self) -> &Location {
        &self.location
    }

    fn send_cmd(&mut self, cmd: Message) -> Result<(), EnvError> {
        self.sent.push(cmd);
        Ok(())
    }

    fn send_cmd_with_reply(
        &mut self,
        cmd: Message,
        handler: ReplyHandler,
    ) -> Result<(), EnvError> {
        let cmd_id = cmd.cmd_id().unwrap_or_default().to_string();
        self.handlers.push((cmd_id, handler));
        self.sent.push(cmd);
        Ok(())
    }

    fn send_cmd_with_deadline(
        &mut self,
        cmd: Message,
        handler: ReplyHandler,
        _deadline: Duration,
    ) -> Result<(), EnvError> {
        self.send_cmd_with_reply(cmd, handler)
    }

    fn send_data(&mut self, data: Message) -> Result<(), EnvError> {
        self.sent.push(data);
        Ok(())
    }

    fn send_audio_frame(&mut self, frame: Message) -> Result<(), EnvError> {
        self.sent.push(frame);
        Ok(())
    }

    fn send_video_frame(&mut self, frame: Message) -> Result<(), EnvError> {
        self.sent.push(frame);
        Ok(())
    }

    fn return_result(&mut self, mut result: Message, cmd: &Message) -> Result<(), EnvError> {
        if !cmd.msg_type().is_cmd_like() {
            return Err(EnvError::NotACmd(cmd.name().to_string()));
        }
        result.correlate_with(cmd);
        self.returned.push(result);
        Ok(())
    }

    fn peek_property(&self, path: &str) -> Option<&Value> {
        self.properties.peek_path(path)
    }

    fn get_property(&self, path: &str) -> Option<Value> {
        self.properties.get_path(path)
    }

    fn set_property(&mut self, path: &str, value: Value) -> Result<(), EnvError> {
        self.properties.set_path(path, value)?;
        Ok(())
    }

    fn configure_done(&mut self) -> Result<(), EnvError> {
        self.ack(LifecyclePhase::Configure)
    }

    fn init_done(&mut self) -> Result<(), EnvError> {
        self.ack(LifecyclePhase::Init)
    }

    fn start_done(&mut self) -> Result<(), EnvError> {
        self.ack(LifecyclePhase::Start)
    }

    fn stop_done(&mut self) -> Result<(), EnvError> {
        self.ack(LifecyclePhase::Stop)
    }

    fn deinit_done(&mut self) -> Result<(), EnvError> {
        self.ack(LifecyclePhase::Deinit)
    }

    fn proxy(&self) -> EnvProxy {
        EnvProxy::new(
            self.location.extension.clone().unwrap_or_default(),
            Arc::new(DetachedSink),
        )
    }
}
