//! The runtime's concrete env.
//!
//! One [`ExtensionEnv`] exists per extension instance, owned by its
//! group's thread. It forwards every emission to the engine's inbox,
//! keeps the extension's property tree, enforces idempotent-once
//! lifecycle acknowledgements, and buffers reply-handler registrations
//! for the group runner to harvest after each callback returns.

use crate::engine::EngineInput;
use crate::group::GroupSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use weft_extension::{Env, EnvError, EnvProxy, ExtensionState, LifecyclePhase, ReplyHandler};
use weft_msg::Message;
use weft_types::Location;
use weft_value::Value;

/// A reply handler waiting to be harvested by the group runner.
pub(crate) struct PendingReply {
    pub cmd_id: String,
    pub handler: ReplyHandler,
}

/// Concrete [`Env`] bound to one extension on its group thread.
pub(crate) struct ExtensionEnv {
    location: Location,
    properties: Value,
    state: ExtensionState,
    acked: Vec<LifecyclePhase>,
    engine_tx: mpsc::UnboundedSender<EngineInput>,
    sink: Arc<GroupSink>,
    pending: Vec<PendingReply>,
}

impl ExtensionEnv {
    pub(crate) fn new(
        location: Location,
        properties: Value,
        engine_tx: mpsc::UnboundedSender<EngineInput>,
        sink: Arc<GroupSink>,
    ) -> Self {
        Self {
            location,
            properties,
            state: ExtensionState::Created,
            acked: Vec::new(),
            engine_tx,
            sink,
            pending: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> ExtensionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ExtensionState) {
        self.state = state;
    }

    pub(crate) fn has_acked(&self, phase: LifecyclePhase) -> bool {
        self.acked.contains(&phase)
    }

    /// Hands buffered reply handlers to the group runner.
    pub(crate) fn take_pending(&mut self) -> Vec<PendingReply> {
        std::mem::take(&mut self.pending)
    }

    fn extension_name(&self) -> String {
        self.location.extension.clone().unwrap_or_default()
    }

    fn submit(
        &mut self,
        msg: Message,
        has_handler: bool,
        deadline: Option<Duration>,
    ) -> Result<(), EnvError> {
        self.engine_tx
            .send(EngineInput::Submit {
                msg,
                has_handler,
                deadline,
            })
            .map_err(|_| EnvError::Closed("engine is gone".into()))
    }

    fn send_stamped(&mut self, mut msg: Message) -> Result<(), EnvError> {
        msg.set_src(self.location.clone());
        self.submit(msg, false, None)
    }

    fn ack(&mut self, phase: LifecyclePhase) -> Result<(), EnvError> {
        if self.acked.contains(&phase) {
            return Err(EnvError::LifecycleMisuse(format!(
                "{phase} acknowledged twice by '{}'",
                self.extension_name()
            )));
        }
        self.acked.push(phase);
        self.state = phase.ack_state();
        self.engine_tx
            .send(EngineInput::LifecycleAck {
                extension: self.extension_name(),
                phase,
            })
            .map_err(|_| EnvError::Closed("engine is gone".into()))
    }
}

impl Env for ExtensionEnv {
    fn location(&self) -> &Location {
        &self.location
    }

    fn send_cmd(&mut self, cmd: Message) -> Result<(), EnvError> {
        self.send_stamped(cmd)
    }

    fn send_cmd_with_reply(
        &mut self,
        mut cmd: Message,
        handler: ReplyHandler,
    ) -> Result<(), EnvError> {
        cmd.set_src(self.location.clone());
        let cmd_id = cmd.cmd_id().unwrap_or_default().to_string();
        self.pending.push(PendingReply { cmd_id, handler });
        self.submit(cmd, true, None)
    }

    fn send_cmd_with_deadline(
        &mut self,
        mut cmd: Message,
        handler: ReplyHandler,
        deadline: Duration,
    ) -> Result<(), EnvError> {
        cmd.set_src(self.location.clone());
        let cmd_id = cmd.cmd_id().unwrap_or_default().to_string();
        self.pending.push(PendingReply { cmd_id, handler });
        self.submit(cmd, true, Some(deadline))
    }

    fn send_data(&mut self, data: Message) -> Result<(), EnvError> {
        self.send_stamped(data)
    }

    fn send_audio_frame(&mut self, frame: Message) -> Result<(), EnvError> {
        self.send_stamped(frame)
    }

    fn send_video_frame(&mut self, frame: Message) -> Result<(), EnvError> {
        self.send_stamped(frame)
    }

    fn return_result(&mut self, mut result: Message, cmd: &Message) -> Result<(), EnvError> {
        if !cmd.msg_type().is_cmd_like() {
            return Err(EnvError::NotACmd(cmd.name().to_string()));
        }
        result.correlate_with(cmd);
        result.set_src(self.location.clone());
        self.submit(result, false, None)
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
        let sink: Arc<dyn weft_extension::NotifySink> = self.sink.clone();
        EnvProxy::new(self.extension_name(), sink)
    }
}
