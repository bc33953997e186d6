//! Extension groups: one dedicated OS thread per group.
//!
//! A [`GroupRunner`] owns the extensions placed into its group by the
//! graph, plus their envs and any reply handlers they registered. It
//! drains a single FIFO inbox on its own thread, invoking the target
//! extension's callback synchronously. Extensions in one group are
//! strictly serialised and share no locks because they share a thread.
//!
//! ```text
//!                      ┌──────────────────────────────┐
//!                      │        GroupRunner           │
//! Engine ──Deliver───► │  inbox ◄── mpsc (unbounded)  │
//!        ──Lifecycle─► │     │                        │
//! EnvProxy ──Notify──► │     ▼                        │
//!                      │  extension callback          │
//!                      │     │ env.send_* / acks      │
//!                      │     ▼                        │
//!                      │  engine inbox                │
//!                      └──────────────────────────────┘
//! ```
//!
//! Panic containment lives here: every callback runs inside a panic
//! boundary; a panicking extension is marked faulted, the engine is told,
//! and the engine turns that into a best-effort graph stop.

use crate::engine::EngineInput;
use crate::env::ExtensionEnv;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;
use tokio::sync::mpsc;
use weft_extension::{
    Env, Extension, ExtensionState, LifecyclePhase, NotifyFn, NotifySink, ProxyError,
    ReplyHandler,
};
use weft_msg::Message;
use weft_types::MsgType;
use tracing::{debug, info, warn};

/// Work items drained by a group's thread, in FIFO order.
pub(crate) enum GroupInput {
    /// Deliver a message to the extension named by its only destination.
    Deliver(Message),
    /// Invoke a buffered reply handler with a result. `last` drops the
    /// handler afterwards.
    DeliverResult {
        extension: String,
        result: Message,
        last: bool,
    },
    /// Run one lifecycle phase across every extension in the group.
    Lifecycle(LifecyclePhase),
    /// Run a closure shipped by an [`EnvProxy`](weft_extension::EnvProxy).
    Notify { extension: String, f: NotifyFn },
}

impl std::fmt::Debug for GroupInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deliver(msg) => f.debug_tuple("Deliver").field(&msg.name()).finish(),
            Self::DeliverResult { extension, .. } => {
                f.debug_tuple("DeliverResult").field(extension).finish()
            }
            Self::Lifecycle(phase) => f.debug_tuple("Lifecycle").field(phase).finish(),
            Self::Notify { extension, .. } => f.debug_tuple("Notify").field(extension).finish(),
        }
    }
}

/// Engine-side handle to a group's inbox.
#[derive(Clone)]
pub(crate) struct GroupHandle {
    name: String,
    tx: mpsc::UnboundedSender<GroupInput>,
}

impl GroupHandle {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues a work item; returns `false` if the group thread exited.
    pub(crate) fn send(&self, input: GroupInput) -> bool {
        self.tx.send(input).is_ok()
    }
}

/// [`NotifySink`] over a group inbox; the delivery seam behind every
/// `EnvProxy` handed out by this group's envs.
pub(crate) struct GroupSink {
    tx: mpsc::UnboundedSender<GroupInput>,
}

impl GroupSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<GroupInput>) -> Self {
        Self { tx }
    }
}

impl NotifySink for GroupSink {
    fn notify(&self, extension: &str, f: NotifyFn) -> Result<(), ProxyError> {
        self.tx
            .send(GroupInput::Notify {
                extension: extension.to_string(),
                f,
            })
            .map_err(|_| ProxyError::Closed)
    }
}

/// One extension with its env, hosted by a group.
pub(crate) struct Slot {
    pub name: String,
    pub extension: Box<dyn Extension>,
    pub env: ExtensionEnv,
}

/// Thread body of one extension group.
pub(crate) struct GroupRunner {
    name: String,
    slots: Vec<Slot>,
    rx: mpsc::UnboundedReceiver<GroupInput>,
    engine_tx: mpsc::UnboundedSender<EngineInput>,
    handlers: HashMap<(String, String), ReplyHandler>,
}

impl GroupRunner {
    /// Creates a runner and the engine-side handle to its inbox.
    pub(crate) fn new(
        name: impl Into<String>,
        slots: Vec<Slot>,
        rx: mpsc::UnboundedReceiver<GroupInput>,
        tx: mpsc::UnboundedSender<GroupInput>,
        engine_tx: mpsc::UnboundedSender<EngineInput>,
    ) -> (Self, GroupHandle) {
        let name = name.into();
        let handle = GroupHandle {
            name: name.clone(),
            tx,
        };
        (
            Self {
                name,
                slots,
                rx,
                engine_tx,
                handlers: HashMap::new(),
            },
            handle,
        )
    }

    /// Spawns the group's dedicated OS thread.
    pub(crate) fn spawn(self) -> std::io::Result<thread::JoinHandle<()>> {
        let name = format!("weft-group-{}", self.name);
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run())
    }

    fn run(mut self) {
        info!(group = %self.name, "group thread started");

        while let Some(input) = self.rx.blocking_recv() {
            match input {
                GroupInput::Lifecycle(phase) => {
                    self.run_lifecycle(phase);
                    if phase == LifecyclePhase::Deinit {
                        // Nothing may run after deinit; mark and exit.
                        for slot in &mut self.slots {
                            if !slot.env.state().is_terminal() {
                                slot.env.set_state(ExtensionState::Destroyed);
                            }
                        }
                        break;
                    }
                }
                GroupInput::Deliver(msg) => self.deliver(msg),
                GroupInput::DeliverResult {
                    extension,
                    result,
                    last,
                } => self.deliver_result(&extension, result, last),
                GroupInput::Notify { extension, f } => self.run_notify(&extension, f),
            }
        }

        info!(group = %self.name, "group thread stopped");
    }

    fn slot_index(&self, extension: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == extension)
    }

    /// Runs one phase callback for every live extension, acking on behalf
    /// of faulted ones so the engine's barrier always completes.
    fn run_lifecycle(&mut self, phase: LifecyclePhase) {
        debug!(group = %self.name, %phase, "lifecycle phase");
        for i in 0..self.slots.len() {
            if self.slots[i].env.state().is_terminal() {
                self.force_ack(i, phase);
                continue;
            }
            self.slots[i].env.set_state(phase.entry_state());

            let panicked = {
                let slot = &mut self.slots[i];
                let ext = &mut slot.extension;
                let env: &mut dyn Env = &mut slot.env;
                catch_unwind(AssertUnwindSafe(|| match phase {
                    LifecyclePhase::Configure => ext.on_configure(env),
                    LifecyclePhase::Init => ext.on_init(env),
                    LifecyclePhase::Start => ext.on_start(env),
                    LifecyclePhase::Stop => ext.on_stop(env),
                    LifecyclePhase::Deinit => ext.on_deinit(env),
                }))
                .is_err()
            };

            if panicked {
                self.fault(i);
                if !self.slots[i].env.has_acked(phase) {
                    self.force_ack(i, phase);
                }
            } else {
                self.harvest(i);
            }
        }
    }

    fn deliver(&mut self, mut msg: Message) {
        let Some(target) = msg
            .dests()
            .first()
            .and_then(|d| d.extension.clone())
        else {
            warn!(group = %self.name, msg = msg.name(), "delivery without extension target");
            return;
        };
        let Some(i) = self.slot_index(&target) else {
            warn!(group = %self.name, extension = %target, "delivery to unknown extension");
            return;
        };
        if self.slots[i].env.state().is_terminal() {
            debug!(extension = %target, "dropping delivery to terminal extension");
            return;
        }
        // Delivery consumes the destination set; a callback re-emitting
        // the message resolves fresh destinations against the graph.
        msg.set_dests(Vec::new());

        let panicked = {
            let slot = &mut self.slots[i];
            let ext = &mut slot.extension;
            let env: &mut dyn Env = &mut slot.env;
            catch_unwind(AssertUnwindSafe(|| match msg.msg_type() {
                MsgType::Data => ext.on_data(env, msg),
                MsgType::AudioFrame => ext.on_audio_frame(env, msg),
                MsgType::VideoFrame => ext.on_video_frame(env, msg),
                _ => ext.on_cmd(env, msg),
            }))
            .is_err()
        };

        if panicked {
            self.fault(i);
        } else {
            self.harvest(i);
        }
    }

    fn deliver_result(&mut self, extension: &str, result: Message, last: bool) {
        let cmd_id = result.cmd_id().unwrap_or_default().to_string();
        let key = (extension.to_string(), cmd_id);
        let Some(mut handler) = self.handlers.remove(&key) else {
            warn!(
                group = %self.name,
                extension,
                "result arrived with no registered handler, dropping"
            );
            return;
        };
        let Some(i) = self.slot_index(extension) else {
            warn!(group = %self.name, extension, "result for unknown extension");
            return;
        };

        let panicked = {
            let slot = &mut self.slots[i];
            let env: &mut dyn Env = &mut slot.env;
            catch_unwind(AssertUnwindSafe(|| handler(env, result))).is_err()
        };

        if panicked {
            self.fault(i);
        } else {
            if !last {
                self.handlers.insert(key, handler);
            }
            self.harvest(i);
        }
    }

    fn run_notify(&mut self, extension: &str, f: NotifyFn) {
        let Some(i) = self.slot_index(extension) else {
            warn!(group = %self.name, extension, "notify for unknown extension");
            return;
        };
        if self.slots[i].env.state().is_terminal() {
            debug!(extension, "dropping notify for terminal extension");
            return;
        }

        let panicked = {
            let slot = &mut self.slots[i];
            let env: &mut dyn Env = &mut slot.env;
            catch_unwind(AssertUnwindSafe(|| f(env))).is_err()
        };

        if panicked {
            self.fault(i);
        } else {
            self.harvest(i);
        }
    }

    /// Moves handlers registered during the last callback into the
    /// runner's table, where result deliveries can find them.
    fn harvest(&mut self, i: usize) {
        let name = self.slots[i].name.clone();
        for pending in self.slots[i].env.take_pending() {
            self.handlers
                .insert((name.clone(), pending.cmd_id), pending.handler);
        }
    }

    fn fault(&mut self, i: usize) {
        let name = self.slots[i].name.clone();
        warn!(group = %self.name, extension = %name, "extension callback panicked, quarantining");
        self.slots[i].env.set_state(ExtensionState::Faulted);
        let _ = self
            .engine_tx
            .send(EngineInput::ExtensionFaulted { extension: name });
    }

    fn force_ack(&self, i: usize, phase: LifecyclePhase) {
        let _ = self.engine_tx.send(EngineInput::LifecycleAck {
            extension: self.slots[i].name.clone(),
            phase,
        });
    }
}
