//! The engine: owner of one running graph.
//!
//! An engine owns the immutable [`Graph`], the group threads, the path
//! tables and the timers. Its async task drains a single inbox fed by
//! every env, by the app's ingress and by timer tasks, and is the only
//! code that touches the path tables.
//!
//! # Startup
//!
//! ```text
//! spawn ── instantiate groups/extensions ── Configure ─▸ Init ─▸ Start ─▸ Running
//!                                            (barrier)   (barrier)  (barrier)
//! ```
//!
//! No extension receives user traffic until every extension in the graph
//! has completed `on_start`; messages emitted earlier are queued and
//! flushed at the `Running` transition.
//!
//! # Stop
//!
//! `stop_graph` cancels in-flight commands with final `Cancelled`
//! results, then drives `Stop` and `Deinit` barriers across every group,
//! joins the group threads and replies `Ok`. No extension callback runs
//! after its `on_deinit` returns.

mod timer;

use crate::addon::AddonRegistry;
use crate::env::ExtensionEnv;
use crate::graph::{Graph, RouteKind};
use crate::group::{GroupHandle, GroupInput, GroupRunner, GroupSink, Slot};
use crate::path::{PathIn, PathOut, PathTable, Upstream};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use timer::TimerTable;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use weft_extension::LifecyclePhase;
use weft_msg::Message;
use weft_types::{ErrorCode, Location, MsgType, StatusCode};
use weft_value::Value;

/// Engine layer error.
///
/// | Error | Code | Recoverable |
/// |-------|------|-------------|
/// | [`Graph`](EngineError::Graph) | `ENGINE_GRAPH` | No |
/// | [`StartupFailed`](EngineError::StartupFailed) | `ENGINE_STARTUP_FAILED` | No |
/// | [`Closed`](EngineError::Closed) | `ENGINE_CLOSED` | No |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The graph failed validation or an addon was missing.
    #[error("graph error: {0}")]
    Graph(#[from] crate::graph::GraphError),

    /// A startup barrier could not complete.
    #[error("engine startup failed: {0}")]
    StartupFailed(String),

    /// The engine task has exited.
    #[error("engine is closed")]
    Closed,
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::Graph(_) => "ENGINE_GRAPH",
            Self::StartupFailed(_) => "ENGINE_STARTUP_FAILED",
            Self::Closed => "ENGINE_CLOSED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Inputs drained by the engine task.
#[derive(Debug)]
pub(crate) enum EngineInput {
    /// A message emitted by an extension through its env.
    Submit {
        msg: Message,
        has_handler: bool,
        deadline: Option<Duration>,
    },
    /// A message injected from outside the graph (client, transport).
    Ingress { msg: Message },
    /// An armed timer fired.
    TimerFired { msg: Message },
    /// A lifecycle acknowledgement from an env (or forced by a runner).
    LifecycleAck {
        extension: String,
        phase: LifecyclePhase,
    },
    /// A command deadline elapsed.
    PathDeadline { origin: String, cmd_id: String },
    /// A callback panicked; the extension is quarantined.
    ExtensionFaulted { extension: String },
    /// Programmatic stop request.
    Stop {
        reply: Option<oneshot::Sender<Message>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Barrier(LifecyclePhase),
    Running,
    Stopping(LifecyclePhase),
    Closed,
}

struct PendingRoute {
    msg: Message,
    origin: Upstream,
    has_handler: bool,
    deadline: Option<Duration>,
}

/// Handle to a spawned engine.
///
/// Held by the app; cheap operations go through the engine's inbox.
#[derive(Debug)]
pub struct EngineHandle {
    graph_id: String,
    tx: mpsc::UnboundedSender<EngineInput>,
    started: Option<oneshot::Receiver<Result<(), EngineError>>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl EngineHandle {
    /// Instantiates every group and extension of `graph` and spawns the
    /// engine task. Must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails without side effects when an addon is missing; no thread is
    /// spawned until every extension has been instantiated.
    pub fn spawn(
        graph_id: impl Into<String>,
        app_uri: impl Into<String>,
        graph: Graph,
        registry: &AddonRegistry,
        egress_tx: mpsc::UnboundedSender<Message>,
    ) -> Result<Self, EngineError> {
        let graph_id = graph_id.into();
        let app_uri = app_uri.into();
        let (tx, rx) = mpsc::unbounded_channel();

        // Instantiate everything before spawning anything, so a missing
        // addon rolls back by simply dropping what was built.
        struct Staged {
            name: String,
            slots: Vec<Slot>,
            rx: mpsc::UnboundedReceiver<GroupInput>,
            tx: mpsc::UnboundedSender<GroupInput>,
        }
        let mut staged: Vec<Staged> = Vec::new();
        for spec in graph.groups() {
            let (gtx, grx) = mpsc::unbounded_channel();
            let sink = Arc::new(GroupSink::new(gtx.clone()));
            let mut slots = Vec::with_capacity(spec.extensions.len());
            for ext in &spec.extensions {
                let extension = registry.create_extension(&ext.addon, &ext.name)?;
                let properties = if ext.property.is_null() {
                    Value::object()
                } else {
                    Value::from_serde_json(ext.property.clone())
                };
                let location =
                    Location::extension(&app_uri, &graph_id, &spec.name, &ext.name);
                slots.push(Slot {
                    name: ext.name.clone(),
                    extension,
                    env: ExtensionEnv::new(location, properties, tx.clone(), Arc::clone(&sink)),
                });
            }
            staged.push(Staged {
                name: spec.name.clone(),
                slots,
                rx: grx,
                tx: gtx,
            });
        }

        let mut groups: HashMap<String, GroupHandle> = HashMap::new();
        let mut threads = Vec::new();
        for stage in staged {
            let (runner, handle) =
                GroupRunner::new(stage.name, stage.slots, stage.rx, stage.tx, tx.clone());
            match runner.spawn() {
                Ok(thread) => {
                    threads.push(thread);
                    groups.insert(handle.name().to_string(), handle);
                }
                Err(e) => {
                    // Unwind the groups already running before bailing.
                    for started in groups.values() {
                        started.send(GroupInput::Lifecycle(LifecyclePhase::Deinit));
                    }
                    for thread in threads {
                        let _ = thread.join();
                    }
                    return Err(EngineError::StartupFailed(format!(
                        "could not spawn group thread: {e}"
                    )));
                }
            }
        }

        let (started_tx, started_rx) = oneshot::channel();
        let expected = graph.extension_count();
        let core = EngineCore {
            graph_id: graph_id.clone(),
            app_uri,
            graph,
            groups,
            threads,
            rx,
            tx: tx.clone(),
            egress_tx,
            paths: PathTable::new(),
            timers: TimerTable::new(),
            state: EngineState::Barrier(LifecyclePhase::Configure),
            pending: Vec::new(),
            acked: HashSet::new(),
            expected,
            started_tx: Some(started_tx),
            stop_reply: None,
        };
        let task = tokio::spawn(core.run());

        Ok(Self {
            graph_id,
            tx,
            started: Some(started_rx),
            task: Some(task),
        })
    }

    /// The graph instance this engine runs.
    #[must_use]
    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    /// Waits for the three startup barriers to complete.
    pub async fn wait_started(&mut self) -> Result<(), EngineError> {
        match self.started.take() {
            Some(rx) => rx.await.map_err(|_| EngineError::Closed)?,
            None => Ok(()),
        }
    }

    /// Injects a message from outside the graph. Returns `false` if the
    /// engine has exited.
    pub fn ingress(&self, msg: Message) -> bool {
        self.tx.send(EngineInput::Ingress { msg }).is_ok()
    }

    /// Returns `true` once the engine task is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Stops the graph and waits for the full `Stop`/`Deinit` chain.
    /// Returns the final result message.
    pub async fn stop(mut self) -> Result<Message, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineInput::Stop {
                reply: Some(reply_tx),
            })
            .map_err(|_| EngineError::Closed)?;
        let result = reply_rx.await.map_err(|_| EngineError::Closed)?;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(result)
    }
}

struct EngineCore {
    graph_id: String,
    app_uri: String,
    graph: Graph,
    groups: HashMap<String, GroupHandle>,
    threads: Vec<thread::JoinHandle<()>>,
    rx: mpsc::UnboundedReceiver<EngineInput>,
    tx: mpsc::UnboundedSender<EngineInput>,
    egress_tx: mpsc::UnboundedSender<Message>,
    paths: PathTable,
    timers: TimerTable,
    state: EngineState,
    pending: Vec<PendingRoute>,
    acked: HashSet<String>,
    expected: usize,
    started_tx: Option<oneshot::Sender<Result<(), EngineError>>>,
    stop_reply: Option<oneshot::Sender<Message>>,
}

impl EngineCore {
    async fn run(mut self) {
        info!(graph = %self.graph_id, "engine started");
        self.broadcast(LifecyclePhase::Configure);
        self.maybe_advance().await;

        while !matches!(self.state, EngineState::Closed) {
            let Some(input) = self.rx.recv().await else {
                break;
            };
            match input {
                EngineInput::Submit {
                    msg,
                    has_handler,
                    deadline,
                } => self.handle_submit(msg, has_handler, deadline).await,
                EngineInput::Ingress { msg } => self.handle_ingress(msg).await,
                EngineInput::TimerFired { msg } => {
                    self.route_message(msg, Upstream::Engine, false, None);
                }
                EngineInput::LifecycleAck { extension, phase } => {
                    self.handle_ack(extension, phase).await;
                }
                EngineInput::PathDeadline { origin, cmd_id } => {
                    self.handle_deadline(&origin, &cmd_id);
                }
                EngineInput::ExtensionFaulted { extension } => {
                    self.handle_fault(&extension).await;
                }
                EngineInput::Stop { reply } => self.begin_stop(reply).await,
            }
        }

        info!(graph = %self.graph_id, "engine stopped");
    }

    // --- lifecycle --------------------------------------------------------

    fn broadcast(&mut self, phase: LifecyclePhase) {
        self.acked.clear();
        self.state = match phase {
            LifecyclePhase::Configure | LifecyclePhase::Init | LifecyclePhase::Start => {
                EngineState::Barrier(phase)
            }
            LifecyclePhase::Stop | LifecyclePhase::Deinit => EngineState::Stopping(phase),
        };
        for group in self.groups.values() {
            group.send(GroupInput::Lifecycle(phase));
        }
    }

    async fn handle_ack(&mut self, extension: String, phase: LifecyclePhase) {
        let current = match self.state {
            EngineState::Barrier(p) | EngineState::Stopping(p) => p,
            _ => {
                debug!(%extension, %phase, "stray lifecycle ack");
                return;
            }
        };
        if phase != current {
            debug!(%extension, %phase, expected = %current, "out-of-phase ack dropped");
            return;
        }
        self.acked.insert(extension);
        self.maybe_advance().await;
    }

    async fn maybe_advance(&mut self) {
        if self.acked.len() < self.expected {
            return;
        }
        match self.state {
            EngineState::Barrier(LifecyclePhase::Configure) => {
                self.broadcast(LifecyclePhase::Init);
                Box::pin(self.maybe_advance()).await;
            }
            EngineState::Barrier(LifecyclePhase::Init) => {
                self.broadcast(LifecyclePhase::Start);
                Box::pin(self.maybe_advance()).await;
            }
            EngineState::Barrier(LifecyclePhase::Start) => {
                self.state = EngineState::Running;
                info!(graph = %self.graph_id, "graph running");
                if let Some(tx) = self.started_tx.take() {
                    let _ = tx.send(Ok(()));
                }
                self.flush_pending();
            }
            EngineState::Stopping(LifecyclePhase::Stop) => {
                self.broadcast(LifecyclePhase::Deinit);
                Box::pin(self.maybe_advance()).await;
            }
            EngineState::Stopping(LifecyclePhase::Deinit) => {
                self.finish_stop().await;
            }
            _ => {}
        }
    }

    async fn handle_fault(&mut self, extension: &str) {
        warn!(graph = %self.graph_id, %extension, "extension faulted, stopping graph");
        match self.state {
            EngineState::Barrier(_) => {
                if let Some(tx) = self.started_tx.take() {
                    let _ = tx.send(Err(EngineError::StartupFailed(format!(
                        "extension '{extension}' faulted during startup"
                    ))));
                }
                self.begin_stop(None).await;
            }
            EngineState::Running => self.begin_stop(None).await,
            _ => {}
        }
    }

    async fn begin_stop(&mut self, reply: Option<oneshot::Sender<Message>>) {
        match self.state {
            EngineState::Closed => {
                if let Some(reply) = reply {
                    let _ = reply
                        .send(Message::cmd_result(StatusCode::Ok).with_detail("graph stopped"));
                }
            }
            EngineState::Stopping(_) => {
                if let Some(reply) = reply {
                    let _ = reply
                        .send(Message::cmd_result(StatusCode::Ok).with_detail("already stopping"));
                }
            }
            _ => {
                info!(graph = %self.graph_id, "stopping graph");
                self.stop_reply = reply;
                self.pending.clear();
                self.timers.abort_all();
                self.cancel_in_flight();
                self.broadcast(LifecyclePhase::Stop);
                // A graph with nothing left to ack completes immediately.
                self.maybe_advance().await;
            }
        }
    }

    /// Terminates every outstanding command with a final `Cancelled`
    /// result to its originator.
    fn cancel_in_flight(&mut self) {
        let (outs, externals) = self.paths.drain();
        for (origin, cmd_id, has_handler) in outs {
            if has_handler {
                let result = Message::cmd_result(StatusCode::Cancelled)
                    .with_correlation(cmd_id, "")
                    .with_detail("graph stopping");
                self.deliver_result(&origin, result, true);
            }
        }
        for (_responder, cmd_id, seq_id) in externals {
            let result = Message::cmd_result(StatusCode::Cancelled)
                .with_correlation(cmd_id, seq_id)
                .with_detail("graph stopping");
            self.egress(result);
        }
    }

    async fn finish_stop(&mut self) {
        let threads = std::mem::take(&mut self.threads);
        let _ = tokio::task::spawn_blocking(move || {
            for t in threads {
                let _ = t.join();
            }
        })
        .await;

        if let Some(tx) = self.started_tx.take() {
            let _ = tx.send(Err(EngineError::StartupFailed(
                "graph stopped during startup".into(),
            )));
        }
        if let Some(reply) = self.stop_reply.take() {
            let _ = reply.send(Message::cmd_result(StatusCode::Ok).with_detail("graph stopped"));
        }
        self.state = EngineState::Closed;
    }

    // --- ingress / submit -------------------------------------------------

    async fn handle_submit(&mut self, msg: Message, has_handler: bool, deadline: Option<Duration>) {
        match msg.msg_type() {
            MsgType::CmdResult => {
                let responder = msg.src().extension.clone().unwrap_or_default();
                self.route_result_from(responder, msg);
            }
            MsgType::CmdStopGraph => {
                if has_handler {
                    let origin = msg.src().extension.clone().unwrap_or_default();
                    let result = Message::cmd_result(StatusCode::Ok)
                        .with_correlation(msg.cmd_id().unwrap_or_default(), "")
                        .with_detail("stopping");
                    self.deliver_result(&origin, result, true);
                }
                self.begin_stop(None).await;
            }
            MsgType::CmdTimer => self.handle_timer_cmd(msg, has_handler),
            // App-level commands leave through egress.
            MsgType::CmdStartGraph | MsgType::CmdCloseApp => self.egress(msg),
            _ => {
                let origin = Upstream::Extension(
                    msg.src().extension.clone().unwrap_or_default(),
                );
                self.route_message(msg, origin, has_handler, deadline);
            }
        }
    }

    async fn handle_ingress(&mut self, msg: Message) {
        match msg.msg_type() {
            MsgType::CmdResult => {
                // A result coming back from outside correlates with the
                // outbox of the local extension it is addressed to.
                let Some(origin) = msg.dests().first().and_then(|d| d.extension.clone()) else {
                    warn!("ingress result without extension destination, dropping");
                    return;
                };
                self.route_result_to_origin(&origin, msg);
            }
            MsgType::CmdStopGraph => self.begin_stop(None).await,
            MsgType::CmdStartGraph | MsgType::CmdCloseApp => {
                warn!(msg = msg.name(), "app-level command reached an engine, dropping");
            }
            _ => self.route_message(msg, Upstream::External, false, None),
        }
    }

    fn handle_timer_cmd(&mut self, msg: Message, has_handler: bool) {
        let origin = msg.src().extension.clone().unwrap_or_default();
        let cmd_id = msg.cmd_id().unwrap_or_default().to_string();
        let timer_id = msg
            .peek_property("timer_id")
            .and_then(|v| v.get_string().ok())
            .unwrap_or(cmd_id.as_str())
            .to_string();

        let cancelled = msg
            .peek_property("cancel")
            .and_then(|v| v.get_bool().ok())
            .unwrap_or(false);
        if cancelled {
            self.timers.cancel(&timer_id);
        } else {
            let Some(timeout_us) = msg
                .peek_property("timeout_us")
                .and_then(|v| v.get_int64().ok())
            else {
                if has_handler {
                    let result = Message::cmd_result(StatusCode::InvalidArgument)
                        .with_correlation(cmd_id, "")
                        .with_detail("timer requires timeout_us");
                    self.deliver_result(&origin, result, true);
                }
                return;
            };
            let times = msg
                .peek_property("times")
                .and_then(|v| v.get_int64().ok())
                .unwrap_or(1);
            self.timers.arm(
                timer_id,
                Duration::from_micros(timeout_us.max(0) as u64),
                times,
                msg.src().clone(),
                self.tx.clone(),
            );
        }

        if has_handler {
            let result = Message::cmd_result(StatusCode::Ok)
                .with_correlation(cmd_id, "")
                .with_detail("timer");
            self.deliver_result(&origin, result, true);
        }
    }

    // --- routing ----------------------------------------------------------

    fn route_message(
        &mut self,
        msg: Message,
        origin: Upstream,
        has_handler: bool,
        deadline: Option<Duration>,
    ) {
        match self.state {
            EngineState::Barrier(_) => {
                debug!(msg = msg.name(), "queueing message until graph is running");
                self.pending.push(PendingRoute {
                    msg,
                    origin,
                    has_handler,
                    deadline,
                });
                return;
            }
            EngineState::Running => {}
            _ => {
                debug!(msg = msg.name(), "dropping message during stop");
                return;
            }
        }

        let Some(kind) = RouteKind::of(msg.msg_type()) else {
            warn!(msg = msg.name(), "unroutable message type");
            return;
        };

        let dests = if msg.dests().is_empty() {
            match &origin {
                Upstream::Extension(src) => self.graph.route(src, kind, msg.name()).to_vec(),
                _ => Vec::new(),
            }
        } else {
            msg.dests().to_vec()
        };

        if dests.is_empty() {
            self.reject(&msg, &origin, has_handler, "no destination");
            return;
        }

        let is_cmd = msg.msg_type().is_cmd_like();
        let cmd_id = msg.cmd_id().unwrap_or_default().to_string();
        let seq_id = msg.seq_id().unwrap_or_default().to_string();

        for dest in dests {
            let remote = dest
                .app_uri
                .as_deref()
                .is_some_and(|uri| uri != self.app_uri);
            if remote {
                if is_cmd {
                    if let Upstream::Extension(src) = &origin {
                        self.track_out(src, &cmd_id, has_handler, deadline);
                    }
                }
                self.egress(msg.clone_for_fanout(dest));
                continue;
            }

            let Some(ext) = dest.extension.clone() else {
                self.reject(&msg, &origin, has_handler, "destination names no extension");
                continue;
            };
            let Some(group_name) = self.graph.group_of(&ext).map(str::to_string) else {
                self.reject(&msg, &origin, has_handler, "extension not found");
                continue;
            };

            if is_cmd {
                if let Upstream::Extension(src) = &origin {
                    self.track_out(src, &cmd_id, has_handler, deadline);
                }
                self.paths.add_in(
                    &ext,
                    &cmd_id,
                    PathIn {
                        upstream: origin.clone(),
                        seq_id: seq_id.clone(),
                    },
                );
            }

            let full_dest =
                Location::extension(&self.app_uri, &self.graph_id, &group_name, &ext);
            let delivered = self
                .groups
                .get(&group_name)
                .is_some_and(|g| g.send(GroupInput::Deliver(msg.clone_for_fanout(full_dest))));
            if !delivered {
                warn!(extension = %ext, "group inbox gone, message dropped");
            }
        }
    }

    fn track_out(
        &mut self,
        origin: &str,
        cmd_id: &str,
        has_handler: bool,
        deadline: Option<Duration>,
    ) {
        self.paths.add_out(
            origin,
            cmd_id,
            PathOut {
                has_handler,
                deadline,
            },
        );
        if let Some(deadline) = deadline {
            let tx = self.tx.clone();
            let origin = origin.to_string();
            let cmd_id = cmd_id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                let _ = tx.send(EngineInput::PathDeadline { origin, cmd_id });
            });
        }
    }

    fn flush_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for route in pending {
            self.route_message(route.msg, route.origin, route.has_handler, route.deadline);
        }
    }

    /// Surfaces a routing failure to whoever can observe it.
    fn reject(&mut self, msg: &Message, origin: &Upstream, has_handler: bool, why: &str) {
        if !msg.msg_type().is_cmd_like() {
            warn!(msg = msg.name(), why, "frame dropped");
            return;
        }
        let cmd_id = msg.cmd_id().unwrap_or_default().to_string();
        let seq_id = msg.seq_id().unwrap_or_default().to_string();
        let result = Message::cmd_result(StatusCode::ExtensionNotFound)
            .with_correlation(cmd_id, seq_id)
            .with_detail(why);
        match origin {
            Upstream::Extension(src) if has_handler => {
                self.deliver_result(&src.clone(), result, true);
            }
            Upstream::External => self.egress(result),
            _ => warn!(msg = msg.name(), why, "command dropped"),
        }
    }

    // --- results ----------------------------------------------------------

    /// Walks the path tables backwards from a responding extension.
    fn route_result_from(&mut self, mut responder: String, mut result: Message) {
        let is_final = result.is_final().unwrap_or(true);
        let cmd_id = result.cmd_id().unwrap_or_default().to_string();

        loop {
            let Some(path_in) = self.paths.resolve_in(&responder, &cmd_id, is_final) else {
                warn!(%responder, "result without matching inbox record, dropping");
                return;
            };
            match path_in.upstream {
                Upstream::External => {
                    if result.seq_id().unwrap_or_default().is_empty() {
                        result.set_seq_id(path_in.seq_id);
                    }
                    result.set_dests(Vec::new());
                    self.egress(result);
                    return;
                }
                Upstream::Engine => {
                    debug!("result for an engine-issued command discarded");
                    return;
                }
                Upstream::Extension(up) => {
                    match self.paths.resolve_out(&up, &cmd_id, is_final) {
                        None => {
                            warn!(origin = %up, "result without matching outbox record, dropping");
                            return;
                        }
                        Some(res) if res.has_handler => {
                            self.deliver_result(&up, result, res.last);
                            return;
                        }
                        Some(_) => {
                            // Forwarded without a handler: keep walking up.
                            responder = up;
                        }
                    }
                }
            }
        }
    }

    /// Correlates a result directly with an origin's outbox (remote
    /// results, deadline firings).
    fn route_result_to_origin(&mut self, origin: &str, result: Message) {
        let is_final = result.is_final().unwrap_or(true);
        let cmd_id = result.cmd_id().unwrap_or_default().to_string();
        match self.paths.resolve_out(origin, &cmd_id, is_final) {
            None => warn!(%origin, "result without matching outbox record, dropping"),
            Some(res) if res.has_handler => self.deliver_result(origin, result, res.last),
            Some(_) => self.route_result_from(origin.to_string(), result),
        }
    }

    fn handle_deadline(&mut self, origin: &str, cmd_id: &str) {
        let Some(res) = self.paths.resolve_out(origin, cmd_id, true) else {
            // Completed in time; nothing to do.
            return;
        };
        warn!(%origin, cmd_id, "command deadline elapsed");
        let result = Message::cmd_result(StatusCode::Timeout)
            .with_correlation(cmd_id, "")
            .with_detail("deadline elapsed");
        if res.has_handler {
            self.deliver_result(origin, result, res.last);
        } else {
            self.route_result_from(origin.to_string(), result);
        }
    }

    /// Ships a result to the handler waiting on `origin`'s group thread.
    fn deliver_result(&mut self, origin: &str, result: Message, last: bool) {
        let Some(group_name) = self.graph.group_of(origin) else {
            warn!(%origin, "result for unknown extension, dropping");
            return;
        };
        let sent = self.groups.get(group_name).is_some_and(|g| {
            g.send(GroupInput::DeliverResult {
                extension: origin.to_string(),
                result: result.clone(),
                last,
            })
        });
        if !sent {
            debug!(%origin, "group gone, result dropped");
        }
    }

    fn egress(&mut self, msg: Message) {
        if self.egress_tx.send(msg).is_err() {
            debug!("egress has no consumer, message dropped");
        }
    }
}
