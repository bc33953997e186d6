//! The process-level application container.
//!
//! An [`App`] owns a URI identifying it on the network, the addon
//! registry, and one engine per running graph. It answers the app-level
//! built-in commands (`start_graph` constructs an engine, `stop_graph`
//! tears one down, `close_app` stops everything) and routes every other
//! ingress message to the engine named by its destination.
//!
//! Messages leaving the process (results for external clients, messages
//! for other apps) appear on the app's single egress stream; a transport
//! encodes them with a [`Protocol`](crate::Protocol) of its choosing.
//! The core never assumes a transport.

use crate::addon::AddonRegistry;
use crate::engine::{EngineError, EngineHandle};
use crate::graph::{Graph, GraphDefinition, GraphError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use weft_msg::Message;
use weft_types::{ErrorCode, MsgType, StatusCode};
use weft_value::Value;

/// App layer error.
///
/// | Error | Code | Recoverable |
/// |-------|------|-------------|
/// | [`Graph`](AppError::Graph) | `APP_GRAPH` | No |
/// | [`Engine`](AppError::Engine) | `APP_ENGINE` | No |
/// | [`UnknownGraph`](AppError::UnknownGraph) | `APP_UNKNOWN_GRAPH` | No |
/// | [`DuplicateGraph`](AppError::DuplicateGraph) | `APP_DUPLICATE_GRAPH` | No |
/// | [`Property`](AppError::Property) | `APP_PROPERTY` | No |
/// | [`Closed`](AppError::Closed) | `APP_CLOSED` | No |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// Graph validation failed.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// The engine failed to start or stop.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// No engine runs a graph with this id.
    #[error("unknown graph '{0}'")]
    UnknownGraph(String),

    /// A graph with this id is already running.
    #[error("graph '{0}' already running")]
    DuplicateGraph(String),

    /// The app property document is malformed.
    #[error("property error: {0}")]
    Property(String),

    /// The app has been closed.
    #[error("app is closed")]
    Closed,
}

impl ErrorCode for AppError {
    fn code(&self) -> &'static str {
        match self {
            Self::Graph(_) => "APP_GRAPH",
            Self::Engine(_) => "APP_ENGINE",
            Self::UnknownGraph(_) => "APP_UNKNOWN_GRAPH",
            Self::DuplicateGraph(_) => "APP_DUPLICATE_GRAPH",
            Self::Property(_) => "APP_PROPERTY",
            Self::Closed => "APP_CLOSED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Process-level container: addon registry plus running engines.
///
/// # Example
///
/// ```no_run
/// use weft_runtime::App;
/// use weft_extension::Extension;
///
/// struct Echo;
/// impl Extension for Echo {}
///
/// # async fn demo() -> Result<(), weft_runtime::AppError> {
/// let mut app = App::new("msgpack://127.0.0.1:8001/");
/// app.register_extension("echo", Box::new(|_name| Box::new(Echo)));
///
/// let descriptor = serde_json::json!({
///     "name": "0",
///     "nodes": [
///         { "type": "extension_group", "name": "g1" },
///         { "type": "extension", "name": "a", "addon": "echo",
///           "extension_group": "g1" }
///     ]
/// });
/// let graph_id = app.start_graph(&descriptor).await?;
/// app.stop_graph(&graph_id).await?;
/// # Ok(())
/// # }
/// ```
pub struct App {
    uri: String,
    registry: Arc<AddonRegistry>,
    engines: HashMap<String, EngineHandle>,
    predefined: HashMap<String, serde_json::Value>,
    egress_tx: mpsc::UnboundedSender<Message>,
    egress_rx: Option<mpsc::UnboundedReceiver<Message>>,
    closed: bool,
}

impl App {
    /// Creates an app with a fresh registry.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self::with_registry(uri, AddonRegistry::shared())
    }

    /// Creates an app sharing an existing registry.
    #[must_use]
    pub fn with_registry(uri: impl Into<String>, registry: Arc<AddonRegistry>) -> Self {
        let (egress_tx, egress_rx) = mpsc::unbounded_channel();
        Self {
            uri: uri.into(),
            registry,
            engines: HashMap::new(),
            predefined: HashMap::new(),
            egress_tx,
            egress_rx: Some(egress_rx),
            closed: false,
        }
    }

    /// This app's network URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The addon registry.
    #[must_use]
    pub fn registry(&self) -> &AddonRegistry {
        &self.registry
    }

    /// Registers an extension factory.
    pub fn register_extension(&self, addon: impl Into<String>, factory: crate::ExtensionFactory) {
        self.registry.register_extension(addon, factory);
    }

    /// Takes the egress stream. Everything leaving this app (results
    /// for external clients, messages for other apps) arrives here.
    /// Can be taken once.
    pub fn take_egress(&mut self) -> Option<mpsc::UnboundedReceiver<Message>> {
        self.egress_rx.take()
    }

    /// Ids of the graphs currently running.
    #[must_use]
    pub fn graph_ids(&self) -> Vec<String> {
        self.engines.keys().cloned().collect()
    }

    /// Loads the app property document.
    ///
    /// Recognised keys under `_ten`: `uri` (overrides the app URI) and
    /// `predefined_graphs` (graph descriptors; those marked `auto_start`
    /// are started immediately, the rest may be started later by name).
    pub async fn init_property_from_json(&mut self, text: &str) -> Result<(), AppError> {
        let doc: serde_json::Value =
            serde_json::from_str(text).map_err(|e| AppError::Property(e.to_string()))?;
        let header = doc.get(weft_msg::ENVELOPE_KEY);

        if let Some(uri) = header
            .and_then(|h| h.get("uri"))
            .and_then(serde_json::Value::as_str)
        {
            self.uri = uri.to_string();
        }

        let predefined = header
            .and_then(|h| h.get("predefined_graphs"))
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();
        for descriptor in predefined {
            let def = GraphDefinition::from_value(&descriptor)?;
            let name = def
                .name
                .clone()
                .ok_or_else(|| AppError::Property("predefined graph without a name".into()))?;
            if def.auto_start {
                self.start_named_graph(&name, &descriptor).await?;
            } else {
                self.predefined.insert(name, descriptor);
            }
        }
        Ok(())
    }

    /// Starts a graph from a descriptor, driving the three startup
    /// barriers. Returns the graph id.
    pub async fn start_graph(
        &mut self,
        descriptor: &serde_json::Value,
    ) -> Result<String, AppError> {
        let def = GraphDefinition::from_value(descriptor)?;
        let graph_id = def
            .name
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.start_named_graph(&graph_id, descriptor).await?;
        Ok(graph_id)
    }

    async fn start_named_graph(
        &mut self,
        graph_id: &str,
        descriptor: &serde_json::Value,
    ) -> Result<(), AppError> {
        if self.closed {
            return Err(AppError::Closed);
        }
        if self.engines.contains_key(graph_id) {
            return Err(AppError::DuplicateGraph(graph_id.to_string()));
        }

        let def = GraphDefinition::from_value(descriptor)?;
        // Validate addons up front so failure rolls back cleanly.
        let graph = Graph::compile(&def, &self.uri)?;
        for group in graph.groups() {
            for ext in &group.extensions {
                if !self.registry.has_extension(&ext.addon) {
                    return Err(AppError::Graph(GraphError::MissingAddon(ext.addon.clone())));
                }
            }
        }

        let mut handle = EngineHandle::spawn(
            graph_id,
            &self.uri,
            graph,
            &self.registry,
            self.egress_tx.clone(),
        )?;
        handle.wait_started().await?;
        info!(graph = graph_id, "graph started");
        self.engines.insert(graph_id.to_string(), handle);
        Ok(())
    }

    /// Stops a running graph and waits for its full teardown.
    pub async fn stop_graph(&mut self, graph_id: &str) -> Result<(), AppError> {
        let handle = self
            .engines
            .remove(graph_id)
            .ok_or_else(|| AppError::UnknownGraph(graph_id.to_string()))?;
        handle.stop().await?;
        info!(graph = graph_id, "graph stopped");
        Ok(())
    }

    /// Stops every engine and refuses further work.
    pub async fn close(&mut self) -> Result<(), AppError> {
        let ids: Vec<String> = self.engines.keys().cloned().collect();
        for id in ids {
            if let Some(handle) = self.engines.remove(&id) {
                if let Err(e) = handle.stop().await {
                    warn!(graph = %id, error = %e, "engine did not stop cleanly");
                }
            }
        }
        self.closed = true;
        info!(uri = %self.uri, "app closed");
        Ok(())
    }

    /// Injects a message from outside the process: the path transports
    /// use after decoding a frame, and the path tests use directly.
    ///
    /// App-level commands are answered on the egress stream; everything
    /// else is routed to the engine named by the destination's `graph`.
    pub async fn ingress(&mut self, msg: Message) -> Result<(), AppError> {
        if self.closed {
            return Err(AppError::Closed);
        }
        match msg.msg_type() {
            MsgType::CmdStartGraph => self.answer_start_graph(msg).await,
            MsgType::CmdStopGraph => self.answer_stop_graph(msg).await,
            MsgType::CmdCloseApp => {
                let reply = self.reply_for(&msg, StatusCode::Ok, "app closing");
                self.close().await?;
                self.egress(reply);
                Ok(())
            }
            _ => {
                let Some(graph_id) = msg.dests().first().and_then(|d| d.graph_id.clone()) else {
                    self.reject_ingress(msg, "destination names no graph");
                    return Ok(());
                };
                let delivered = self
                    .engines
                    .get(&graph_id)
                    .is_some_and(|engine| engine.ingress(msg.clone()));
                if !delivered {
                    self.reject_ingress(msg, "unknown graph");
                }
                Ok(())
            }
        }
    }

    async fn answer_start_graph(&mut self, cmd: Message) -> Result<(), AppError> {
        // The descriptor travels in the `graph` property; a bare
        // `graph_name` starts a predefined graph instead.
        let descriptor = match cmd.peek_property("graph") {
            Some(value) => value.to_serde_json(),
            None => {
                let name = cmd
                    .peek_property("graph_name")
                    .and_then(|v| v.get_string().ok())
                    .unwrap_or_default()
                    .to_string();
                match self.predefined.get(&name) {
                    Some(descriptor) => descriptor.clone(),
                    None => {
                        let reply = self.reply_for(
                            &cmd,
                            StatusCode::InvalidGraph,
                            "start_graph carries no graph",
                        );
                        self.egress(reply);
                        return Ok(());
                    }
                }
            }
        };

        let reply = match self.start_graph(&descriptor).await {
            Ok(graph_id) => {
                let mut reply = self.reply_for(&cmd, StatusCode::Ok, "graph running");
                if reply
                    .set_property("graph_id", Value::from(graph_id.clone()))
                    .is_err()
                {
                    debug!(graph = %graph_id, "could not attach graph_id to reply");
                }
                reply
            }
            Err(e) => self.reply_for(&cmd, StatusCode::InvalidGraph, &e.to_string()),
        };
        self.egress(reply);
        Ok(())
    }

    async fn answer_stop_graph(&mut self, cmd: Message) -> Result<(), AppError> {
        let graph_id = cmd
            .dests()
            .first()
            .and_then(|d| d.graph_id.clone())
            .or_else(|| {
                cmd.peek_property("graph_id")
                    .and_then(|v| v.get_string().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let reply = match self.stop_graph(&graph_id).await {
            Ok(()) => self.reply_for(&cmd, StatusCode::Ok, "graph stopped"),
            Err(e) => self.reply_for(&cmd, StatusCode::InvalidGraph, &e.to_string()),
        };
        self.egress(reply);
        Ok(())
    }

    fn reject_ingress(&mut self, msg: Message, why: &str) {
        if msg.msg_type().is_cmd_like() {
            let reply = self.reply_for(&msg, StatusCode::InvalidGraph, why);
            self.egress(reply);
        } else {
            warn!(msg = msg.name(), why, "ingress frame dropped");
        }
    }

    fn reply_for(&self, cmd: &Message, status: StatusCode, detail: &str) -> Message {
        Message::cmd_result_for(status, cmd).with_detail(detail)
    }

    fn egress(&mut self, msg: Message) {
        if self.egress_tx.send(msg).is_err() {
            debug!("app egress has no consumer");
        }
    }
}
