//! Graph descriptors and compiled routing.
//!
//! A graph is described in JSON as nodes (extensions and the groups that
//! host them) plus connections (per-source routing rules for commands,
//! data, audio and video frames):
//!
//! ```json
//! {
//!   "nodes": [
//!     { "type": "extension_group", "name": "g1" },
//!     { "type": "extension", "name": "a", "addon": "echo",
//!       "extension_group": "g1" }
//!   ],
//!   "connections": [
//!     { "extension_group": "g1", "extension": "a",
//!       "cmd": [{ "name": "hello_world",
//!                 "dest": [{ "extension_group": "g2", "extension": "b" }] }] }
//!   ]
//! }
//! ```
//!
//! [`Graph::compile`] validates the description and produces an immutable
//! routing table; the graph never changes for the lifetime of the engine
//! that owns it.

use serde::Deserialize;
use std::collections::HashMap;
use weft_types::{ErrorCode, Location, MsgType};

/// Graph layer error.
///
/// | Error | Code | Recoverable |
/// |-------|------|-------------|
/// | [`Parse`](GraphError::Parse) | `GRAPH_PARSE` | No |
/// | [`DuplicateNode`](GraphError::DuplicateNode) | `GRAPH_DUPLICATE_NODE` | No |
/// | [`MissingGroup`](GraphError::MissingGroup) | `GRAPH_MISSING_GROUP` | No |
/// | [`UnknownExtension`](GraphError::UnknownExtension) | `GRAPH_UNKNOWN_EXTENSION` | No |
/// | [`MissingAddon`](GraphError::MissingAddon) | `GRAPH_MISSING_ADDON` | No |
/// | [`NoAddon`](GraphError::NoAddon) | `GRAPH_NO_ADDON` | No |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The descriptor is not valid JSON or has the wrong shape.
    #[error("graph parse error: {0}")]
    Parse(String),

    /// Two nodes share a name within the same parent.
    #[error("duplicate node '{0}'")]
    DuplicateNode(String),

    /// An extension node names a group with no group node.
    #[error("extension '{extension}' references unknown group '{group}'")]
    MissingGroup {
        /// The extension node.
        extension: String,
        /// The group it references.
        group: String,
    },

    /// A connection references an extension that has no node.
    #[error("connection references unknown extension '{0}'")]
    UnknownExtension(String),

    /// No factory is registered under the named addon.
    #[error("no addon registered under '{0}'")]
    MissingAddon(String),

    /// An extension node has no addon to instantiate it from.
    #[error("extension '{0}' has no addon")]
    NoAddon(String),
}

impl ErrorCode for GraphError {
    fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "GRAPH_PARSE",
            Self::DuplicateNode(_) => "GRAPH_DUPLICATE_NODE",
            Self::MissingGroup { .. } => "GRAPH_MISSING_GROUP",
            Self::UnknownExtension(_) => "GRAPH_UNKNOWN_EXTENSION",
            Self::MissingAddon(_) => "GRAPH_MISSING_ADDON",
            Self::NoAddon(_) => "GRAPH_NO_ADDON",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A user extension.
    Extension,
    /// A thread host for extensions.
    ExtensionGroup,
}

/// One node of a graph descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDefinition {
    /// Node kind.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Hosting app URI; unset means the local app.
    #[serde(default)]
    pub app: Option<String>,
    /// Registered factory name (extensions).
    #[serde(default)]
    pub addon: Option<String>,
    /// Instance name, unique within its parent.
    pub name: String,
    /// Parent group name (extension nodes only).
    #[serde(default)]
    pub extension_group: Option<String>,
    /// Initial property tree handed to the extension's env.
    #[serde(default)]
    pub property: serde_json::Value,
}

/// One routing rule: messages with `name` go to `dest`.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteRule {
    /// Message name to match.
    pub name: String,
    /// Destination set (at least one).
    pub dest: Vec<Location>,
}

/// Routing rules attached to one source extension.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDefinition {
    /// Hosting app URI of the source; unset means the local app.
    #[serde(default)]
    pub app: Option<String>,
    /// Source group name.
    pub extension_group: String,
    /// Source extension name.
    pub extension: String,
    /// Command routes.
    #[serde(default)]
    pub cmd: Vec<RouteRule>,
    /// Data frame routes.
    #[serde(default)]
    pub data: Vec<RouteRule>,
    /// Audio frame routes.
    #[serde(default)]
    pub audio_frame: Vec<RouteRule>,
    /// Video frame routes.
    #[serde(default)]
    pub video_frame: Vec<RouteRule>,
}

/// A full graph descriptor, as parsed from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphDefinition {
    /// Instance name; engines fall back to a generated id when unset.
    #[serde(default)]
    pub name: Option<String>,
    /// Start this graph when the app loads its properties.
    #[serde(default)]
    pub auto_start: bool,
    /// Graph nodes.
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    /// Routing rules.
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,
}

impl GraphDefinition {
    /// Parses a descriptor from JSON text.
    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        serde_json::from_str(text).map_err(|e| GraphError::Parse(e.to_string()))
    }

    /// Parses a descriptor from an already-decoded JSON tree.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, GraphError> {
        serde_json::from_value(value.clone()).map_err(|e| GraphError::Parse(e.to_string()))
    }
}

/// Message classes that route independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// Commands.
    Cmd,
    /// Data frames.
    Data,
    /// Audio frames.
    AudioFrame,
    /// Video frames.
    VideoFrame,
}

impl RouteKind {
    /// The route class of a message type, if it routes through the graph.
    #[must_use]
    pub fn of(msg_type: MsgType) -> Option<Self> {
        match msg_type {
            MsgType::Data => Some(Self::Data),
            MsgType::AudioFrame => Some(Self::AudioFrame),
            MsgType::VideoFrame => Some(Self::VideoFrame),
            ty if ty.is_cmd_like() => Some(Self::Cmd),
            _ => None,
        }
    }
}

/// One extension slot inside a compiled graph.
#[derive(Debug, Clone)]
pub struct ExtensionSpec {
    /// Instance name.
    pub name: String,
    /// Factory to instantiate from.
    pub addon: String,
    /// Initial properties for the extension's env.
    pub property: serde_json::Value,
}

/// One group inside a compiled graph.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    /// Group name.
    pub name: String,
    /// Extensions hosted by this group, in node order.
    pub extensions: Vec<ExtensionSpec>,
}

/// A compiled, immutable graph: group layout plus routing table.
#[derive(Debug)]
pub struct Graph {
    groups: Vec<GroupSpec>,
    group_of: HashMap<String, String>,
    routes: HashMap<(String, RouteKind, String), Vec<Location>>,
}

impl Graph {
    /// Validates a definition against the local app URI and compiles it.
    ///
    /// Only nodes hosted by the local app (no `app` field, or one equal
    /// to `app_uri`) are instantiated; destinations pointing at other
    /// apps are kept as-is and leave through the app's egress.
    pub fn compile(def: &GraphDefinition, app_uri: &str) -> Result<Self, GraphError> {
        let is_local =
            |app: &Option<String>| app.as_deref().map_or(true, |uri| uri == app_uri);

        let mut groups: Vec<GroupSpec> = Vec::new();
        let mut group_of: HashMap<String, String> = HashMap::new();

        for node in &def.nodes {
            if node.node_type != NodeType::ExtensionGroup || !is_local(&node.app) {
                continue;
            }
            if groups.iter().any(|g| g.name == node.name) {
                return Err(GraphError::DuplicateNode(node.name.clone()));
            }
            groups.push(GroupSpec {
                name: node.name.clone(),
                extensions: Vec::new(),
            });
        }

        for node in &def.nodes {
            if node.node_type != NodeType::Extension || !is_local(&node.app) {
                continue;
            }
            let group_name = node.extension_group.clone().unwrap_or_default();
            let Some(group) = groups.iter_mut().find(|g| g.name == group_name) else {
                return Err(GraphError::MissingGroup {
                    extension: node.name.clone(),
                    group: group_name,
                });
            };
            if group_of.contains_key(&node.name) {
                return Err(GraphError::DuplicateNode(node.name.clone()));
            }
            let addon = node
                .addon
                .clone()
                .ok_or_else(|| GraphError::NoAddon(node.name.clone()))?;
            group.extensions.push(ExtensionSpec {
                name: node.name.clone(),
                addon,
                property: node.property.clone(),
            });
            group_of.insert(node.name.clone(), group.name.clone());
        }

        let mut routes: HashMap<(String, RouteKind, String), Vec<Location>> = HashMap::new();
        for conn in &def.connections {
            if !is_local(&conn.app) {
                continue;
            }
            if !group_of.contains_key(&conn.extension) {
                return Err(GraphError::UnknownExtension(conn.extension.clone()));
            }
            let mut add = |kind: RouteKind, rules: &[RouteRule]| -> Result<(), GraphError> {
                for rule in rules {
                    for dest in &rule.dest {
                        if is_local(&dest.app_uri) {
                            let name = dest.extension.clone().unwrap_or_default();
                            if !group_of.contains_key(&name) {
                                return Err(GraphError::UnknownExtension(name));
                            }
                        }
                    }
                    routes
                        .entry((conn.extension.clone(), kind, rule.name.clone()))
                        .or_default()
                        .extend(rule.dest.iter().cloned());
                }
                Ok(())
            };
            add(RouteKind::Cmd, &conn.cmd)?;
            add(RouteKind::Data, &conn.data)?;
            add(RouteKind::AudioFrame, &conn.audio_frame)?;
            add(RouteKind::VideoFrame, &conn.video_frame)?;
        }

        Ok(Self {
            groups,
            group_of,
            routes,
        })
    }

    /// Looks up destinations for `(source extension, kind, message name)`.
    #[must_use]
    pub fn route(&self, src_extension: &str, kind: RouteKind, name: &str) -> &[Location] {
        self.routes
            .get(&(src_extension.to_string(), kind, name.to_string()))
            .map_or(&[], Vec::as_slice)
    }

    /// The group layout, in node order.
    #[must_use]
    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    /// The group hosting `extension`, if any.
    #[must_use]
    pub fn group_of(&self, extension: &str) -> Option<&str> {
        self.group_of.get(extension).map(String::as_str)
    }

    /// Total number of locally hosted extensions.
    #[must_use]
    pub fn extension_count(&self) -> usize {
        self.groups.iter().map(|g| g.extensions.len()).sum()
    }
}
