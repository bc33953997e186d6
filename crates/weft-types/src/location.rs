//! Message locations.
//!
//! A [`Location`] names a point in the running system: an application,
//! a graph inside it, an extension group inside the graph, and an
//! extension inside the group. Every field is optional so the same type
//! describes partial coordinates (a bare app, a graph, a group) as well
//! as a fully resolved extension address.

use serde::{Deserialize, Serialize};

/// Coordinates of a message source or destination.
///
/// The four fields narrow from process scope down to a single extension:
///
/// | field | names |
/// |-------|-------|
/// | `app_uri` | the hosting application |
/// | `graph_id` | a running graph inside the app |
/// | `group` | an extension group inside the graph |
/// | `extension` | an extension inside the group |
///
/// # Example
///
/// ```
/// use weft_types::Location;
///
/// let dest = Location::extension("msgpack://127.0.0.1:8001/", "0", "g1", "consumer");
/// assert!(dest.is_extension());
///
/// let app_only = Location::app("msgpack://127.0.0.1:8001/");
/// assert!(!app_only.is_extension());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// URI of the hosting application, if known.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "app")]
    pub app_uri: Option<String>,

    /// Graph instance id, if known.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "graph")]
    pub graph_id: Option<String>,

    /// Extension group name, if known.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "extension_group"
    )]
    pub group: Option<String>,

    /// Extension instance name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl Location {
    /// Creates an empty location (all fields unset).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a location naming only an application.
    #[must_use]
    pub fn app(uri: impl Into<String>) -> Self {
        Self {
            app_uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Creates a location naming a graph inside an application.
    #[must_use]
    pub fn graph(uri: impl Into<String>, graph_id: impl Into<String>) -> Self {
        Self {
            app_uri: Some(uri.into()),
            graph_id: Some(graph_id.into()),
            ..Self::default()
        }
    }

    /// Creates a fully resolved extension address.
    #[must_use]
    pub fn extension(
        uri: impl Into<String>,
        graph_id: impl Into<String>,
        group: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            app_uri: Some(uri.into()),
            graph_id: Some(graph_id.into()),
            group: Some(group.into()),
            extension: Some(extension.into()),
        }
    }

    /// Returns `true` if this location resolves down to an extension.
    #[must_use]
    pub fn is_extension(&self) -> bool {
        self.extension.is_some()
    }

    /// Returns `true` if every field is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.app_uri.is_none()
            && self.graph_id.is_none()
            && self.group.is_none()
            && self.extension.is_none()
    }

    /// Returns `true` if this location names the given extension instance,
    /// ignoring the app and graph fields.
    #[must_use]
    pub fn names_extension(&self, group: &str, extension: &str) -> bool {
        self.group.as_deref() == Some(group) && self.extension.as_deref() == Some(extension)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.app_uri.as_deref().unwrap_or("*"),
            self.graph_id.as_deref().unwrap_or("*"),
            self.group.as_deref().unwrap_or("*"),
            self.extension.as_deref().unwrap_or("*"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_location_is_fully_resolved() {
        let loc = Location::extension("uri", "0", "g1", "a");
        assert!(loc.is_extension());
        assert!(!loc.is_empty());
        assert!(loc.names_extension("g1", "a"));
        assert!(!loc.names_extension("g1", "b"));
    }

    #[test]
    fn empty_location() {
        let loc = Location::empty();
        assert!(loc.is_empty());
        assert!(!loc.is_extension());
    }

    #[test]
    fn app_location_keeps_rest_unset() {
        let loc = Location::app("msgpack://127.0.0.1:8001/");
        assert_eq!(loc.app_uri.as_deref(), Some("msgpack://127.0.0.1:8001/"));
        assert!(loc.graph_id.is_none());
        assert!(loc.group.is_none());
    }

    #[test]
    fn display_uses_wildcards_for_unset_fields() {
        let loc = Location::graph("uri", "7");
        assert_eq!(loc.to_string(), "uri/7/*/*");
    }

    #[test]
    fn serde_uses_wire_field_names() {
        let loc = Location::extension("uri", "0", "g1", "a");
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["app"], "uri");
        assert_eq!(json["graph"], "0");
        assert_eq!(json["extension_group"], "g1");
        assert_eq!(json["extension"], "a");

        let back: Location = serde_json::from_value(json).unwrap();
        assert_eq!(back, loc);
    }

    #[test]
    fn serde_tolerates_partial_locations() {
        let loc: Location = serde_json::from_str(r#"{"app":"uri"}"#).unwrap();
        assert_eq!(loc.app_uri.as_deref(), Some("uri"));
        assert!(loc.extension.is_none());
    }
}
