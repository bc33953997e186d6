//! Command/result correlation tables.
//!
//! For every command an extension emits, the engine records one
//! [`PathOut`] per destination in the origin's outbox. For every command
//! an extension receives, it records a [`PathIn`] naming the upstream
//! hop. Results walk these records backwards: the responder's `PathIn`
//! names the upstream extension, whose `PathOut` says whether a reply
//! handler is waiting there or the walk continues further up, until it
//! reaches the external client that injected the command.
//!
//! A final result (or a deadline firing) consumes exactly one `PathOut`
//! record; streaming results leave the records in place.

use std::collections::HashMap;
use std::time::Duration;

/// Where a received command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// Another extension in this graph.
    Extension(String),
    /// An external client (or remote app) through the app's ingress.
    External,
    /// The engine itself (timers); results routed here are discarded.
    Engine,
}

/// Outbox record: one per (origin extension, command, destination).
#[derive(Debug, Clone)]
pub struct PathOut {
    /// Whether a reply handler waits on the origin's group thread.
    pub has_handler: bool,
    /// Optional result deadline.
    pub deadline: Option<Duration>,
}

/// Inbox record: one per (destination extension, command).
#[derive(Debug, Clone)]
pub struct PathIn {
    /// The hop that delivered the command.
    pub upstream: Upstream,
    /// Correlation token carried by the command, kept for the egress
    /// fallback.
    pub seq_id: String,
}

/// Result of resolving an outbox record.
#[derive(Debug, Clone, Copy)]
pub struct OutResolution {
    /// Whether a handler waits at the origin.
    pub has_handler: bool,
    /// Whether the origin's record list for this command is now empty
    /// (so the handler can be dropped).
    pub last: bool,
}

/// Both correlation tables of one engine. Lives on the engine thread and
/// is never touched from anywhere else.
#[derive(Debug, Default)]
pub struct PathTable {
    outs: HashMap<(String, String), Vec<PathOut>>,
    ins: HashMap<(String, String), PathIn>,
}

impl PathTable {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outbox entry for `origin`'s command `cmd_id`.
    pub fn add_out(&mut self, origin: &str, cmd_id: &str, record: PathOut) {
        self.outs
            .entry((origin.to_string(), cmd_id.to_string()))
            .or_default()
            .push(record);
    }

    /// Resolves `origin`'s outbox for `cmd_id`.
    ///
    /// When `consume` is set (final results, timeouts) one record is
    /// removed; otherwise the front record is only inspected.
    pub fn resolve_out(
        &mut self,
        origin: &str,
        cmd_id: &str,
        consume: bool,
    ) -> Option<OutResolution> {
        let key = (origin.to_string(), cmd_id.to_string());
        let records = self.outs.get_mut(&key)?;
        if records.is_empty() {
            self.outs.remove(&key);
            return None;
        }
        if consume {
            let record = records.remove(0);
            let last = records.is_empty();
            if last {
                self.outs.remove(&key);
            }
            Some(OutResolution {
                has_handler: record.has_handler,
                last,
            })
        } else {
            Some(OutResolution {
                has_handler: records[0].has_handler,
                last: false,
            })
        }
    }

    /// Records an inbox entry for a command delivered to `dest`.
    pub fn add_in(&mut self, dest: &str, cmd_id: &str, record: PathIn) {
        self.ins
            .insert((dest.to_string(), cmd_id.to_string()), record);
    }

    /// Looks up (and for final results removes) `responder`'s inbox
    /// record for `cmd_id`.
    pub fn resolve_in(&mut self, responder: &str, cmd_id: &str, consume: bool) -> Option<PathIn> {
        let key = (responder.to_string(), cmd_id.to_string());
        if consume {
            self.ins.remove(&key)
        } else {
            self.ins.get(&key).cloned()
        }
    }

    /// Drains everything, returning outstanding outbox keys with their
    /// handler flags and all external inbox records. Used by the stop
    /// protocol to synthesize cancellation results.
    pub fn drain(
        &mut self,
    ) -> (
        Vec<(String, String, bool)>,
        Vec<(String, String, String)>,
    ) {
        let outs = self
            .outs
            .drain()
            .map(|((origin, cmd_id), records)| {
                let has_handler = records.iter().any(|r| r.has_handler);
                (origin, cmd_id, has_handler)
            })
            .collect();
        let externals = self
            .ins
            .drain()
            .filter(|(_, record)| record.upstream == Upstream::External)
            .map(|((responder, cmd_id), record)| (responder, cmd_id, record.seq_id))
            .collect();
        (outs, externals)
    }

    /// Number of outstanding outbox records.
    #[must_use]
    pub fn out_count(&self) -> usize {
        self.outs.values().map(Vec::len).sum()
    }

    /// Number of outstanding inbox records.
    #[must_use]
    pub fn in_count(&self) -> usize {
        self.ins.len()
    }
}
