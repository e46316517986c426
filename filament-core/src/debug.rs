//! Diagnostics
//!
//! Read-only snapshots of the runtime for tooling: which owners exist, which
//! nodes they hold, what state each node is in and who reads whom. Taking a
//! snapshot never runs a computation or changes a dirty state.

use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::Serialize;

use crate::error::Result;
use crate::graph::{DirtyState, NodeId, NodeKind};
use crate::reactive::{with_runtime, Owner, OwnerId};

/// One owner in a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerSnapshot {
    pub id: u64,
    pub parent: Option<u64>,
    pub children: Vec<u64>,
    pub computation: Option<NodeId>,
    pub sources: Vec<NodeId>,
    pub cleanups: usize,
    pub contexts: usize,
    pub error_handler: bool,
}

/// One graph node in a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub state: DirtyState,
    pub depth: usize,
    pub label: Option<String>,
    /// `Debug` rendering of the current value, if the node has one.
    pub value: Option<String>,
    pub owner: Option<u64>,
    pub runs: usize,
    pub errored: bool,
}

/// A dependency edge: `dependent` read `dependency` during its last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct EdgeSnapshot {
    pub dependency: NodeId,
    pub dependent: NodeId,
}

/// A point-in-time copy of (part of) the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphSnapshot {
    pub owners: Vec<OwnerSnapshot>,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl GraphSnapshot {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// MessagePack with field names, for tools that stream snapshots.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// Snapshot of the whole runtime on this thread.
pub fn serialize_graph() -> GraphSnapshot {
    snapshot(None)
}

/// Snapshot of one owner, its descendants and the nodes they hold.
pub fn serialize_owner(owner: Owner) -> GraphSnapshot {
    snapshot(Some(owner.id()))
}

fn snapshot(root: Option<OwnerId>) -> GraphSnapshot {
    with_runtime(|rt| {
        let owners = rt.owners();
        let graph = rt.graph();

        let included: Option<HashSet<OwnerId>> = root.map(|root| {
            let mut seen = HashSet::new();
            let mut queue = VecDeque::from([root]);
            while let Some(id) = queue.pop_front() {
                if let Some(owner) = owners.get(&id) {
                    if seen.insert(id) {
                        queue.extend(owner.children.iter().copied());
                    }
                }
            }
            seen
        });
        let wanted = |id: &OwnerId| included.as_ref().map_or(true, |set| set.contains(id));

        let mut owner_snapshots: Vec<OwnerSnapshot> = owners
            .iter()
            .filter(|(id, _)| wanted(id))
            .map(|(id, owner)| OwnerSnapshot {
                id: id.raw(),
                parent: owner.parent.map(|parent| parent.raw()),
                children: owner.children.iter().map(OwnerId::raw).collect(),
                computation: owner.computation,
                sources: owner.sources.to_vec(),
                cleanups: owner.cleanups.len(),
                contexts: owner.contexts.len(),
                error_handler: owner.error_handler.is_some(),
            })
            .collect();
        owner_snapshots.sort_by_key(|owner| owner.id);

        let node_ids: BTreeSet<NodeId> = match &included {
            None => graph.nodes().map(|node| node.id()).collect(),
            Some(_) => owner_snapshots
                .iter()
                .flat_map(|owner| owner.computation.into_iter().chain(owner.sources.iter().copied()))
                .collect(),
        };

        let mut nodes = Vec::with_capacity(node_ids.len());
        let mut edges = Vec::new();
        for id in &node_ids {
            let Some(node) = graph.get_node(*id) else {
                continue;
            };
            nodes.push(NodeSnapshot {
                id: *id,
                kind: node.kind(),
                state: node.state,
                depth: node.depth,
                label: node.label.clone(),
                value: node.value.as_ref().and_then(|value| value.describe()),
                owner: node.owner.map(|owner| owner.raw()),
                runs: node.runs,
                errored: node.errored,
            });
            edges.extend(node.dependencies().iter().map(|dependency| EdgeSnapshot {
                dependency: *dependency,
                dependent: *id,
            }));
        }
        edges.sort();

        GraphSnapshot {
            owners: owner_snapshots,
            nodes,
            edges,
        }
    })
}

/// A stable identifier for a value: `"s"` followed by the 31-multiplier
/// string hash of its JSON text, computed over UTF-16 code units with
/// 32-bit wrapping. Strings hash their raw text, without quotes.
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let text = match serde_json::to_value(value)? {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    };
    let hash = text
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)));
    Ok(format!("s{hash}"))
}
