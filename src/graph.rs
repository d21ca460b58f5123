//! Arena of reactive nodes and their parent edges.
//!
//! The values themselves live in the nodes' own cells; the arena only keeps
//! identity, parent ids and activation state so that the derivation graph can
//! be inspected independently of the subscription machinery.

use std::cell::RefCell;

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

new_key_type! {
	pub struct NodeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
	State,
	Linked,
	Derived,
}

#[derive(Debug, Clone)]
struct Node {
	kind: NodeKind,
	parents: SmallVec<[NodeId; 4]>,
	active: bool,
}

thread_local! {
	static GRAPH: RefCell<SlotMap<NodeId, Node>> = RefCell::new(SlotMap::with_key());
}

/// Parents are always registered before their children, so an edge can
/// never close a cycle.
pub(crate) fn register(kind: NodeKind, parents: &[NodeId]) -> NodeId {
	GRAPH.with(|graph| {
		let mut graph = graph.borrow_mut();
		debug_assert!(parents.iter().all(|p| graph.contains_key(*p)));
		graph.insert(Node {
			kind,
			parents: parents.iter().copied().collect(),
			active: kind != NodeKind::Derived,
		})
	})
}

pub(crate) fn unregister(id: NodeId) {
	// Thread locals may already be gone when values drop during thread exit.
	let _ = GRAPH.try_with(|graph| graph.borrow_mut().remove(id));
}

pub(crate) fn set_active(id: NodeId, active: bool) {
	GRAPH.with(|graph| {
		if let Some(node) = graph.borrow_mut().get_mut(id) {
			node.active = active;
		}
	})
}

/// Whether the node currently holds subscriptions to its parents. State-like
/// nodes are always active.
pub fn is_active(id: NodeId) -> bool {
	GRAPH.with(|graph| graph.borrow().get(id).map_or(false, |n| n.active))
}

pub fn kind(id: NodeId) -> Option<NodeKind> {
	GRAPH.with(|graph| graph.borrow().get(id).map(|n| n.kind))
}

pub fn parents(id: NodeId) -> Vec<NodeId> {
	GRAPH.with(|graph| {
		graph
			.borrow()
			.get(id)
			.map(|n| n.parents.to_vec())
			.unwrap_or_default()
	})
}

pub fn ancestors(id: NodeId) -> Vec<NodeId> {
	let mut stack = parents(id);
	let mut seen = Vec::new();
	while let Some(next) = stack.pop() {
		if !seen.contains(&next) {
			seen.push(next);
			stack.extend(parents(next));
		}
	}
	seen
}

pub fn active_derived() -> usize {
	GRAPH.with(|graph| {
		graph
			.borrow()
			.values()
			.filter(|n| n.kind == NodeKind::Derived && n.active)
			.count()
	})
}
