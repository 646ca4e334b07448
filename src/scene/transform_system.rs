//! Transform System
//!
//! Hierarchy-aware reads and writes over the node arena. Kept apart from
//! [`Scene`](super::Scene) so it only borrows the `SlotMap` of nodes.
//!
//! Every walk here is iterative (explicit stacks), so deep hierarchies do not
//! grow the call stack.
//!
//! # Write protocol
//!
//! A write to node `N` proceeds in three steps:
//! 1. [`settle_subtree`]: every descendant whose *global* is authoritative
//!    recomputes its local against the pre-write parent chain, so the value
//!    it was given is not lost.
//! 2. The write itself (`write_local` / `write_global`).
//! 3. [`invalidate_descendants`]: every descendant's global is marked stale.

use glam::Affine3A;
use slotmap::SlotMap;

use crate::scene::NodeHandle;
use crate::scene::node::SceneNode;

/// World matrix of `handle`, reconciling it and any stale ancestors.
///
/// Walks up until the first ancestor whose cache is clean, then reconciles
/// top-down. Returns identity for an unknown handle.
#[must_use]
pub fn world_matrix(nodes: &SlotMap<NodeHandle, SceneNode>, handle: NodeHandle) -> Affine3A {
    let Some(node) = nodes.get(handle) else {
        return Affine3A::IDENTITY;
    };
    if !node.transform.needs_reconcile() {
        return node.transform.cached_global();
    }

    // Chain of stale nodes, innermost first.
    let mut chain = vec![handle];
    let mut anchor: Option<Affine3A> = None;
    let mut cursor = node.parent;
    while let Some(p) = cursor {
        let Some(parent) = nodes.get(p) else { break };
        if parent.transform.needs_reconcile() {
            chain.push(p);
            cursor = parent.parent;
        } else {
            anchor = Some(parent.transform.cached_global());
            break;
        }
    }

    let mut parent_global = anchor;
    for &h in chain.iter().rev() {
        let t = &nodes[h].transform;
        t.reconcile(parent_global.as_ref());
        parent_global = Some(t.cached_global());
    }
    parent_global.unwrap_or(Affine3A::IDENTITY)
}

/// Local matrix of `handle`. Only a pending global write forces a
/// reconcile; an authoritative local is returned as is.
#[must_use]
pub fn local_matrix(nodes: &SlotMap<NodeHandle, SceneNode>, handle: NodeHandle) -> Affine3A {
    let Some(node) = nodes.get(handle) else {
        return Affine3A::IDENTITY;
    };
    if node.transform.is_global_dirty() {
        let parent_global = node.parent.map(|p| world_matrix(nodes, p));
        node.transform.reconcile(parent_global.as_ref());
    }
    node.transform.cached_local()
}

/// Parent's world matrix, or `None` for a root.
#[must_use]
pub fn parent_world_matrix(
    nodes: &SlotMap<NodeHandle, SceneNode>,
    handle: NodeHandle,
) -> Option<Affine3A> {
    nodes
        .get(handle)
        .and_then(|n| n.parent)
        .map(|p| world_matrix(nodes, p))
}

/// Resolves the local matrix of every descendant whose global is
/// authoritative, using the current (pre-write) parent chain.
pub fn settle_subtree(nodes: &SlotMap<NodeHandle, SceneNode>, handle: NodeHandle) {
    let Some(node) = nodes.get(handle) else { return };
    let mut stack: Vec<NodeHandle> = node.children.clone();
    while let Some(h) = stack.pop() {
        let Some(child) = nodes.get(h) else { continue };
        if child.transform.is_global_dirty() {
            let _ = local_matrix(nodes, h);
        }
        stack.extend_from_slice(&child.children);
    }
}

/// Marks every descendant's global as stale. Does not recompute anything.
pub fn invalidate_descendants(nodes: &SlotMap<NodeHandle, SceneNode>, handle: NodeHandle) {
    let Some(node) = nodes.get(handle) else { return };
    let mut stack: Vec<NodeHandle> = node.children.clone();
    while let Some(h) = stack.pop() {
        let Some(child) = nodes.get(h) else { continue };
        child.transform.invalidate_global();
        stack.extend_from_slice(&child.children);
    }
}

/// Writes the local matrix of `handle` following the write protocol.
pub fn write_local(nodes: &SlotMap<NodeHandle, SceneNode>, handle: NodeHandle, local: Affine3A) {
    let Some(node) = nodes.get(handle) else { return };
    settle_subtree(nodes, handle);
    node.transform.write_local(local);
    invalidate_descendants(nodes, handle);
}

/// Writes the world matrix of `handle` following the write protocol.
pub fn write_global(nodes: &SlotMap<NodeHandle, SceneNode>, handle: NodeHandle, global: Affine3A) {
    let Some(node) = nodes.get(handle) else { return };
    settle_subtree(nodes, handle);
    node.transform.write_global(global);
    invalidate_descendants(nodes, handle);
}

/// Reconciles every node in the subtree rooted at `root`, parents first.
///
/// Reads are lazy, so this is never required for correctness. The renderer
/// calls it once per frame so later reads are plain cache hits.
pub fn update_subtree(nodes: &SlotMap<NodeHandle, SceneNode>, root: NodeHandle) {
    let Some(node) = nodes.get(root) else { return };
    let root_parent = node.parent.map(|p| world_matrix(nodes, p));

    let mut stack: Vec<(NodeHandle, Option<Affine3A>)> = vec![(root, root_parent)];
    while let Some((h, parent_global)) = stack.pop() {
        let Some(n) = nodes.get(h) else { continue };
        n.transform.reconcile(parent_global.as_ref());
        let global = n.transform.cached_global();
        for &child in &n.children {
            stack.push((child, Some(global)));
        }
    }
}
