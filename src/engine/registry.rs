//! Node Registry - Id allocation and non-owning lookup for bound nodes.
//!
//! Manages the lifecycle of node ids:
//! - Monotonic id allocation (ids are never reused, so stale ids stay dead)
//! - Id → node lookup through weak references
//! - Destroy callbacks registered per id
//!
//! Parents own their children through array accessors. Everything else that
//! needs to reach a node later (control event handlers, parent links, the
//! attachment claim on an instance) stores a [`NodeId`] and resolves it here.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::node::{Node, NodeInner};

/// Stable identifier of a bound node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn raw(self) -> usize {
        self.0
    }
}

// =============================================================================
// Registry State
// =============================================================================

thread_local! {
    /// Live nodes by id.
    static NODES: RefCell<HashMap<NodeId, Weak<NodeInner>>> = RefCell::new(HashMap::new());

    /// Next id to hand out.
    static NEXT_ID: RefCell<usize> = const { RefCell::new(0) };

    /// Destroy callbacks registered per id.
    static DESTROY_CALLBACKS: RefCell<HashMap<NodeId, Vec<Box<dyn FnOnce()>>>> = RefCell::new(HashMap::new());
}

// =============================================================================
// Allocation
// =============================================================================

/// Allocate an id for a node under construction.
pub fn allocate_id() -> NodeId {
    NEXT_ID.with(|next| {
        let mut next = next.borrow_mut();
        let id = NodeId(*next);
        *next += 1;
        id
    })
}

/// Make a constructed node reachable by id.
pub(crate) fn register(id: NodeId, node: &Rc<NodeInner>) {
    NODES.with(|map| {
        map.borrow_mut().insert(id, Rc::downgrade(node));
    });
}

/// Release an id: run its destroy callbacks and drop the lookup entry.
pub(crate) fn release(id: NodeId) {
    run_destroy_callbacks(id);
    forget(id);
}

/// Drop the lookup entry and any destroy callbacks without running them.
pub(crate) fn forget(id: NodeId) {
    // Entries can be forgotten while a thread is tearing down
    let _ = NODES.try_with(|map| {
        if let Ok(mut map) = map.try_borrow_mut() {
            map.remove(&id);
        }
    });
    let callbacks = DESTROY_CALLBACKS
        .try_with(|callbacks| callbacks.try_borrow_mut().ok().and_then(|mut c| c.remove(&id)))
        .ok()
        .flatten();
    // Captured state may own other nodes; drop it outside the borrow
    drop(callbacks);
}

// =============================================================================
// Destroy Callbacks
// =============================================================================

/// Register a callback to run when the node with `id` is destroyed.
pub fn on_destroy(id: NodeId, callback: impl FnOnce() + 'static) {
    DESTROY_CALLBACKS.with(|callbacks| {
        callbacks
            .borrow_mut()
            .entry(id)
            .or_default()
            .push(Box::new(callback));
    });
}

fn run_destroy_callbacks(id: NodeId) {
    let callbacks = DESTROY_CALLBACKS.with(|callbacks| callbacks.borrow_mut().remove(&id));
    if let Some(callbacks) = callbacks {
        for callback in callbacks {
            callback();
        }
    }
}

// =============================================================================
// Lookups
// =============================================================================

/// Resolve an id to a live node.
pub fn get_node(id: NodeId) -> Option<Node> {
    let inner = NODES.with(|map| map.borrow().get(&id).and_then(Weak::upgrade))?;
    Some(Node::from_inner(inner))
}

/// Check if an id currently resolves to a node.
pub fn is_allocated(id: NodeId) -> bool {
    NODES.with(|map| map.borrow().get(&id).is_some_and(|w| w.strong_count() > 0))
}

/// Number of live nodes.
pub fn get_allocated_count() -> usize {
    NODES.with(|map| map.borrow().values().filter(|w| w.strong_count() > 0).count())
}

// =============================================================================
// Reset (for testing)
// =============================================================================

/// Reset all registry state (for testing).
pub fn reset_registry() {
    NODES.with(|map| map.borrow_mut().clear());
    NEXT_ID.with(|next| *next.borrow_mut() = 0);
    DESTROY_CALLBACKS.with(|callbacks| callbacks.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_allocate_id_is_monotonic() {
        reset_registry();

        let a = allocate_id();
        let b = allocate_id();
        let c = allocate_id();

        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(c.raw(), 2);
    }

    #[test]
    fn test_unregistered_ids_do_not_resolve() {
        reset_registry();

        let id = allocate_id();
        assert!(!is_allocated(id));
        assert!(get_node(id).is_none());
        assert_eq!(get_allocated_count(), 0);
    }

    #[test]
    fn test_destroy_callback() {
        reset_registry();

        let called = Rc::new(Cell::new(false));
        let called_clone = called.clone();

        let id = allocate_id();
        on_destroy(id, move || {
            called_clone.set(true);
        });

        assert!(!called.get());
        release(id);
        assert!(called.get());

        // Callbacks run once
        called.set(false);
        release(id);
        assert!(!called.get());
    }

    #[test]
    fn test_forget_drops_callbacks_unrun() {
        reset_registry();

        let called = Rc::new(Cell::new(false));
        let called_clone = called.clone();

        let id = allocate_id();
        on_destroy(id, move || called_clone.set(true));
        assert_eq!(Rc::strong_count(&called), 2);

        forget(id);
        assert!(!called.get());
        assert_eq!(Rc::strong_count(&called), 1);

        release(id);
        assert!(!called.get());
    }
}
