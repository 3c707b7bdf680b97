// ============================================================================
// pulse-signals - Runtime Context
// Thread-local state for tracking the currently computing node and batching
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::types::Dependent;

// =============================================================================
// RUNTIME CONTEXT
// =============================================================================

/// Thread-local runtime context holding all global state for reactivity.
///
/// One context per thread, living for the life of the process. The engine is
/// single-threaded and cooperative: every graph touches this context from the
/// same thread, so Cell/RefCell suffice.
pub struct RuntimeContext {
    /// The node (effect or computed) currently executing its computation.
    /// At most one node computes at a time per thread.
    pub active_node: RefCell<Option<Weak<dyn Dependent>>>,

    /// Whether we're currently untracking (reading without creating dependencies)
    pub untracking: Cell<bool>,

    /// Current batch depth (for nested batches)
    pub batch_depth: Cell<u32>,

    /// Effects collected during a batch, flushed once when depth returns to 0.
    /// Deduplicated by pointer identity on insert (set semantics).
    pub pending: RefCell<Vec<Weak<dyn Dependent>>>,
}

impl RuntimeContext {
    /// Create a new runtime context with default values
    pub fn new() -> Self {
        Self {
            active_node: RefCell::new(None),
            untracking: Cell::new(false),
            batch_depth: Cell::new(0),
            pending: RefCell::new(Vec::new()),
        }
    }

    // =========================================================================
    // ACTIVE NODE TRACKING
    // =========================================================================

    /// Set the active node, returning the previous one
    pub fn set_active_node(
        &self,
        node: Option<Weak<dyn Dependent>>,
    ) -> Option<Weak<dyn Dependent>> {
        self.active_node.replace(node)
    }

    /// Get the active node
    pub fn get_active_node(&self) -> Option<Weak<dyn Dependent>> {
        self.active_node.borrow().clone()
    }

    /// Check if there's an active node
    pub fn has_active_node(&self) -> bool {
        self.active_node.borrow().is_some()
    }

    /// Set untracking mode, returning the previous value
    pub fn set_untracking(&self, value: bool) -> bool {
        self.untracking.replace(value)
    }

    /// Check if currently untracking
    pub fn is_untracking(&self) -> bool {
        self.untracking.get()
    }

    // =========================================================================
    // BATCHING
    // =========================================================================

    /// Increment batch depth, returns new depth
    pub fn enter_batch(&self) -> u32 {
        let depth = self.batch_depth.get() + 1;
        self.batch_depth.set(depth);
        depth
    }

    /// Decrement batch depth, returns new depth
    pub fn exit_batch(&self) -> u32 {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        depth
    }

    /// Get current batch depth
    pub fn get_batch_depth(&self) -> u32 {
        self.batch_depth.get()
    }

    /// Check if currently in a batch
    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    /// Add an effect to the pending set, deduplicated by pointer identity.
    ///
    /// A node already in the set is not added again, so N writes to its
    /// dependencies inside one batch yield a single scheduled run.
    pub fn add_pending(&self, node: Weak<dyn Dependent>) {
        let node_ptr = node.as_ptr() as *const ();
        let mut pending = self.pending.borrow_mut();
        let already_queued = pending
            .iter()
            .any(|w| w.as_ptr() as *const () == node_ptr);
        if !already_queued {
            pending.push(node);
        }
    }

    /// Take all pending effects, leaving the set empty
    pub fn take_pending(&self) -> Vec<Weak<dyn Dependent>> {
        self.pending.replace(Vec::new())
    }

    /// Number of effects currently awaiting the batch flush
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    /// The thread-local runtime context
    static CONTEXT: RuntimeContext = RuntimeContext::new();
}

/// Access the thread-local runtime context.
///
/// # Example
///
/// ```ignore
/// with_context(|ctx| {
///     ctx.enter_batch();
/// });
/// ```
pub fn with_context<R>(f: impl FnOnce(&RuntimeContext) -> R) -> R {
    CONTEXT.with(f)
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Check if currently tracking dependencies (inside a node, not untracking)
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.has_active_node() && !ctx.is_untracking())
}

/// Check if currently untracking
pub fn is_untracking() -> bool {
    with_context(|ctx| ctx.is_untracking())
}

/// Check if currently in a batch
pub fn is_batching() -> bool {
    with_context(|ctx| ctx.is_batching())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::EFFECT;
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct StubNode {
        flags: Cell<u32>,
        deps: RefCell<Vec<Rc<dyn crate::core::types::Observable>>>,
    }

    impl StubNode {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                flags: Cell::new(EFFECT),
                deps: RefCell::new(Vec::new()),
            })
        }
    }

    impl Dependent for StubNode {
        fn flags(&self) -> u32 {
            self.flags.get()
        }

        fn set_flags(&self, flags: u32) {
            self.flags.set(flags);
        }

        fn dependency_count(&self) -> usize {
            self.deps.borrow().len()
        }

        fn add_dependency(&self, source: Rc<dyn crate::core::types::Observable>) {
            self.deps.borrow_mut().push(source);
        }

        fn clear_dependencies(&self) {
            self.deps.borrow_mut().clear();
        }

        fn for_each_dependency(
            &self,
            f: &mut dyn FnMut(&Rc<dyn crate::core::types::Observable>) -> bool,
        ) {
            for dep in self.deps.borrow().iter() {
                if !f(dep) {
                    break;
                }
            }
        }

        fn remove_dependency(&self, source: &Rc<dyn crate::core::types::Observable>) {
            let source_ptr = Rc::as_ptr(source) as *const ();
            self.deps
                .borrow_mut()
                .retain(|dep| Rc::as_ptr(dep) as *const () != source_ptr);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_observable(&self) -> Option<Rc<dyn crate::core::types::Observable>> {
            None
        }
    }

    #[test]
    fn context_creation() {
        with_context(|ctx| {
            assert!(!ctx.has_active_node());
            assert!(!ctx.is_untracking());
            assert_eq!(ctx.get_batch_depth(), 0);
            assert_eq!(ctx.pending_count(), 0);
        });
    }

    #[test]
    fn batch_depth_counts_nesting() {
        with_context(|ctx| {
            assert!(!ctx.is_batching());

            // Three enters, three exits; batching holds until the last exit
            for expected in 1..=3 {
                assert_eq!(ctx.enter_batch(), expected);
            }
            for expected in (0..=2).rev() {
                assert_eq!(ctx.exit_batch(), expected);
                assert_eq!(ctx.is_batching(), expected > 0);
            }

            // Exit below zero saturates instead of wrapping
            assert_eq!(ctx.exit_batch(), 0);
        });
    }

    #[test]
    fn untracking_swap_returns_previous_state() {
        with_context(|ctx| {
            assert!(!ctx.set_untracking(true));
            assert!(ctx.is_untracking());
            assert!(ctx.set_untracking(false));
            assert!(!ctx.is_untracking());
        });
    }

    #[test]
    fn pending_set_deduplicates_by_pointer() {
        let node = StubNode::new();
        let other = StubNode::new();

        with_context(|ctx| {
            let as_dependent: Rc<dyn Dependent> = node.clone();
            ctx.add_pending(Rc::downgrade(&as_dependent));
            ctx.add_pending(Rc::downgrade(&as_dependent));
            ctx.add_pending(Rc::downgrade(&as_dependent));
            assert_eq!(ctx.pending_count(), 1);

            let other_dependent: Rc<dyn Dependent> = other.clone();
            ctx.add_pending(Rc::downgrade(&other_dependent));
            assert_eq!(ctx.pending_count(), 2);

            let taken = ctx.take_pending();
            assert_eq!(taken.len(), 2);
            assert_eq!(ctx.pending_count(), 0);
        });
    }

    #[test]
    fn convenience_functions() {
        assert!(!is_tracking());
        assert!(!is_untracking());
        assert!(!is_batching());
    }
}
