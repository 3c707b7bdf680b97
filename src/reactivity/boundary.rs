// ============================================================================
// pulse-signals - Error Boundaries
// Containing panics from effects and computeds
// ============================================================================
//
// A boundary is a dynamic scope: nodes created inside it remember it, and a
// panic during one of their later runs is delivered to the innermost
// enclosing boundary that has a handler. Boundaries nest through parent
// links, and each error is handled exactly once. An error with no boundary
// anywhere up the chain is logged and stashed for the host to drain with
// `take_unhandled_errors`, so it surfaces without unwinding the write that
// triggered the failing run.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use thiserror::Error;
use tracing::error;

// =============================================================================
// REACTIVE ERROR
// =============================================================================

/// An error captured from a panicking effect or computed.
#[derive(Debug, Clone, Error)]
#[error("reactive computation failed: {message}")]
pub struct ReactiveError {
    message: String,
}

impl ReactiveError {
    /// The panic message, if the payload carried one.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("panic with non-string payload")
        };
        Self { message }
    }
}

// =============================================================================
// BOUNDARY CONTEXT
// =============================================================================

/// Identity of one boundary scope.
///
/// Nodes created while a boundary is active hold an `Rc` to its context, so
/// the handler registration lives as long as any node that might still route
/// errors to it.
pub struct BoundaryContext {
    id: u64,
    parent: Option<Rc<BoundaryContext>>,
}

impl Drop for BoundaryContext {
    fn drop(&mut self) {
        let id = self.id;
        // try_with: thread-local teardown order is unspecified at exit
        let _ = HANDLERS.try_with(|handlers| {
            handlers.borrow_mut().remove(&id);
        });
    }
}

type Handler = Rc<dyn Fn(&ReactiveError)>;

thread_local! {
    static NEXT_ID: Cell<u64> = const { Cell::new(1) };
    static HANDLERS: RefCell<HashMap<u64, Handler>> = RefCell::new(HashMap::new());
    static ACTIVE: RefCell<Vec<Rc<BoundaryContext>>> = const { RefCell::new(Vec::new()) };
    static UNHANDLED: RefCell<Vec<ReactiveError>> = const { RefCell::new(Vec::new()) };
}

/// The innermost boundary currently active, if any.
///
/// Effects and computeds call this at creation to capture their boundary.
/// Inside a boundary-wrapped closure this returns the closure's own context,
/// which a caller can hold on to and retarget later with
/// [`set_error_boundary`].
pub fn current_boundary() -> Option<Rc<BoundaryContext>> {
    ACTIVE.with(|active| active.borrow().last().cloned())
}

/// Register or replace the handler for an existing boundary context.
///
/// Errors from effects and computeds that captured `ctx` at creation are
/// routed to `handler` from now on. The registration lives until the
/// context itself drops.
pub fn set_error_boundary(ctx: &Rc<BoundaryContext>, handler: impl Fn(&ReactiveError) + 'static) {
    HANDLERS.with(|handlers| {
        handlers.borrow_mut().insert(ctx.id, Rc::new(handler));
    });
}

/// Deliver an error to the innermost boundary in the chain with a live
/// handler. Exactly one handler sees the error. With no handler anywhere,
/// the error is logged and stashed for [`take_unhandled_errors`]; the write
/// that triggered the failing run returns normally either way.
pub(crate) fn handle_effect_error(boundary: Option<Rc<BoundaryContext>>, err: ReactiveError) {
    let mut cursor = boundary;
    while let Some(ctx) = cursor {
        let handler = HANDLERS.with(|handlers| handlers.borrow().get(&ctx.id).cloned());
        if let Some(handler) = handler {
            handler(&err);
            return;
        }
        cursor = ctx.parent.clone();
    }

    error!(error = %err, "unhandled error escaped the reactive graph");
    UNHANDLED.with(|unhandled| unhandled.borrow_mut().push(err));
}

/// Drain the errors that escaped every boundary on this thread.
///
/// The engine never unwinds a signal write over a failing effect; errors
/// with no enclosing boundary accumulate here instead. A host that wants
/// them to surface drains this after its own scheduling tick and decides
/// whether to log, report, or panic.
pub fn take_unhandled_errors() -> Vec<ReactiveError> {
    UNHANDLED.with(|unhandled| unhandled.borrow_mut().split_off(0))
}

// =============================================================================
// WITH ERROR BOUNDARY
// =============================================================================

/// Wrap a closure in an error boundary.
///
/// The returned closure runs `f` with the boundary active. Panics during the
/// call itself, and panics during later runs of effects or computeds created
/// inside it, are delivered to `handler` instead of unwinding. Each call
/// returns `Some(result)` on success and `None` if `f` panicked.
///
/// Boundaries nest: the innermost one around a node's creation site wins.
///
/// # Example
///
/// ```
/// use pulse_signals::{effect, signal, with_error_boundary};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(1);
/// let errors = Rc::new(Cell::new(0));
///
/// let mut guarded = {
///     let (count, errors) = (count.clone(), errors.clone());
///     with_error_boundary(
///         move || {
///             let count = count.clone();
///             effect(move || {
///                 if count.get() > 10 {
///                     panic!("too big");
///                 }
///             })
///         },
///         move |_err| errors.set(errors.get() + 1),
///     )
/// };
/// let _handle = guarded().expect("creation succeeds");
///
/// count.set(100); // effect panics, boundary absorbs it
/// assert_eq!(errors.get(), 1);
/// ```
pub fn with_error_boundary<R, F, H>(mut f: F, handler: H) -> impl FnMut() -> Option<R>
where
    F: FnMut() -> R + 'static,
    H: Fn(&ReactiveError) + 'static,
{
    let handler: Handler = Rc::new(handler);

    move || {
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        let ctx = Rc::new(BoundaryContext {
            id,
            parent: current_boundary(),
        });

        HANDLERS.with(|handlers| {
            handlers.borrow_mut().insert(id, handler.clone());
        });
        ACTIVE.with(|active| active.borrow_mut().push(ctx.clone()));

        // Pop the scope even if f panics
        struct ActiveGuard;
        impl Drop for ActiveGuard {
            fn drop(&mut self) {
                ACTIVE.with(|active| {
                    active.borrow_mut().pop();
                });
            }
        }

        let result = {
            let _guard = ActiveGuard;
            catch_unwind(AssertUnwindSafe(&mut f))
        };

        match result {
            Ok(value) => Some(value),
            Err(payload) => {
                handler(&ReactiveError::from_panic(payload));
                None
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
