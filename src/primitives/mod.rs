// ============================================================================
// pulse-signals - Primitives Module
// Core reactive primitives: signal, computed, effect
// ============================================================================

pub mod computed;
pub mod effect;
pub mod signal;

pub use computed::{computed, Computed, ComputedInner};
pub use effect::{
    effect, effect_with_cleanup, effect_with_options, CleanupFn, Disposer, EffectFn, EffectInner,
    EffectOptions,
};
pub use signal::{
    create_signal, signal, signal_with_equals, ReadSignal, Signal, WriteSignal,
};
