// ============================================================================
// pulse-signals - Constants
// Flag constants for reactive node states
// ============================================================================

// =============================================================================
// NODE TYPE FLAGS
// =============================================================================

/// Node is a source signal (basic reactive value)
pub const SOURCE: u32 = 1 << 0;

/// Node is a computed (memoized derivation)
pub const COMPUTED: u32 = 1 << 1;

/// Node is an effect
pub const EFFECT: u32 = 1 << 2;

// =============================================================================
// NODE STATE FLAGS
// =============================================================================

/// Node is clean (cached value is up-to-date)
pub const CLEAN: u32 = 1 << 10;

/// Node is dirty (needs recomputation before its value can be trusted)
pub const DIRTY: u32 = 1 << 11;

/// Effect has been disposed (terminal state)
pub const DISPOSED: u32 = 1 << 12;

/// Node is currently executing its computation or body
pub const NODE_IS_UPDATING: u32 = 1 << 13;

// =============================================================================
// STATUS MASK (for clearing status bits)
// =============================================================================

/// Mask to clear the status bits (CLEAN, DIRTY)
pub const STATUS_MASK: u32 = !(DIRTY | CLEAN);

// =============================================================================
// TESTS
// =============================================================================
