// ============================================================================
// spark-store - Core Module
// Flags, graph traits and the thread-local runtime context
// ============================================================================

pub mod constants;
pub mod context;
pub mod types;

pub use constants::*;
pub use context::{RuntimeContext, is_batching, is_tracking, is_untracking, with_context};
pub use types::{AnyReaction, AnySource, CellInner, EqualsFn, default_equals};
