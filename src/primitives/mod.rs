// ============================================================================
// spark-store - Primitives Module
// Reactive cells, tracked computations and ownership scopes
// ============================================================================

pub mod cell;
pub mod effect;
pub mod scope;

pub use cell::{ReactiveCell, cell, cell_with_equals, never_equals};
pub use effect::{CleanupFn, Effect, effect, effect_tracking, effect_with_cleanup};
pub use scope::{Scope, current_scope, on_scope_dispose, scope};
