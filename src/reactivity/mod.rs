// ============================================================================
// spark-store - Reactivity Module
// Dependency tracking, batched update scopes and effect scheduling
// ============================================================================

pub mod batching;
pub mod scheduling;
pub mod tracking;

pub use batching::{batch, peek, untrack};
pub use scheduling::{flush_sync, schedule_effect};
pub use tracking::{is_dirty, mark_reactions, notify_write, remove_reactions, track_read};
