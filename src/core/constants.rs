// ============================================================================
// spark-store - Constants
// Flag bits for cells and tracked computations
// ============================================================================

// =============================================================================
// NODE TYPE FLAGS
// =============================================================================

/// Reactive cell (a subscribable value slot)
pub const CELL: u32 = 1 << 0;

/// Tracked computation (effect)
pub const EFFECT: u32 = 1 << 1;

// =============================================================================
// STATE FLAGS
// =============================================================================

/// Up-to-date
pub const CLEAN: u32 = 1 << 10;

/// A dependency changed; needs to re-run
pub const DIRTY: u32 = 1 << 11;

/// Currently executing its body (dependencies are being collected)
pub const REACTION_IS_UPDATING: u32 = 1 << 12;

/// Disposed; never runs again
pub const DESTROYED: u32 = 1 << 13;

/// Paused by its scope
pub const INERT: u32 = 1 << 14;

/// Has completed at least one run
pub const EFFECT_RAN: u32 = 1 << 15;

// =============================================================================
// STATUS MASK
// =============================================================================

/// Mask to clear the status bits (CLEAN, DIRTY)
pub const STATUS_MASK: u32 = !(DIRTY | CLEAN);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_distinct() {
        let all_flags = [
            CELL,
            EFFECT,
            CLEAN,
            DIRTY,
            REACTION_IS_UPDATING,
            DESTROYED,
            INERT,
            EFFECT_RAN,
        ];

        for (i, &a) in all_flags.iter().enumerate() {
            for (j, &b) in all_flags.iter().enumerate() {
                if i != j {
                    assert_eq!(a & b, 0, "flags {i} and {j} overlap: {a:b} & {b:b}");
                }
            }
        }
    }

    #[test]
    fn status_mask_keeps_type_bits() {
        let flags = EFFECT | DIRTY | EFFECT_RAN;
        let cleared = flags & STATUS_MASK;

        assert_eq!(cleared & DIRTY, 0);
        assert_ne!(cleared & EFFECT, 0);
        assert_ne!(cleared & EFFECT_RAN, 0);
    }
}
