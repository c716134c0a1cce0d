// ============================================================================
// spark-store - Cell Registries
// Per-target maps from key to reactive cell
// ============================================================================
//
// Every target carries two registries, both absent until first needed:
//
// - the value registry: one cell per key holding the key's raw value, plus
//   the structural cell that fires on every write to the target
// - the existence registry: one boolean cell per key answering "is this key
//   present", written only when presence flips
//
// Cells are handed out as clones so no registry borrow is ever held while a
// cell is read or written.
// ============================================================================

use std::ops::Range;

use ahash::AHashMap;

use crate::core::context::is_tracking;
use crate::core::types::EqualsFn;
use crate::primitives::cell::{ReactiveCell, never_equals};
use crate::store::target::Target;
use crate::store::value::{Key, Value};

#[derive(Default)]
pub(crate) struct ValueRegistry {
    cells: AHashMap<Key, ReactiveCell<Value>>,
    structural: Option<ReactiveCell<()>>,
}

#[derive(Default)]
pub(crate) struct ExistenceRegistry {
    cells: AHashMap<Key, ReactiveCell<bool>>,
}

fn same_value(a: &Value, b: &Value) -> bool {
    a.same(b)
}

fn same_bool(a: &bool, b: &bool) -> bool {
    a == b
}

/// Fetch the cell for `key`, allocating it seeded with `initial` if absent.
pub(crate) fn get_or_create_cell<T: 'static>(
    cells: &mut AHashMap<Key, ReactiveCell<T>>,
    key: &Key,
    initial: T,
    equals: EqualsFn<T>,
) -> ReactiveCell<T> {
    if let Some(cell) = cells.get(key) {
        return cell.clone();
    }

    tracing::trace!(message = "store.cell.alloc", key = %key);
    let cell = ReactiveCell::new_with_equals(initial, equals);
    cells.insert(key.clone(), cell.clone());
    cell
}

// =============================================================================
// VALUE CELLS
// =============================================================================

pub(crate) fn value_cell(target: &Target, key: &Key) -> Option<ReactiveCell<Value>> {
    target
        .inner()
        .values
        .borrow()
        .as_ref()
        .and_then(|registry| registry.cells.get(key).cloned())
}

/// Value cells of the array indices in `range`, for slots cut off by a
/// shrinking length
pub(crate) fn index_cells_in(target: &Target, range: Range<usize>) -> Vec<ReactiveCell<Value>> {
    target.inner().values.borrow().as_ref().map_or_else(Vec::new, |registry| {
        registry
            .cells
            .iter()
            .filter(|(key, _)| key.as_index().is_some_and(|i| range.contains(&i)))
            .map(|(_, cell)| cell.clone())
            .collect()
    })
}

pub(crate) fn value_cell_or_create(target: &Target, key: &Key, initial: Value) -> ReactiveCell<Value> {
    let mut values = target.inner().values.borrow_mut();
    let registry = values.get_or_insert_with(ValueRegistry::default);
    get_or_create_cell(&mut registry.cells, key, initial, same_value)
}

// =============================================================================
// EXISTENCE CELLS
// =============================================================================

pub(crate) fn existence_cell(target: &Target, key: &Key) -> Option<ReactiveCell<bool>> {
    target
        .inner()
        .exists
        .borrow()
        .as_ref()
        .and_then(|registry| registry.cells.get(key).cloned())
}

pub(crate) fn existence_cell_or_create(target: &Target, key: &Key, initial: bool) -> ReactiveCell<bool> {
    let mut exists = target.inner().exists.borrow_mut();
    let registry = exists.get_or_insert_with(ExistenceRegistry::default);
    get_or_create_cell(&mut registry.cells, key, initial, same_bool)
}

// =============================================================================
// STRUCTURAL CELL
// =============================================================================

fn structural_cell(target: &Target) -> Option<ReactiveCell<()>> {
    target
        .inner()
        .values
        .borrow()
        .as_ref()
        .and_then(|registry| registry.structural.clone())
}

/// Subscribe the running computation to every write on `target`.
///
/// Outside a tracked computation this allocates nothing.
pub fn track_self(target: &Target) {
    if !is_tracking() {
        return;
    }

    let cell = {
        let mut values = target.inner().values.borrow_mut();
        let registry = values.get_or_insert_with(ValueRegistry::default);
        registry
            .structural
            .get_or_insert_with(|| {
                tracing::trace!(message = "store.cell.alloc", key = "<self>");
                ReactiveCell::new_with_equals((), never_equals)
            })
            .clone()
    };
    cell.track();
}

/// Fire the structural cell, if anyone ever subscribed to it
pub(crate) fn dirty_structural(target: &Target) {
    if let Some(cell) = structural_cell(target) {
        cell.write(());
    }
}

/// Allocated cells across both registries, structural cell included
pub(crate) fn cell_count(target: &Target) -> usize {
    let inner = target.inner();
    let values = inner.values.borrow().as_ref().map_or(0, |registry| {
        registry.cells.len() + usize::from(registry.structural.is_some())
    });
    let exists = inner
        .exists
        .borrow()
        .as_ref()
        .map_or(0, |registry| registry.cells.len());
    values + exists
}
