// ============================================================================
// spark-store - Store Views
// Tracked reads and notifying writes over a raw target
// ============================================================================
//
// A view is the only way to observe a target. Reads subscribe the running
// effect to exactly the key they touch; writes go through `set_property`,
// which pokes exactly the cells that can have changed:
//
//   value cell      - the key's own value
//   existence cell  - only when the key appears or disappears
//   index cells     - the slots cut off when an array shrinks
//   length cell     - when an array's length changes
//   structural cell - every write, unconditionally
// ============================================================================

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::rc::Rc;

use crate::core::context::is_tracking;
use crate::reactivity::batching::{batch, untrack};
use crate::store::dev;
use crate::store::mutable::unwrap;
use crate::store::registry::{
    dirty_structural, existence_cell, existence_cell_or_create, index_cells_in, track_self,
    value_cell, value_cell_or_create,
};
use crate::store::target::{Accessor, Getter, Property, Setter, Target, array_length};
use crate::store::value::{Key, Value};
use crate::store::wrap::wrap_value;

// =============================================================================
// STORE
// =============================================================================

/// Reactive view over a [`Target`].
///
/// Views are cheap handles typed over the target itself, so every view of
/// the same target is the same view (`ptr_eq`) for as long as the target
/// lives. Nested objects and arrays come back as views too.
///
/// # Example
///
/// ```
/// use spark_store::{create_mutable, effect, object, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = create_mutable(object! { "count" => 0 }).unwrap();
/// let seen = Rc::new(Cell::new(0.0));
///
/// let _e = effect({
///     let (state, seen) = (state.clone(), seen.clone());
///     move || seen.set(state.get("count").as_number().unwrap_or(0.0))
/// });
///
/// state.set("count", 5);
/// assert_eq!(seen.get(), 5.0);
/// ```
#[derive(Clone)]
pub struct Store {
    target: Target,
}

impl Store {
    /// A view over an already wrapped target; see [`wrap`](crate::wrap)
    pub(crate) fn new(target: Target) -> Self {
        Self { target }
    }

    fn target(&self) -> &Target {
        &self.target
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    /// The underlying target, untracked
    pub fn raw(&self) -> Target {
        self.target.clone()
    }

    /// This view
    pub fn proxy(&self) -> Store {
        self.clone()
    }

    /// Subscribe to every write on this target, then return the view
    pub fn track_all(&self) -> Store {
        track_self(self.target());
        self.clone()
    }

    pub fn ptr_eq(&self, other: &Store) -> bool {
        self.target.ptr_eq(&other.target)
    }

    pub fn is_array(&self) -> bool {
        self.target().is_array()
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Tracked read of `key`.
    ///
    /// Outside an effect nothing is allocated. Inside one, the key gets a
    /// value cell unless it is an accessor (the getter's own reads are
    /// tracked instead) or a method inherited from a class.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let target = self.target();

        if let Some(cell) = value_cell(target, &key) {
            return wrap_value(cell.read());
        }

        if let Some(accessor) = target.accessor(&key) {
            let value = accessor
                .get_fn()
                .map_or(Value::Undefined, |get| get(&Value::Store(self.clone())));
            return wrap_value(value);
        }

        let value = target.get(&key);
        if is_tracking() && !target.is_inherited_function(&key) {
            value_cell_or_create(target, &key, value.clone()).track();
        }
        wrap_value(value)
    }

    /// Tracked presence check (own or inherited)
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let target = self.target();
        let present = target.has(&key);
        if is_tracking() {
            existence_cell_or_create(target, &key, present).track();
        }
        present
    }

    /// Own keys; subscribes to the structural cell
    pub fn own_keys(&self) -> Vec<Key> {
        track_self(self.target());
        self.target().own_keys()
    }

    /// Own property descriptor; subscribes to the structural cell.
    ///
    /// Data properties are reported as an enumerable accessor whose getter
    /// and setter go through this view. Declared accessors keep their own
    /// getter and setter.
    pub fn descriptor(&self, key: impl Into<Key>) -> Option<Descriptor> {
        let key = key.into();
        let target = self.target();
        track_self(target);

        match target.property(&key)? {
            Property::Accessor(accessor) => Some(Descriptor {
                get: accessor.get_fn(),
                set: accessor.set_fn(),
                this: target.receiver(),
                enumerable: accessor.is_enumerable(),
                declared: true,
            }),
            Property::Data(_) => {
                let get: Getter = {
                    let (view, key) = (self.clone(), key.clone());
                    Rc::new(move |_: &Value| view.get(&key))
                };
                let set: Setter = {
                    let view = self.clone();
                    Rc::new(move |_: &Value, value: Value| view.set(&key, value))
                };
                Some(Descriptor {
                    get: Some(get),
                    set: Some(set),
                    this: Value::Store(self.clone()),
                    enumerable: true,
                    declared: false,
                })
            }
        }
    }

    /// Tracked length: array length, or own key count of an object
    pub fn len(&self) -> usize {
        if self.is_array() {
            self.get(Key::length()).as_number().map_or(0, |n| n as usize)
        } else {
            self.own_keys().len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every value, in own-key order; array holes read as `Undefined`
    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// Every key/value pair, in own-key order
    pub fn entries(&self) -> Vec<(Key, Value)> {
        track_self(self.target());
        if self.is_array() {
            (0..self.len())
                .map(|i| (Key::Index(i), self.get(i)))
                .collect()
        } else {
            self.target()
                .own_keys()
                .into_iter()
                .map(|key| {
                    let value = self.get(&key);
                    (key, value)
                })
                .collect()
        }
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Assign `key` as one batched update. Nested views are stored as their
    /// raw targets; assigning `Undefined` deletes the key.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = unwrap(value.into());
        batch(|| set_property(self.target(), key, value, false));
    }

    /// Delete `key` as one batched update
    pub fn delete(&self, key: impl Into<Key>) {
        let key = key.into();
        batch(|| set_property(self.target(), key, Value::Undefined, true));
    }

    // =========================================================================
    // BULK SEQUENCE OPERATIONS
    // =========================================================================
    //
    // Each runs as one batch: element and length writes go through `set` and
    // `delete` one by one, dependents run once afterwards. Reads inside are
    // untracked so an effect calling these does not subscribe to the array
    // it is rewriting. On a non-array they do nothing.

    fn raw_len(&self) -> usize {
        self.target().len()
    }

    fn raw_get(&self, i: usize) -> Value {
        self.target().get(i)
    }

    /// Move slot `from` to slot `to`, keeping holes as holes
    fn move_slot(&self, from: usize, to: usize) {
        let value = self.raw_get(from);
        if value.is_undefined() {
            self.delete(to);
        } else {
            self.set(to, value);
        }
    }

    /// Append values, returning the new length
    pub fn push<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> usize {
        if !self.is_array() {
            return 0;
        }
        batch(|| {
            let mut len = self.raw_len();
            for value in values {
                self.set(len, value);
                len += 1;
            }
            self.set(Key::length(), len);
            len
        })
    }

    /// Remove and return the last element
    pub fn pop(&self) -> Value {
        if !self.is_array() {
            return Value::Undefined;
        }
        batch(|| {
            let len = self.raw_len();
            if len == 0 {
                self.set(Key::length(), 0);
                return Value::Undefined;
            }
            let last = self.raw_get(len - 1);
            self.delete(len - 1);
            self.set(Key::length(), len - 1);
            wrap_value(last)
        })
    }

    /// Remove and return the first element
    pub fn shift(&self) -> Value {
        if !self.is_array() {
            return Value::Undefined;
        }
        batch(|| {
            let len = self.raw_len();
            if len == 0 {
                self.set(Key::length(), 0);
                return Value::Undefined;
            }
            let first = self.raw_get(0);
            for k in 1..len {
                self.move_slot(k, k - 1);
            }
            self.delete(len - 1);
            self.set(Key::length(), len - 1);
            wrap_value(first)
        })
    }

    /// Prepend values, returning the new length
    pub fn unshift<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> usize {
        if !self.is_array() {
            return 0;
        }
        let items: Vec<Value> = values.into_iter().map(Into::into).collect();
        batch(|| {
            let len = self.raw_len();
            let n = items.len();
            if n > 0 {
                for k in (0..len).rev() {
                    self.move_slot(k, k + n);
                }
                for (j, item) in items.into_iter().enumerate() {
                    self.set(j, item);
                }
            }
            self.set(Key::length(), len + n);
            len + n
        })
    }

    /// Remove `delete_count` elements at `start`, insert `items` there, and
    /// return the removed elements
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = V>,
    ) -> Vec<Value> {
        if !self.is_array() {
            return Vec::new();
        }
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        batch(|| {
            let len = self.raw_len();
            let start = start.min(len);
            let delete_count = delete_count.min(len - start);
            let item_count = items.len();

            let removed: Vec<Value> = (start..start + delete_count)
                .map(|i| wrap_value(self.raw_get(i)))
                .collect();

            match item_count.cmp(&delete_count) {
                Ordering::Less => {
                    for k in start..len - delete_count {
                        self.move_slot(k + delete_count, k + item_count);
                    }
                    for k in (len - delete_count + item_count..len).rev() {
                        self.delete(k);
                    }
                }
                Ordering::Greater => {
                    for k in (start..len - delete_count).rev() {
                        self.move_slot(k + delete_count, k + item_count);
                    }
                }
                Ordering::Equal => {}
            }

            for (j, item) in items.into_iter().enumerate() {
                self.set(start + j, item);
            }
            self.set(Key::length(), len - delete_count + item_count);
            removed
        })
    }

    /// Reverse in place
    pub fn reverse(&self) {
        if !self.is_array() {
            return;
        }
        batch(|| {
            let len = self.raw_len();
            for lower in 0..len / 2 {
                let upper = len - 1 - lower;
                let lower_value = self.raw_get(lower);
                self.move_slot(upper, lower);
                if lower_value.is_undefined() {
                    self.delete(upper);
                } else {
                    self.set(upper, lower_value);
                }
            }
        });
    }

    /// Sort in place with `compare`. Holes move to the end.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) {
        if !self.is_array() {
            return;
        }
        batch(|| {
            let len = self.raw_len();
            let mut present: Vec<Value> = untrack(|| {
                (0..len)
                    .map(|i| self.raw_get(i))
                    .filter(|v| !v.is_undefined())
                    .map(wrap_value)
                    .collect()
            });
            present.sort_by(|a, b| untrack(|| compare(a, b)));

            let filled = present.len();
            for (i, value) in present.into_iter().enumerate() {
                self.set(i, value);
            }
            for i in filled..len {
                self.delete(i);
            }
        });
    }

    /// Assign `value` to every slot in `range` (clamped to the length)
    pub fn fill(&self, value: impl Into<Value>, range: impl RangeBounds<usize>) {
        if !self.is_array() {
            return;
        }
        let value = value.into();
        batch(|| {
            let len = self.raw_len();
            let start = match range.start_bound() {
                Bound::Included(&s) => s,
                Bound::Excluded(&s) => s.saturating_add(1),
                Bound::Unbounded => 0,
            };
            let end = match range.end_bound() {
                Bound::Included(&e) => e.saturating_add(1),
                Bound::Excluded(&e) => e,
                Bound::Unbounded => len,
            };
            for i in start.min(len)..end.min(len) {
                self.set(i, value.clone());
            }
        });
    }

    /// Shorten to `len` elements; longer lengths are left alone
    pub fn truncate(&self, len: usize) {
        if self.is_array() && len < self.raw_len() {
            self.set(Key::length(), len);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Store").field(&self.target).finish()
    }
}

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// Property descriptor reported by [`Store::descriptor`].
#[derive(Clone)]
pub struct Descriptor {
    get: Option<Getter>,
    set: Option<Setter>,
    this: Value,
    enumerable: bool,
    declared: bool,
}

impl Descriptor {
    /// Invoke the getter
    pub fn get(&self) -> Value {
        self.get
            .as_ref()
            .map_or(Value::Undefined, |get| get(&self.this))
    }

    /// Invoke the setter; a no-op without one
    pub fn set(&self, value: impl Into<Value>) {
        if let Some(set) = &self.set {
            set(&self.this, value.into());
        }
    }

    pub fn has_getter(&self) -> bool {
        self.get.is_some()
    }

    pub fn has_setter(&self) -> bool {
        self.set.is_some()
    }

    pub fn is_enumerable(&self) -> bool {
        self.enumerable
    }

    /// Declared accessor, as opposed to a data property seen as one
    pub fn is_accessor(&self) -> bool {
        self.declared
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .field("enumerable", &self.enumerable)
            .field("declared", &self.declared)
            .finish()
    }
}

// =============================================================================
// SET PROPERTY
// =============================================================================

/// Write `key` on a raw target and notify the cells that can have changed.
///
/// This is what every view write runs; call it directly (typically inside
/// [`modify_mutable`](crate::modify_mutable)) to edit a raw target without
/// losing notifications. Dependents run once the outermost batch closes.
/// Passing `Undefined`, or `deleting`, removes the key. An array's `length`
/// cannot be deleted and only takes whole numbers up to `u32::MAX`; other
/// writes to it are ignored.
pub fn set_property(
    target: &Target,
    key: impl Into<Key>,
    value: impl Into<Value>,
    deleting: bool,
) {
    let key = key.into();
    let value = if deleting {
        Value::Undefined
    } else {
        value.into().into_raw()
    };

    if target.is_array() && key.is_length() && (deleting || array_length(&value).is_none()) {
        tracing::debug!(message = "store.set.rejected", key = %key, value = ?value);
        return;
    }

    batch(|| {
        if let Some(accessor) = target.accessor(&key) {
            set_accessor_property(target, key, value, deleting, accessor);
            return;
        }

        let prev = target.get(&key);
        if !deleting && prev.same(&value) {
            return;
        }
        let prev_len = target.is_array().then(|| target.len());

        dev::notify_update(target, &key, &value, &prev);
        tracing::trace!(message = "store.set", key = %key, deleting);

        if value.is_undefined() {
            target.remove(&key);
            if !prev.is_undefined() {
                if let Some(cell) = existence_cell(target, &key) {
                    cell.write(target.has(&key));
                }
            }
        } else {
            target.set_data(key.clone(), value.clone());
            if prev.is_undefined() {
                if let Some(cell) = existence_cell(target, &key) {
                    cell.write(true);
                }
            }
        }

        value_cell_or_create(target, &key, prev).write(value);

        if let Some(prev_len) = prev_len {
            let len = target.len();
            for cell in index_cells_in(target, len..prev_len) {
                cell.write(Value::Undefined);
            }
            if len != prev_len {
                value_cell_or_create(target, &Key::length(), Value::from(prev_len))
                    .write(Value::from(len));
            }
        }

        dirty_structural(target);
    });
}

/// Accessor keys: the setter runs, no value cell is kept for the key
fn set_accessor_property(
    target: &Target,
    key: Key,
    value: Value,
    deleting: bool,
    accessor: Accessor,
) {
    let prev = untrack(|| accessor.invoke_get(target));
    if !deleting && prev.same(&value) {
        return;
    }

    dev::notify_update(target, &key, &value, &prev);
    tracing::trace!(message = "store.set", key = %key, deleting);

    if deleting {
        let was_own = target.has_own(&key);
        target.remove(&key);
        if was_own {
            if let Some(cell) = existence_cell(target, &key) {
                cell.write(target.has(&key));
            }
        }
    } else {
        accessor.invoke_set(target, value);
    }

    dirty_structural(target);
}
