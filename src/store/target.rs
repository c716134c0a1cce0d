// ============================================================================
// spark-store - Raw Targets
// Plain objects, arrays and class instances the views are layered over
// ============================================================================
//
// Nothing in this module tracks or notifies. A target is the plain data; the
// only reactive state it carries is the registries, created lazily by the
// view layer, and the mark left by `wrap`.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::reactivity::batching::batch;
use crate::store::registry::{self, ExistenceRegistry, ValueRegistry};
use crate::store::value::{Function, Key, MAX_ARRAY_LENGTH, Value};
use crate::store::view::Store;

/// Getter body. Receives `this`: the view once the owning target is
/// wrapped, otherwise the raw target.
pub type Getter = Rc<dyn Fn(&Value) -> Value>;

/// Setter body. Receives `this` and the assigned value.
pub type Setter = Rc<dyn Fn(&Value, Value)>;

// =============================================================================
// ACCESSOR
// =============================================================================

/// A getter/setter pair.
#[derive(Clone)]
pub struct Accessor {
    get: Option<Getter>,
    set: Option<Setter>,
    enumerable: bool,
}

impl Accessor {
    pub fn getter(f: impl Fn(&Value) -> Value + 'static) -> Self {
        Self {
            get: Some(Rc::new(f)),
            set: None,
            enumerable: true,
        }
    }

    pub fn setter(f: impl Fn(&Value, Value) + 'static) -> Self {
        Self {
            get: None,
            set: Some(Rc::new(f)),
            enumerable: true,
        }
    }

    pub fn with_setter(mut self, f: impl Fn(&Value, Value) + 'static) -> Self {
        self.set = Some(Rc::new(f));
        self
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

    pub(crate) fn get_fn(&self) -> Option<Getter> {
        self.get.clone()
    }

    pub(crate) fn set_fn(&self) -> Option<Setter> {
        self.set.clone()
    }

    /// Same getter and setter, not enumerable
    pub(crate) fn hidden(&self) -> Self {
        Self {
            enumerable: false,
            ..self.clone()
        }
    }

    pub(crate) fn invoke_get(&self, owner: &Target) -> Value {
        match &self.get {
            Some(get) => get(&owner.receiver()),
            None => Value::Undefined,
        }
    }

    /// Getter-only accessors ignore writes. On a wrapped owner the setter
    /// runs as one batched update.
    pub(crate) fn invoke_set(&self, owner: &Target, value: Value) {
        let Some(set) = &self.set else {
            return;
        };
        let this = owner.receiver();
        if owner.is_wrapped() {
            batch(|| set(&this, value));
        } else {
            set(&this, value);
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

/// An own or inherited property.
#[derive(Clone, Debug)]
pub enum Property {
    Data(Value),
    Accessor(Accessor),
}

// =============================================================================
// CLASS
// =============================================================================

/// A prototype with methods and accessors, optionally extending another.
#[derive(Clone)]
pub struct Class(Rc<ClassInner>);

struct ClassInner {
    name: Rc<str>,
    parent: Option<Class>,
    members: AHashMap<Key, Property>,
    order: Vec<Key>,
}

impl Class {
    pub fn builder(name: &str) -> ClassBuilder {
        ClassBuilder {
            name: Rc::from(name),
            parent: None,
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&Class> {
        self.0.parent.as_ref()
    }

    pub fn ptr_eq(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Nearest member named `key` along the chain
    pub fn lookup(&self, key: &Key) -> Option<Property> {
        let mut class = Some(self);
        while let Some(c) = class {
            if let Some(member) = c.0.members.get(key) {
                return Some(member.clone());
            }
            class = c.parent();
        }
        None
    }

    /// Every accessor on the chain, nearest definition first
    pub(crate) fn accessors(&self) -> Vec<(Key, Accessor)> {
        let mut found: Vec<(Key, Accessor)> = Vec::new();
        let mut class = Some(self);
        while let Some(c) = class {
            for key in &c.0.order {
                if found.iter().any(|(k, _)| k == key) {
                    continue;
                }
                if let Some(Property::Accessor(accessor)) = c.0.members.get(key) {
                    found.push((key.clone(), accessor.clone()));
                }
            }
            class = c.parent();
        }
        found
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.0.name)
    }
}

pub struct ClassBuilder {
    name: Rc<str>,
    parent: Option<Class>,
    members: Vec<(Key, Property)>,
}

impl ClassBuilder {
    pub fn extends(mut self, parent: &Class) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn method(
        mut self,
        name: &str,
        f: impl Fn(&Value, &[Value]) -> Value + 'static,
    ) -> Self {
        let method = Property::Data(Value::Function(Function::new(f)));
        self.members.push((Key::from(name), method));
        self
    }

    pub fn accessor(mut self, name: &str, accessor: Accessor) -> Self {
        let accessor = Accessor {
            enumerable: false,
            ..accessor
        };
        self.members
            .push((Key::from(name), Property::Accessor(accessor)));
        self
    }

    pub fn build(self) -> Class {
        let mut members = AHashMap::with_capacity(self.members.len());
        let mut order = Vec::with_capacity(self.members.len());
        for (key, member) in self.members {
            if members.insert(key.clone(), member).is_none() {
                order.push(key);
            }
        }
        Class(Rc::new(ClassInner {
            name: self.name,
            parent: self.parent,
            members,
            order,
        }))
    }
}

/// What a target inherits from.
#[derive(Clone, Debug)]
pub enum Proto {
    Object,
    Null,
    Array,
    Class(Class),
}

// =============================================================================
// PROPERTY MAP
// =============================================================================

/// Own properties in own-key order: integer keys ascending, then names in
/// insertion order.
#[derive(Default)]
struct PropertyMap {
    map: AHashMap<Key, Property>,
    names: Vec<Rc<str>>,
}

impl PropertyMap {
    fn get(&self, key: &Key) -> Option<&Property> {
        self.map.get(key)
    }

    fn insert(&mut self, key: Key, property: Property) {
        if let Key::Name(name) = &key {
            if !self.map.contains_key(&key) {
                self.names.push(name.clone());
            }
        }
        self.map.insert(key, property);
    }

    fn remove(&mut self, key: &Key) -> Option<Property> {
        let removed = self.map.remove(key)?;
        if let Key::Name(name) = key {
            self.names.retain(|n| n != name);
        }
        Some(removed)
    }

    fn keys(&self) -> Vec<Key> {
        let mut indices: Vec<usize> = self.map.keys().filter_map(Key::as_index).collect();
        indices.sort_unstable();
        indices
            .into_iter()
            .map(Key::Index)
            .chain(self.names.iter().cloned().map(Key::Name))
            .collect()
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

// =============================================================================
// TARGET
// =============================================================================

/// Shared handle to a raw object, array or class instance.
///
/// Cloning the handle does not copy the data. Reads and writes here are
/// untracked and never notify; go through a [`Store`](crate::Store) or
/// [`set_property`](crate::set_property) for that.
#[derive(Clone)]
pub struct Target(Rc<TargetInner>);

pub(crate) struct TargetInner {
    proto: Proto,
    props: RefCell<PropertyMap>,
    elements: RefCell<Elements>,
    pub(crate) values: RefCell<Option<ValueRegistry>>,
    pub(crate) exists: RefCell<Option<ExistenceRegistry>>,
    /// Set once by `wrap`; from then on accessors see the view as `this`
    wrapped: Cell<bool>,
}

/// Array storage: present elements by index, holes are simply absent
#[derive(Default)]
struct Elements {
    slots: BTreeMap<usize, Value>,
    len: usize,
}

/// A value accepted as an array length: a whole number in `0..=u32::MAX`
pub(crate) fn array_length(value: &Value) -> Option<usize> {
    let n = value.as_number()?;
    let valid = n.fract() == 0.0 && (0.0..=MAX_ARRAY_LENGTH as f64).contains(&n);
    valid.then_some(n as usize)
}

fn is_array_index(i: usize) -> bool {
    (i as u64) < MAX_ARRAY_LENGTH
}

/// Non-owning handle to a target
#[derive(Clone)]
pub(crate) struct WeakTarget(Weak<TargetInner>);

impl WeakTarget {
    pub(crate) fn upgrade(&self) -> Option<Target> {
        self.0.upgrade().map(Target)
    }
}

impl Target {
    fn with_proto(proto: Proto) -> Self {
        Target(Rc::new(TargetInner {
            proto,
            props: RefCell::new(PropertyMap::default()),
            elements: RefCell::new(Elements::default()),
            values: RefCell::new(None),
            exists: RefCell::new(None),
            wrapped: Cell::new(false),
        }))
    }

    /// Empty plain object
    pub fn object() -> Self {
        Self::with_proto(Proto::Object)
    }

    /// Empty object with no prototype
    pub fn null_object() -> Self {
        Self::with_proto(Proto::Null)
    }

    /// Empty array
    pub fn array() -> Self {
        Self::with_proto(Proto::Array)
    }

    /// Empty instance of `class`
    pub fn instance(class: &Class) -> Self {
        Self::with_proto(Proto::Class(class.clone()))
    }

    /// Plain object from key/value pairs
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        let target = Self::object();
        for (key, value) in entries {
            target.set_data(key.into(), value.into().into_raw());
        }
        target
    }

    /// Array from values
    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let target = Self::array();
        {
            let mut elements = target.0.elements.borrow_mut();
            for (i, value) in values.into_iter().enumerate() {
                let value = value.into().into_raw();
                if !value.is_undefined() {
                    elements.slots.insert(i, value);
                }
                elements.len = i + 1;
            }
        }
        target
    }

    pub(crate) fn inner(&self) -> &TargetInner {
        &self.0
    }

    pub(crate) fn downgrade(&self) -> WeakTarget {
        WeakTarget(Rc::downgrade(&self.0))
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether a view has ever been made over this target
    pub(crate) fn is_wrapped(&self) -> bool {
        self.0.wrapped.get()
    }

    /// Mark the target wrapped, returning true the first time
    pub(crate) fn mark_wrapped(&self) -> bool {
        !self.0.wrapped.replace(true)
    }

    /// `this` for accessor calls: the view once wrapped, else the target
    pub(crate) fn receiver(&self) -> Value {
        if self.is_wrapped() {
            Value::Store(Store::new(self.clone()))
        } else {
            Value::Object(self.clone())
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.proto, Proto::Array)
    }

    pub fn proto(&self) -> &Proto {
        &self.0.proto
    }

    pub(crate) fn class(&self) -> Option<&Class> {
        match &self.0.proto {
            Proto::Class(class) => Some(class),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self.0.proto {
            Proto::Object => "object",
            Proto::Null => "null-prototype object",
            Proto::Array => "array",
            Proto::Class(_) => "instance",
        }
    }

    // =========================================================================
    // OWN PROPERTIES
    // =========================================================================

    /// Own property named `key`. Array elements and `length` are reported
    /// as data properties.
    pub fn property(&self, key: impl Into<Key>) -> Option<Property> {
        let key = key.into();
        if let Some(property) = self.0.props.borrow().get(&key) {
            return Some(property.clone());
        }
        if self.is_array() {
            if key.is_length() {
                return Some(Property::Data(Value::from(self.len())));
            }
            if let Key::Index(i) = key {
                let elements = self.0.elements.borrow();
                return elements.slots.get(&i).map(|v| Property::Data(v.clone()));
            }
        }
        None
    }

    pub fn has_own(&self, key: impl Into<Key>) -> bool {
        self.property(key).is_some()
    }

    /// Own or inherited
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.has_own(&key) || self.class().is_some_and(|c| c.lookup(&key).is_some())
    }

    /// Own keys in own-key order; arrays list present indices, then
    /// `length`, then named properties.
    pub fn own_keys(&self) -> Vec<Key> {
        let props = self.0.props.borrow().keys();
        if !self.is_array() {
            return props;
        }

        let elements = self.0.elements.borrow();
        let mut keys: Vec<Key> = elements.slots.keys().copied().map(Key::Index).collect();
        keys.push(Key::length());
        keys.extend(props.into_iter().filter(|k| !k.is_length()));
        keys
    }

    /// Array length, or the number of own properties of an object
    pub fn len(&self) -> usize {
        if self.is_array() {
            self.0.elements.borrow().len
        } else {
            self.0.props.borrow().len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dense copy of an array's elements, holes as `Undefined`
    pub fn elements(&self) -> Vec<Value> {
        let elements = self.0.elements.borrow();
        (0..elements.len)
            .map(|i| elements.slots.get(&i).cloned().unwrap_or_default())
            .collect()
    }

    /// Define or replace an own accessor. On a wrapped target it sees the
    /// view as `this` like every other accessor.
    pub fn define_accessor(&self, key: impl Into<Key>, accessor: Accessor) {
        let key = key.into();
        if let (true, Key::Index(i)) = (self.is_array(), &key) {
            self.0.elements.borrow_mut().slots.remove(i);
        }
        self.0
            .props
            .borrow_mut()
            .insert(key, Property::Accessor(accessor));
    }

    /// Accessor reached by `key`, own first, then along the class chain
    /// unless an own data property shadows it
    pub(crate) fn accessor(&self, key: &Key) -> Option<Accessor> {
        match self.property(key) {
            Some(Property::Accessor(accessor)) => Some(accessor),
            Some(Property::Data(_)) => None,
            None => match self.class()?.lookup(key)? {
                Property::Accessor(accessor) => Some(accessor),
                Property::Data(_) => None,
            },
        }
    }

    /// A function reached only through the prototype
    pub(crate) fn is_inherited_function(&self, key: &Key) -> bool {
        if self.has_own(key) {
            return false;
        }
        matches!(
            self.class().and_then(|c| c.lookup(key)),
            Some(Property::Data(Value::Function(_)))
        )
    }

    // =========================================================================
    // READ / WRITE
    // =========================================================================

    /// Read `key`, own or inherited. Accessors are invoked.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        match self.property(&key) {
            Some(Property::Data(value)) => value,
            Some(Property::Accessor(accessor)) => accessor.invoke_get(self),
            None => match self.class().and_then(|c| c.lookup(&key)) {
                Some(Property::Data(value)) => value,
                Some(Property::Accessor(accessor)) => accessor.invoke_get(self),
                None => Value::Undefined,
            },
        }
    }

    /// Assign `key`. Accessors run their setter; `Undefined` removes the key;
    /// a view is stored as its raw target.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into().into_raw();
        match self.accessor(&key) {
            Some(accessor) => accessor.invoke_set(self, value),
            None => self.set_data(key, value),
        }
    }

    /// Assign a data slot, bypassing accessors. An array ignores a
    /// `length` that is not a valid array length.
    pub(crate) fn set_data(&self, key: Key, value: Value) {
        if value.is_undefined() {
            self.remove(&key);
            return;
        }

        if self.is_array() {
            if key.is_length() {
                if let Some(len) = array_length(&value) {
                    self.set_len(len);
                }
                return;
            }
            if let Key::Index(i) = key {
                if is_array_index(i) {
                    let mut elements = self.0.elements.borrow_mut();
                    elements.slots.insert(i, value);
                    elements.len = elements.len.max(i + 1);
                    return;
                }
            }
        }

        self.0.props.borrow_mut().insert(key, Property::Data(value));
    }

    /// Remove an own property, returning its previous data value. Array
    /// elements leave a hole; `length` cannot be removed.
    pub fn remove(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        if let Some(property) = self.0.props.borrow_mut().remove(&key) {
            return match property {
                Property::Data(value) => value,
                Property::Accessor(_) => Value::Undefined,
            };
        }

        if let (true, Key::Index(i)) = (self.is_array(), &key) {
            if let Some(value) = self.0.elements.borrow_mut().slots.remove(i) {
                return value;
            }
        }
        Value::Undefined
    }

    /// Truncate or extend (with holes) an array
    pub(crate) fn set_len(&self, len: usize) {
        let mut elements = self.0.elements.borrow_mut();
        let _ = elements.slots.split_off(&len);
        elements.len = len;
    }

    /// Number of reactive cells allocated on this target
    pub fn cell_count(&self) -> usize {
        registry::cell_count(self)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("kind", &self.kind_name())
            .field("keys", &self.own_keys())
            .finish()
    }
}
