// ============================================================================
// spark-store - Dynamic Values
// The value model stores are built over: keys, values and callable values
// ============================================================================

use std::fmt;
use std::rc::Rc;

use crate::store::target::Target;
use crate::store::view::Store;

// =============================================================================
// KEY
// =============================================================================

/// A property key.
///
/// Canonical array-index names ("0", "17", never "01" or "-1") are always
/// held as `Index`, on objects as well as arrays, so `Key::from("3")` and
/// `Key::from(3)` address the same slot.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Index(usize),
    Name(Rc<str>),
}

/// Largest valid array length, one past the largest index
pub(crate) const MAX_ARRAY_LENGTH: u64 = u32::MAX as u64;

impl Key {
    pub fn length() -> Self {
        Key::Name(Rc::from("length"))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == "length")
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(_) => None,
        }
    }

    fn parse_index(name: &str) -> Option<usize> {
        if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
            return None;
        }
        if !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let n: u64 = name.parse().ok()?;
        (n < MAX_ARRAY_LENGTH).then_some(n as usize)
    }

    fn from_name(name: Rc<str>) -> Self {
        match Self::parse_index(&name) {
            Some(i) => Key::Index(i),
            None => Key::Name(name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => write!(f, "{name:?}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::from_name(Rc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::from_name(Rc::from(name))
    }
}

impl From<Rc<str>> for Key {
    fn from(name: Rc<str>) -> Self {
        Key::from_name(name)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        if (i as u64) < MAX_ARRAY_LENGTH {
            Key::Index(i)
        } else {
            Key::Name(Rc::from(i.to_string()))
        }
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        match usize::try_from(i) {
            Ok(i) => Key::Index(i),
            Err(_) => Key::Name(Rc::from(i.to_string())),
        }
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

// =============================================================================
// FUNCTION
// =============================================================================

type NativeFn = dyn Fn(&Value, &[Value]) -> Value;

/// A callable value. Receives `this` and the call arguments.
///
/// Functions compare by identity.
#[derive(Clone)]
pub struct Function(Rc<NativeFn>);

impl Function {
    pub fn new(f: impl Fn(&Value, &[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Value {
        (self.0)(this, args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function")
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// Anything a property can hold.
///
/// `Object` is a raw target; `Store` is the reactive view over one. Raw
/// targets only ever hold raw values, so a `Store` written into a target is
/// stored as its underlying `Object`.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Function(Function),
    Object(Target),
    Store(Store),
}

impl Value {
    /// Strict identity: primitives by value (`NaN` is never the same as
    /// itself), strings by content, everything else by pointer. A view and
    /// its raw target are different values.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Store(a), Value::Store(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Function(_) | Value::Object(_) | Value::Store(_) => true,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_store(&self) -> Option<&Store> {
        match self {
            Value::Store(s) => Some(s),
            _ => None,
        }
    }

    /// The raw target behind an `Object` or a `Store`
    pub fn as_target(&self) -> Option<Target> {
        match self {
            Value::Object(t) => Some(t.clone()),
            Value::Store(s) => Some(s.raw()),
            _ => None,
        }
    }

    /// The `typeof` name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Object(_) | Value::Store(_) => "object",
        }
    }

    /// Shallow unwrap: a view becomes its raw target
    pub(crate) fn into_raw(self) -> Value {
        match self {
            Value::Store(s) => Value::Object(s.raw()),
            other => other,
        }
    }

    /// Read `key` through whatever this value is: tracked on a view, raw on
    /// a target, `Undefined` on anything else.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        match self {
            Value::Store(s) => s.get(key),
            Value::Object(t) => t.get(key),
            _ => Value::Undefined,
        }
    }

    /// Write `key` through whatever this value is. A no-op on primitives.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        match self {
            Value::Store(s) => s.set(key, value),
            Value::Object(t) => t.set(key, value),
            _ => {}
        }
    }

    /// Call a function value; anything else yields `Undefined`
    pub fn call(&self, this: &Value, args: &[Value]) -> Value {
        match self {
            Value::Function(f) => f.call(this, args),
            _ => Value::Undefined,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Function(func) => fmt::Debug::fmt(func, f),
            Value::Object(t) => fmt::Debug::fmt(t, f),
            Value::Store(s) => fmt::Debug::fmt(s, f),
        }
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Target> for Value {
    fn from(t: Target) -> Self {
        Value::Object(t)
    }
}

impl From<&Target> for Value {
    fn from(t: &Target) -> Self {
        Value::Object(t.clone())
    }
}

impl From<Store> for Value {
    fn from(s: Store) -> Self {
        Value::Store(s)
    }
}

impl From<&Store> for Value {
    fn from(s: &Store) -> Self {
        Value::Store(s.clone())
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Object(Target::from_values(values))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Undefined, Into::into)
    }
}
