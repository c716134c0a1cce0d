// ============================================================================
// spark-store - Ergonomic Macros
// ============================================================================

/// Helper macro to clone variables into a move closure.
///
/// # Usage
///
/// ```rust
/// use spark_store::{cloned, create_mutable, effect, object};
///
/// let state = create_mutable(object! { "n" => 1 }).unwrap();
/// let _e = effect(cloned!(state => move || {
///     let _ = state.get("n");
/// }));
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Create an effect with automatic variable capturing.
///
/// Wraps `effect(cloned!(... => move || ...))`.
///
/// # Usage
///
/// ```rust
/// use spark_store::{create_mutable, effect, object};
///
/// let state = create_mutable(object! { "count" => 0 }).unwrap();
///
/// let _e = effect!(state => {
///     println!("count is {:?}", state.get("count"));
/// });
/// state.set("count", 1);
/// ```
#[macro_export]
macro_rules! effect {
    ($($deps:ident),+ => $body:expr) => {
        $crate::effect($crate::cloned!($($deps),+ => move || $body))
    };
    ($body:expr) => {
        $crate::effect(move || $body)
    };
}

/// Build a plain object [`Value`](crate::Value) from `key => value` pairs.
///
/// Values go through `Value::from`, so nested `object!`/`array!` literals,
/// numbers, strings, targets and views all work.
///
/// ```rust
/// use spark_store::{array, object, Value};
///
/// let value = object! { "name" => "ada", "tags" => array!["x", "y"] };
/// assert_eq!(value.get("name"), Value::from("ada"));
/// assert_eq!(value.get("tags").get(1), Value::from("y"));
/// ```
#[macro_export]
macro_rules! object {
    () => {
        $crate::Value::Object($crate::Target::object())
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        {
            let target = $crate::Target::object();
            $( target.set($key, $crate::Value::from($value)); )+
            $crate::Value::Object(target)
        }
    };
}

/// Build an array [`Value`](crate::Value). `Value::Undefined` entries are holes.
///
/// ```rust
/// use spark_store::{array, Value};
///
/// let value = array![1, "two", array![3]];
/// assert_eq!(value.get("length"), Value::from(3));
/// ```
#[macro_export]
macro_rules! array {
    () => {
        $crate::Value::Object($crate::Target::array())
    };
    ($($value:expr),+ $(,)?) => {
        {
            let values: ::std::vec::Vec<$crate::Value> =
                ::std::vec![$($crate::Value::from($value)),+];
            $crate::Value::Object($crate::Target::from_values(values))
        }
    };
}
