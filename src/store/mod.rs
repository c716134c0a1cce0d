// ============================================================================
// spark-store - Store Module
// Mutable reactive stores over plain object graphs
// ============================================================================

pub mod dev;
pub mod mutable;
pub mod registry;
pub mod target;
pub mod value;
pub mod view;
pub mod wrap;

pub use mutable::{StoreOptions, create_mutable, create_mutable_with, modify_mutable, unwrap};
pub use registry::track_self;
pub use target::{Accessor, Class, ClassBuilder, Getter, Property, Proto, Setter, Target};
pub use value::{Function, Key, Value};
pub use view::{Descriptor, Store, set_property};
pub use wrap::{is_wrappable, wrap};
