//! Domain models for the catalog.
//!
//! # Core Concepts
//!
//! - [`Category`]: a node of the category tree. Declares [`AttributeDescriptor`]s
//!   that every product in it, or in any descendant category, exposes.
//! - [`AttributeType`]: a named, reusable value type (unit, storage conversion,
//!   constraints), shared by descriptors across categories.
//! - [`AttributeDescriptor`]: binds an attribute type to a key within one
//!   category, with an optional default and a required flag.
//! - [`Product`]: an instance placed in exactly one category.
//! - [`Value`]: a domain value, converted to a stored primitive by its
//!   attribute type's [`ValueKind`].

mod attribute;
mod category;
mod value;

pub use attribute::*;
pub use category::*;
pub use value::*;
