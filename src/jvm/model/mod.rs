//! Semantic representations of classes
//!
//! This is the representation to use while building up classes. Types and members stay symbolic
//! until the class is finished, at which point everything is interned into a fresh constant pool
//! and lowered into [`crate::jvm::class_file`].
//!
//!   - __Class__ is built using [`ClassMaker`]
//!   - __Method__ is represented using [`Method`]
//!   - __Field__ is represented using [`Field`]

mod class;
mod field;
mod method;

pub use class::*;
pub use field::*;
pub use method::*;
