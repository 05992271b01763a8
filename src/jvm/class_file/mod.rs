//! Low-level representation of the `class` file format
//!
//! Everything here is already resolved down to constant pool indices. The semantic layer in
//! [`crate::jvm::model`] lowers into these types when a class is finished.

mod attribute;
mod class;
mod constants;
mod member;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use member::*;
pub use version::*;
