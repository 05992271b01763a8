//! Assemble verifiable JVM class files at runtime
//!
//! Classes are described symbolically through [`jvm::model::ClassMaker`]: fields, methods, and
//! method bodies built instruction by instruction with [`jvm::code::CodeBuilder`]. Operand types
//! are checked as instructions are pushed, and the `StackMapTable` frames that the JVM verifier
//! needs are computed along the way. Finishing a class produces the bytes of a class file, which
//! can also be handed to a [`loader::ClassLoaderService`].
//!
//! This crate does not install a logger. Diagnostics go through the `log` facade.

pub mod jvm;
pub mod loader;
mod settings;
pub mod util;

pub use settings::*;
