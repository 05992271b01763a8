//! Manipulate JVM classes
//!
//! ### Simple example
//!
//! Consider the following simple Java class:
//!
//! ```java,ignore,no_run
//! public class Point {
//!     public final int x;
//!     public final int y;
//!
//!     public Point(int x, int y) {
//!         this.x = x;
//!         this.y = y;
//!     }
//! }
//! ```
//!
//! Generating an analogous class file can be done as follows:
//!
//! ```
//! use classmaker::jvm::code::{BranchInstruction::*, Instruction::*};
//! use classmaker::jvm::model::ClassMaker;
//! use classmaker::jvm::*;
//! use classmaker::Settings;
//!
//! # fn generate_class() -> Result<Vec<u8>, Error> {
//! // Types are interned in a context, which plays the part of a class loader
//! let context = TypeContext::new();
//! let mut class = ClassMaker::begin(&context, "me.alec.Point", None, Settings::default())?;
//!
//! // Declare the fields
//! let final_field = FieldAccessFlags::PUBLIC | FieldAccessFlags::FINAL;
//! class.add_field(final_field, context.int(), "x")?;
//! class.add_field(final_field, context.int(), "y")?;
//! let field_x = class.field("x")?;
//! let field_y = class.field("y")?;
//!
//! // Generate the constructor method body
//! let constructor =
//!     class.add_constructor(MethodAccessFlags::PUBLIC, vec![context.int(), context.int()])?;
//! let code = class.code(constructor)?;
//! code.push_instruction(ALoad(0))?;
//! code.invoke(MethodRef::default_init(context.object()))?;
//! code.push_instruction(ALoad(0))?;
//! code.push_instruction(ILoad(1))?;
//! code.push_instruction(PutField(field_x))?;
//! code.push_instruction(ALoad(0))?;
//! code.push_instruction(ILoad(2))?;
//! code.push_instruction(PutField(field_y))?;
//! code.push_branch_instruction(Return)?;
//!
//! // Finally, encode the class into bytes
//! let class_bytes: Vec<u8> = class.finish()?;
//! # Ok(class_bytes)
//! # }
//! # assert_eq!(&generate_class().unwrap()[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
//! ```

mod access_flags;
mod binary_format;
pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
pub mod model;
mod names;
mod types;
pub mod verifier;

pub use access_flags::*;
pub use binary_format::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
pub use types::*;
