use crate::jvm::class_file::{ClassConstantIndex, ConstantsPool, ConstantsWriter};
use crate::jvm::code::Label;
use crate::jvm::{BaseType, Error, Serialize, Type};
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::fmt::{Display, Formatter};

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls, U> {
    /// Unusable slot (an unset local, or the second half of a `long` or `double`)
    Top,

    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),

    /// State of an object after `new` has been called but `<init>` has not been called
    ///
    ///   - while building code, `U` is an [`UninitializedSite`] which remembers the type being
    ///     constructed and where the `new` instruction is
    ///   - when serializing into a classfile, `U` is a `u16`: the offset of the `new`
    ///     instruction from the start of the method body
    Uninitialized(U),
}

/// Verification type used while building code
pub type VerifierType<'c> = VerificationType<Type<'c>, UninitializedSite<'c>>;

/// Verification type as it appears in a `StackMapTable`
pub type SerializableType = VerificationType<ClassConstantIndex, u16>;

/// Location of a `new` instruction, along with the type it is constructing
///
/// The absolute offset of the instruction isn't known until constants are interned and branches
/// are laid out, so this records the block and the position of the instruction in that block.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Copy)]
pub struct UninitializedSite<'c> {
    /// Once the type is initialized, what will it be?
    pub class: Type<'c>,

    /// Label of the basic block containing the `new` instruction
    pub block: Label,

    /// Index of the `new` instruction in that block
    pub index: usize,
}

impl<Cls, U> VerificationType<Cls, U> {
    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis
            | VerificationType::Object(_)
            | VerificationType::Uninitialized(_) => true,
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, VerificationType::Top)
    }

    pub fn map<C2, U2>(
        &self,
        map_class: impl Fn(&Cls) -> C2,
        map_uninitialized: impl Fn(&U) -> U2,
    ) -> VerificationType<C2, U2> {
        match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)),
            VerificationType::Uninitialized(uninit) => {
                VerificationType::Uninitialized(map_uninitialized(uninit))
            }
        }
    }
}

impl<'c> From<Type<'c>> for VerifierType<'c> {
    /// `void` has no verification type and maps to `Top`
    fn from(typ: Type<'c>) -> Self {
        match typ.base_type() {
            Some(BaseType::Float) => VerificationType::Float,
            Some(BaseType::Long) => VerificationType::Long,
            Some(BaseType::Double) => VerificationType::Double,
            Some(_) => VerificationType::Integer,
            None if typ.is_null() => VerificationType::Null,
            None if typ.is_void() => VerificationType::Top,
            None => VerificationType::Object(typ),
        }
    }
}

impl<'c> VerifierType<'c> {
    /// Check if one verification type is assignable to another
    ///
    /// Interfaces are treated like `java.lang.Object`, the same way the JVM verifier does.
    pub fn is_assignable(sub_type: &Self, super_type: &Self) -> bool {
        match (sub_type, super_type) {
            (_, Self::Top) => true,
            (Self::Null, Self::Object(_)) => true,
            (Self::Object(t1), Self::Object(t2)) => {
                t2.is_interface() || t2.is_assignable_from(*t1)
            }
            (t1, t2) => t1 == t2,
        }
    }

    /// Most specific type both types are assignable to
    ///
    /// Returns `None` when the types have nothing in common (eg. `int` and `float`, or a
    /// primitive and a reference).
    pub fn merge(first: &Self, second: &Self) -> Option<Self> {
        match (first, second) {
            (t1, t2) if t1 == t2 => Some(*t1),
            (Self::Null, Self::Object(t)) | (Self::Object(t), Self::Null) => {
                Some(Self::Object(*t))
            }
            (Self::Object(t1), Self::Object(t2)) => t1.common_supertype(*t2).map(Self::Object),
            _ => None,
        }
    }

    /// Resolve the type into its serializable form
    pub fn into_serializable(
        &self,
        constants: &mut ConstantsPool,
        uninitialized_offset: impl Fn(&UninitializedSite<'c>) -> Result<u16, Error>,
    ) -> Result<SerializableType, Error> {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(class) => {
                VerificationType::Object(class.constant_index(constants)?)
            }
            VerificationType::Uninitialized(site) => {
                VerificationType::Uninitialized(uninitialized_offset(site)?)
            }
        })
    }
}

impl Serialize for SerializableType {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationType::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl<Cls, A> Width for VerificationType<Cls, A> {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

impl<Cls: Display, U: Display> Display for VerificationType<Cls, U> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationType::Top => f.write_str("top"),
            VerificationType::Integer => f.write_str("int"),
            VerificationType::Float => f.write_str("float"),
            VerificationType::Double => f.write_str("double"),
            VerificationType::Long => f.write_str("long"),
            VerificationType::Null => f.write_str("null"),
            VerificationType::UninitializedThis => f.write_str("uninitialized this"),
            VerificationType::Object(cls) => Display::fmt(cls, f),
            VerificationType::Uninitialized(site) => Display::fmt(site, f),
        }
    }
}

impl<'c> Display for UninitializedSite<'c> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "uninitialized {}", self.class)
    }
}
