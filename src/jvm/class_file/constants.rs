use crate::jvm::class_file::{Attribute, AttributeLike, BootstrapMethod};
use crate::jvm::types::{
    self, FieldRef, InvokeDynamic, LoadableConstant, MemberRef, MethodHandle, MethodRef,
    MethodType, Type,
};
use crate::jvm::{Error, Name, Serialize};
use crate::util::{Offset, OffsetResult, OffsetVec, Width};
use byteorder::WriteBytesExt;
use std::collections::HashMap;
use std::result::Result;

/// Class file constants pool builder
///
/// Constants are deduplicated structurally: interning a constant that is already in the pool
/// returns the existing index. Indices start at 1 and `long`/`double` constants take two slots.
/// The pool is append-only, with one exception: [`Self::rename_utf8`] and [`Self::rename_class`]
/// patch entries in place so that indices handed out earlier stay valid.
///
/// Bootstrap methods are not constants, but they are interned in the same way (into a side table
/// that becomes the `BootstrapMethods` attribute) since `CONSTANT_Dynamic` and
/// `CONSTANT_InvokeDynamic` refer to them by index.
#[derive(Debug)]
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,
    index: HashMap<Constant, ConstantIndex>,
    bootstrap_methods: Vec<BootstrapMethod>,
    bootstrap_index: HashMap<BootstrapMethod, BootstrapMethodIndex>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            index: HashMap::new(),
            bootstrap_methods: vec![],
            bootstrap_index: HashMap::new(),
        }
    }

    /// Number of constants (not the sum of their widths)
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Value of the `constant_pool_count` field (one more than the largest index)
    pub fn count(&self) -> usize {
        self.constants.offset_len().0
    }

    pub fn get(&self, index: ConstantIndex) -> Option<&Constant> {
        self.constants.get_offset(Offset(index.0 as usize)).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstantIndex, &Constant)> {
        self.constants
            .iter()
            .map(|(offset, _, constant)| (ConstantIndex(offset.0 as u16), constant))
    }

    /// Get or insert a constant
    ///
    /// Parts of composite constants must already be in the pool (the typed helpers below take
    /// care of that).
    pub fn intern(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.index.get(&constant) {
            return Ok(*idx);
        }
        if let Constant::Utf8(string) = &constant {
            let encoded_len = encode_modified_utf8(string).len();
            if encoded_len > u16::MAX as usize {
                return Err(Error::Utf8TooLong(encoded_len));
            }
        }

        // The largest valid index is 65534 and some constants take two spaces
        let offset = self.constants.offset_len().0;
        if offset + constant.width() > u16::MAX as usize {
            return Err(Error::ConstantPoolOverflow { constant, offset });
        }

        let idx = ConstantIndex(offset as u16);
        self.index.insert(constant.clone(), idx);
        self.constants.push(constant);
        Ok(idx)
    }

    pub fn utf8(&mut self, string: impl Into<String>) -> Result<Utf8ConstantIndex, Error> {
        self.intern(Constant::Utf8(string.into()))
            .map(Utf8ConstantIndex)
    }

    /// Get or insert a `CONSTANT_Class` (`name` is an internal name or an array descriptor)
    pub fn class(&mut self, name: impl Into<String>) -> Result<ClassConstantIndex, Error> {
        let name = self.utf8(name)?;
        self.intern(Constant::Class(name)).map(ClassConstantIndex)
    }

    pub fn string(&mut self, string: impl Into<String>) -> Result<StringConstantIndex, Error> {
        let utf8 = self.utf8(string)?;
        self.intern(Constant::String(utf8))
            .map(StringConstantIndex)
    }

    pub fn integer(&mut self, integer: i32) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Integer(integer))
    }

    /// Floats are keyed by bit pattern, so `NaN` is equal to itself and `0.0` differs from `-0.0`
    pub fn float(&mut self, float: f32) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Float(float.to_bits()))
    }

    pub fn long(&mut self, long: i64) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Long(long))
    }

    /// Doubles are keyed by bit pattern, like floats
    pub fn double(&mut self, double: f64) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Double(double.to_bits()))
    }

    pub fn name_and_type(
        &mut self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.intern(Constant::NameAndType { name, descriptor })
            .map(NameAndTypeConstantIndex)
    }

    pub fn field_ref(
        &mut self,
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<FieldRefConstantIndex, Error> {
        self.intern(Constant::FieldRef(class, name_and_type))
            .map(FieldRefConstantIndex)
    }

    pub fn method_ref(
        &mut self,
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, Error> {
        let constant = Constant::MethodRef {
            class,
            name_and_type,
            is_interface,
        };
        self.intern(constant).map(MethodRefConstantIndex)
    }

    pub fn method_handle(
        &mut self,
        handle_kind: HandleKind,
        member: ConstantIndex,
    ) -> Result<MethodHandleConstantIndex, Error> {
        let constant = Constant::MethodHandle {
            handle_kind,
            member,
        };
        self.intern(constant).map(MethodHandleConstantIndex)
    }

    pub fn method_type(
        &mut self,
        descriptor: impl Into<String>,
    ) -> Result<MethodTypeConstantIndex, Error> {
        let descriptor = self.utf8(descriptor)?;
        self.intern(Constant::MethodType { descriptor })
            .map(MethodTypeConstantIndex)
    }

    /// Get or insert an entry in the bootstrap methods table
    pub fn bootstrap_method(
        &mut self,
        bootstrap_method: MethodHandleConstantIndex,
        bootstrap_arguments: Vec<ConstantIndex>,
    ) -> Result<BootstrapMethodIndex, Error> {
        let entry = BootstrapMethod {
            bootstrap_method,
            bootstrap_arguments,
        };
        if let Some(idx) = self.bootstrap_index.get(&entry) {
            return Ok(*idx);
        }
        let count = self.bootstrap_methods.len();
        let idx = BootstrapMethodIndex(Error::check_count("Bootstrap method", count + 1)? - 1);
        self.bootstrap_index.insert(entry.clone(), idx);
        self.bootstrap_methods.push(entry);
        Ok(idx)
    }

    pub fn dynamic(
        &mut self,
        bootstrap_method: BootstrapMethodIndex,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Dynamic {
            bootstrap_method,
            name_and_type,
        })
    }

    pub fn invoke_dynamic(
        &mut self,
        bootstrap_method: BootstrapMethodIndex,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<InvokeDynamicConstantIndex, Error> {
        let constant = Constant::InvokeDynamic {
            bootstrap_method,
            name_and_type,
        };
        self.intern(constant).map(InvokeDynamicConstantIndex)
    }

    /// Replace the contents of a `CONSTANT_Utf8` entry in place
    ///
    /// Every constant referring to the entry now sees the new string. If the new string was
    /// already in the pool, the older entry stays the one returned by later lookups.
    pub fn rename_utf8(
        &mut self,
        utf8: Utf8ConstantIndex,
        new_value: impl Into<String>,
    ) -> Result<(), Error> {
        let offset = Offset(utf8.0 .0 as usize);
        let old_value = match self.constants.get_offset(offset).ok() {
            Some(Constant::Utf8(old_value)) => old_value.clone(),
            _ => {
                return Err(Error::InvalidName(format!(
                    "constant #{} is not a Utf8 entry",
                    offset.0
                )))
            }
        };
        let new_value = new_value.into();
        let encoded_len = encode_modified_utf8(&new_value).len();
        if encoded_len > u16::MAX as usize {
            return Err(Error::Utf8TooLong(encoded_len));
        }

        match self
            .constants
            .replace_at_offset(offset, Constant::Utf8(new_value.clone()))
        {
            OffsetResult::Ok(_, _) => (),
            _ => {
                return Err(Error::InvalidName(format!(
                    "constant #{} could not be replaced",
                    offset.0
                )))
            }
        }
        self.index.remove(&Constant::Utf8(old_value));
        self.index
            .entry(Constant::Utf8(new_value))
            .or_insert(utf8.0);
        Ok(())
    }

    /// Point a `CONSTANT_Class` entry at a new name, keeping its index
    ///
    /// The name is patched in place only if no other constant uses the old `CONSTANT_Utf8` entry
    /// and the new name isn't in the pool yet. Otherwise the class entry is pointed at the entry
    /// for the new name, so that a string constant spelled like the old name keeps its value.
    pub fn rename_class(
        &mut self,
        class: ClassConstantIndex,
        new_name: impl Into<String>,
    ) -> Result<(), Error> {
        let offset = Offset(class.0 .0 as usize);
        let old_name = match self.constants.get_offset(offset).ok() {
            Some(Constant::Class(name)) => *name,
            _ => {
                return Err(Error::InvalidName(format!(
                    "constant #{} is not a Class entry",
                    offset.0
                )))
            }
        };
        let new_name = new_name.into();

        let shared = self.iter().any(|(index, constant)| {
            index != class.0
                && match constant {
                    Constant::Class(name)
                    | Constant::String(name)
                    | Constant::MethodType { descriptor: name } => *name == old_name,
                    Constant::NameAndType { name, descriptor } => {
                        *name == old_name || *descriptor == old_name
                    }
                    _ => false,
                }
        });
        if !shared && self.find_utf8(&new_name).is_none() {
            return self.rename_utf8(old_name, new_name);
        }

        let new_utf8 = self.utf8(new_name)?;
        match self
            .constants
            .replace_at_offset(offset, Constant::Class(new_utf8))
        {
            OffsetResult::Ok(_, _) => (),
            _ => {
                return Err(Error::InvalidName(format!(
                    "constant #{} could not be replaced",
                    offset.0
                )))
            }
        }
        self.index.remove(&Constant::Class(old_name));
        self.index
            .entry(Constant::Class(new_utf8))
            .or_insert(class.0);
        Ok(())
    }

    /// Find the index of a `CONSTANT_Utf8` entry, if it is in the pool
    pub fn find_utf8(&self, string: &str) -> Option<Utf8ConstantIndex> {
        self.index
            .get(&Constant::Utf8(string.to_owned()))
            .copied()
            .map(Utf8ConstantIndex)
    }

    /// Bootstrap methods interned so far, in index order
    pub fn bootstrap_methods(&self) -> &[BootstrapMethod] {
        &self.bootstrap_methods
    }

    /// Add an attribute to the constant pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.utf8(A::NAME)?;
        let mut info = vec![];

        attribute.serialize(&mut info)?;

        Ok(Attribute { name_index, info })
    }
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

/// The count is the offset one past the last constant
impl Serialize for ConstantsPool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.constants.offset_len().0 as u16).serialize(writer)?;
        for constant in self.constants.values() {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`, as its bit pattern
    Float(u32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`, as its bit pattern
    Double(u64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// Depending on the method kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        bootstrap_method: BootstrapMethodIndex,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        bootstrap_method: BootstrapMethodIndex,
        name_and_type: NameAndTypeConstantIndex,
    },
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(bits) => {
                4u8.serialize(writer)?;
                bits.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(bits) => {
                6u8.serialize(writer)?;
                bits.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(utf8) => {
                8u8.serialize(writer)?;
                utf8.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                17u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = Vec::with_capacity(string.len());
    for c in string.chars() {
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters become a surrogate pair, each encoded in 3 bytes
            _ => {
                buffer.push(0b1110_1101);
                buffer.push(((code >> 16 & 0x0F) as u8).wrapping_sub(1) & 0x0F | 0b1010_0000);
                buffer.push((code >> 10 & 0x3F) as u8 | 0b1000_0000);

                buffer.push(0b1110_1101);
                buffer.push(((code >> 6 & 0x0F) as u8) | 0b1011_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// `long` and `double` constants take two slots. Quoting the JVM specification:
///
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug, PartialOrd, Ord)]
pub struct ConstantIndex(pub u16);

impl ConstantIndex {
    /// Placeholder for absent optional references (eg. the name of an anonymous inner class)
    pub const ZERO: ConstantIndex = ConstantIndex(0);
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct StringConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct MethodTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct MethodHandleConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct FieldRefConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct MethodRefConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct InvokeDynamicConstantIndex(pub ConstantIndex);

/// Index into the `BootstrapMethods` attribute (not into the constant pool)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct BootstrapMethodIndex(pub u16);

macro_rules! typed_constant_index {
    ($($typ:ident),* $(,)?) => {
        $(
            impl From<$typ> for ConstantIndex {
                fn from(index: $typ) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $typ {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }
        )*
    };
}

typed_constant_index! {
    Utf8ConstantIndex,
    StringConstantIndex,
    NameAndTypeConstantIndex,
    MethodTypeConstantIndex,
    MethodHandleConstantIndex,
    ClassConstantIndex,
    FieldRefConstantIndex,
    MethodRefConstantIndex,
    InvokeDynamicConstantIndex,
}

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Serialize for BootstrapMethodIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let byte: u8 = match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        };
        byte.serialize(writer)
    }
}

/// Things that can be interned into a constant pool
///
/// Composite constants intern their parts first, so the order of the pool reflects first use.
pub trait ConstantsWriter<'c, Index = ConstantIndex> {
    /// Get or insert a constant into the constant pool and return the associated index
    fn constant_index(&self, constants_pool: &mut ConstantsPool) -> Result<Index, Error>;
}

/// When making a `CONSTANT_Class_info`, reference types are almost always objects. However,
/// there are a handful of places where an array type needs to be fit in (eg. for a `checkcast`
/// to an array type). See [this section of the spec][0] for more.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4.1
impl<'c> ConstantsWriter<'c, ClassConstantIndex> for Type<'c> {
    fn constant_index(&self, constants: &mut ConstantsPool) -> Result<ClassConstantIndex, Error> {
        match self.constant_class_name() {
            Some(name) => constants.class(name),
            None => Err(Error::NotAClass(self.name())),
        }
    }
}

/// Write a `CONSTANT_Fieldref_info`
impl<'c> ConstantsWriter<'c, FieldRefConstantIndex> for FieldRef<'c> {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<FieldRefConstantIndex, Error> {
        let class_idx = self.class.constant_index(constants)?;
        let name_and_type =
            constants.name_and_type(self.name.as_str(), self.field_type.descriptor())?;
        constants.field_ref(class_idx, name_and_type)
    }
}

/// Write a `CONSTANT_Methodref_info` or `CONSTANT_InterfaceMethodref_info`
impl<'c> ConstantsWriter<'c, MethodRefConstantIndex> for MethodRef<'c> {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<MethodRefConstantIndex, Error> {
        let class_idx = self.class.constant_index(constants)?;
        let name_and_type =
            constants.name_and_type(self.name.as_str(), self.descriptor.descriptor())?;
        constants.method_ref(class_idx, name_and_type, self.is_interface())
    }
}

impl<'c> ConstantsWriter<'c, MethodTypeConstantIndex> for MethodType<'c> {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<MethodTypeConstantIndex, Error> {
        constants.method_type(self.descriptor())
    }
}

impl<'c> ConstantsWriter<'c, MethodHandleConstantIndex> for MethodHandle<'c> {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<MethodHandleConstantIndex, Error> {
        let member: ConstantIndex = match &self.member {
            MemberRef::Field(field) => field.constant_index(constants)?.into(),
            MemberRef::Method(method) => method.constant_index(constants)?.into(),
        };
        constants.method_handle(self.kind, member)
    }
}

impl<'c> ConstantsWriter<'c, BootstrapMethodIndex> for types::BootstrapMethod<'c> {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<BootstrapMethodIndex, Error> {
        let handle = self.handle.constant_index(constants)?;
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.constant_index(constants))
            .collect::<Result<Vec<_>, _>>()?;
        constants.bootstrap_method(handle, arguments)
    }
}

impl<'c> ConstantsWriter<'c, InvokeDynamicConstantIndex> for InvokeDynamic<'c> {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<InvokeDynamicConstantIndex, Error> {
        let bootstrap = self.bootstrap.constant_index(constants)?;
        let name_and_type =
            constants.name_and_type(self.name.as_str(), self.descriptor.descriptor())?;
        constants.invoke_dynamic(bootstrap, name_and_type)
    }
}

/// Write a constant which can be loaded up using `ldc` or `ldc2_w`
impl<'c> ConstantsWriter<'c, ConstantIndex> for LoadableConstant<'c> {
    fn constant_index(&self, constants: &mut ConstantsPool) -> Result<ConstantIndex, Error> {
        match self {
            LoadableConstant::Integer(integer) => constants.integer(*integer),
            LoadableConstant::Float(float) => constants.float(*float),
            LoadableConstant::Long(long) => constants.long(*long),
            LoadableConstant::Double(double) => constants.double(*double),
            LoadableConstant::String(string) => Ok(constants.string(string.as_str())?.into()),
            LoadableConstant::Class(class) => Ok(class.constant_index(constants)?.into()),
            LoadableConstant::MethodType(method_type) => {
                Ok(method_type.constant_index(constants)?.into())
            }
            LoadableConstant::MethodHandle(handle) => Ok(handle.constant_index(constants)?.into()),
            LoadableConstant::Dynamic(dynamic) => {
                let bootstrap = dynamic.bootstrap.constant_index(constants)?;
                let name_and_type = constants
                    .name_and_type(dynamic.name.as_str(), dynamic.constant_type.descriptor())?;
                constants.dynamic(bootstrap, name_and_type)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::types::TypeContext;
    use crate::jvm::UnqualifiedName;

    #[test]
    fn deduplicates_structurally() {
        let mut pool = ConstantsPool::new();
        let first = pool.string("hello").unwrap();
        let int = pool.integer(42).unwrap();
        let second = pool.string(String::from("hello")).unwrap();

        assert_eq!(first, second);
        assert_ne!(ConstantIndex::from(first), int);
        assert_eq!(pool.integer(42).unwrap(), int);
        assert_ne!(pool.integer(43).unwrap(), int);

        // Utf8 "hello", String, Integer 42, Integer 43
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.count(), 5);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantsPool::new();
        assert_eq!(pool.long(1).unwrap(), ConstantIndex(1));
        assert_eq!(pool.double(2.0).unwrap(), ConstantIndex(3));
        assert_eq!(pool.integer(3).unwrap(), ConstantIndex(5));
        assert_eq!(pool.count(), 6);
        assert_eq!(pool.get(ConstantIndex(3)), Some(&Constant::Double(2.0f64.to_bits())));
        assert_eq!(pool.get(ConstantIndex(4)), None);
    }

    #[test]
    fn floats_by_bit_pattern() {
        let mut pool = ConstantsPool::new();
        let nan = pool.float(f32::NAN).unwrap();
        assert_eq!(pool.float(f32::NAN).unwrap(), nan);
        assert_ne!(pool.float(0.0).unwrap(), pool.float(-0.0).unwrap());
    }

    #[test]
    fn composite_constants_intern_parts_first() {
        let context = TypeContext::new();
        let mut pool = ConstantsPool::new();
        let field = FieldRef::system_out(&context);
        let field_idx = field.constant_index(&mut pool).unwrap();

        let constants: Vec<Constant> = pool.iter().map(|(_, c)| c.clone()).collect();
        assert_eq!(constants[0], Constant::Utf8(String::from("java/lang/System")));
        assert!(matches!(constants[1], Constant::Class(_)));
        assert_eq!(constants[2], Constant::Utf8(String::from("out")));
        assert_eq!(constants[3], Constant::Utf8(String::from("Ljava/io/PrintStream;")));
        assert!(matches!(constants[4], Constant::NameAndType { .. }));
        assert!(matches!(constants[5], Constant::FieldRef(_, _)));
        assert_eq!(ConstantIndex::from(field_idx), ConstantIndex(6));

        assert_eq!(field.constant_index(&mut pool).unwrap(), field_idx);
        assert_eq!(pool.len(), 6);
    }

    #[test]
    fn array_classes_use_descriptors() {
        let context = TypeContext::new();
        let mut pool = ConstantsPool::new();
        let array = context.resolve("java.lang.String[]").unwrap();
        array.constant_index(&mut pool).unwrap();
        assert_eq!(
            pool.find_utf8("[Ljava/lang/String;").map(|idx| idx.0),
            Some(ConstantIndex(1))
        );
        assert!(context.int().constant_index(&mut pool).is_err());
    }

    #[test]
    fn bootstrap_methods_are_shared() {
        let context = TypeContext::new();
        let mut pool = ConstantsPool::new();
        let bootstrap = types::BootstrapMethod {
            handle: MethodHandle::invoker(MethodRef::new(
                context.resolve("java.lang.invoke.StringConcatFactory").unwrap(),
                UnqualifiedName::from_string(String::from("makeConcat")).unwrap(),
                MethodType::new(vec![], context.object()),
                true,
            )),
            arguments: vec![LoadableConstant::from("\u{1}!")],
        };
        let call = |name: &str| InvokeDynamic {
            bootstrap: bootstrap.clone(),
            name: UnqualifiedName::from_string(String::from(name)).unwrap(),
            descriptor: MethodType::new(vec![context.int()], context.string()),
        };

        let first = call("concat").constant_index(&mut pool).unwrap();
        let second = call("concat2").constant_index(&mut pool).unwrap();
        assert_ne!(first, second);
        assert_eq!(pool.bootstrap_methods().len(), 1);
    }

    #[test]
    fn rename_keeps_indices() {
        let mut pool = ConstantsPool::new();
        let class = pool.class("a/Old").unwrap();
        let name = pool.find_utf8("a/Old").unwrap();

        pool.rename_utf8(name, "a/New").unwrap();
        assert_eq!(pool.get(name.0), Some(&Constant::Utf8(String::from("a/New"))));
        assert_eq!(pool.class("a/New").unwrap(), class);
        assert_eq!(pool.find_utf8("a/Old"), None);
        assert!(pool.rename_utf8(Utf8ConstantIndex(class.0), "x").is_err());
    }

    #[test]
    fn renaming_a_shared_class_name() {
        let mut pool = ConstantsPool::new();
        let class = pool.class("a/Old").unwrap();
        let old_name = pool.find_utf8("a/Old").unwrap();
        let literal = pool.string("a/Old").unwrap();

        pool.rename_class(class, "a/New").unwrap();
        let new_name = pool.find_utf8("a/New").unwrap();
        assert_ne!(new_name, old_name);
        assert_eq!(pool.get(class.0), Some(&Constant::Class(new_name)));
        assert_eq!(pool.get(literal.0), Some(&Constant::String(old_name)));
        assert_eq!(pool.class("a/New").unwrap(), class);

        // The new name was already interned, so it is reused rather than duplicated
        let other = pool.class("b/Old").unwrap();
        let count = pool.count();
        pool.rename_class(other, "a/New").unwrap();
        assert_eq!(pool.count(), count);
        assert_eq!(pool.get(other.0), Some(&Constant::Class(new_name)));
        assert_eq!(pool.find_utf8("b/Old").map(|utf8| utf8.0 .0), Some(other.0 .0 - 1));

        // Unshared names are patched in place
        let third = pool.class("c/Old").unwrap();
        let third_name = pool.find_utf8("c/Old").unwrap();
        pool.rename_class(third, "c/New").unwrap();
        assert_eq!(pool.find_utf8("c/New"), Some(third_name));
        assert!(pool.rename_class(ClassConstantIndex(literal.0), "x").is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        let mut pool = ConstantsPool::new();
        for i in 0..65534 {
            pool.integer(i).unwrap();
        }
        assert_eq!(pool.count(), 65535);
        match pool.integer(-1) {
            Err(Error::ConstantPoolOverflow { offset, .. }) => assert_eq!(offset, 65535),
            other => panic!("expected overflow, got {:?}", other),
        }
        // Existing constants are still found
        assert_eq!(pool.integer(7).unwrap(), ConstantIndex(8));
    }

    #[test]
    fn long_strings_are_rejected() {
        let mut pool = ConstantsPool::new();
        let long = "\u{0}".repeat(40000);
        assert!(matches!(pool.utf8(long), Err(Error::Utf8TooLong(80000))));
    }

    mod encode_modified_utf8_tests {
        use super::super::encode_modified_utf8;

        #[test]
        fn containing_null_byte() {
            assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
        }

        #[test]
        fn two_and_three_byte_encodings() {
            assert_eq!(encode_modified_utf8("ĄӒ"), vec![196, 132, 211, 146]);
            assert_eq!(
                encode_modified_utf8("ऄཨ"),
                vec![224, 164, 132, 224, 189, 168]
            );
        }

        #[test]
        fn supplementary_characters() {
            assert_eq!(
                encode_modified_utf8("\u{10000}\u{10FFFF}"),
                vec![237, 160, 128, 237, 176, 128, 237, 175, 191, 237, 191, 191]
            );
        }
    }
}
