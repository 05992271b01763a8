//! AST of JVM bytecode
//!
//! The representation is slightly different from the usual presentation to make it more
//! convenient to construct bytecode:
//!
//!   - The `wide` prefix doesn't show up at all, but instead gets merged into the instructions it
//!     is allowed to modify
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches and also simplifies tasks like inverting a
//!     branch condition.
//!
//!   - `jsr` and `ret` are omitted, since they are not allowed in class files that carry a
//!     `StackMapTable`
//!

use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, FieldRefConstantIndex, InvokeDynamicConstantIndex,
    MethodRefConstantIndex,
};
use crate::jvm::{BaseType, FieldRef, InvokeDynamic, LoadableConstant, MethodRef, Serialize, Type};
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::convert::{Infallible, TryFrom};
use std::io::Result;
use std::ops::Not;

/// Non-branching JVM bytecode instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction<Class, Constant, Field, Method, IndyMethod> {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant), // covers both `ldc` and `ldc_w`
    Ldc2(Constant),
    ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    GetStatic(Field),
    PutStatic(Field),
    GetField(Field),
    PutField(Field),
    Invoke(InvokeType, Method),
    InvokeDynamic(IndyMethod),
    New(Class),
    NewArray(BaseType),
    ANewArray(Class),
    ArrayLength,
    CheckCast(Class),
    InstanceOf(Class),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(Class, u8),
}

pub type SerializableInstruction = Instruction<
    ClassConstantIndex,
    ConstantIndex,
    FieldRefConstantIndex,
    MethodRefConstantIndex,
    InvokeDynamicConstantIndex,
>;

/// Instruction as it is pushed into a [`super::CodeBuilder`], before any constants are interned
pub type VerifierInstruction<'c> =
    Instruction<Type<'c>, LoadableConstant<'c>, FieldRef<'c>, MethodRef<'c>, InvokeDynamic<'c>>;

impl<Class, Constant, Field, Method, IndyMethod> Default
    for Instruction<Class, Constant, Field, Method, IndyMethod>
{
    /// `nop`, which is also what padding gets filled with
    fn default() -> Self {
        Instruction::Nop
    }
}

impl<Class, Constant, Field, Method, IndyMethod>
    Instruction<Class, Constant, Field, Method, IndyMethod>
{
    pub fn map<Class2, Constant2, Field2, Method2, IndyMethod2, E>(
        &self,
        map_class: impl Fn(&Class) -> std::result::Result<Class2, E>,
        map_constant: impl Fn(&Constant) -> std::result::Result<Constant2, E>,
        map_field: impl Fn(&Field) -> std::result::Result<Field2, E>,
        map_method: impl Fn(&Method) -> std::result::Result<Method2, E>,
        map_indy_method: impl Fn(&IndyMethod) -> std::result::Result<IndyMethod2, E>,
    ) -> std::result::Result<
        Instruction<Class2, Constant2, Field2, Method2, IndyMethod2>,
        E,
    > {
        use Instruction::*;
        Ok(match self {
            Nop => Nop,
            AConstNull => AConstNull,
            IConstM1 => IConstM1,
            IConst0 => IConst0,
            IConst1 => IConst1,
            IConst2 => IConst2,
            IConst3 => IConst3,
            IConst4 => IConst4,
            IConst5 => IConst5,
            LConst0 => LConst0,
            LConst1 => LConst1,
            FConst0 => FConst0,
            FConst1 => FConst1,
            FConst2 => FConst2,
            DConst0 => DConst0,
            DConst1 => DConst1,
            BiPush(b) => BiPush(*b),
            SiPush(s) => SiPush(*s),
            Ldc(constant) => Ldc(map_constant(constant)?),
            Ldc2(constant) => Ldc2(map_constant(constant)?),
            ILoad(idx) => ILoad(*idx),
            LLoad(idx) => LLoad(*idx),
            FLoad(idx) => FLoad(*idx),
            DLoad(idx) => DLoad(*idx),
            ALoad(idx) => ALoad(*idx),
            IALoad => IALoad,
            LALoad => LALoad,
            FALoad => FALoad,
            DALoad => DALoad,
            AALoad => AALoad,
            BALoad => BALoad,
            CALoad => CALoad,
            SALoad => SALoad,
            IStore(idx) => IStore(*idx),
            LStore(idx) => LStore(*idx),
            FStore(idx) => FStore(*idx),
            DStore(idx) => DStore(*idx),
            AStore(idx) => AStore(*idx),
            IAStore => IAStore,
            LAStore => LAStore,
            FAStore => FAStore,
            DAStore => DAStore,
            AAStore => AAStore,
            BAStore => BAStore,
            CAStore => CAStore,
            SAStore => SAStore,
            Pop => Pop,
            Pop2 => Pop2,
            Dup => Dup,
            DupX1 => DupX1,
            DupX2 => DupX2,
            Dup2 => Dup2,
            Dup2X1 => Dup2X1,
            Dup2X2 => Dup2X2,
            Swap => Swap,
            IAdd => IAdd,
            LAdd => LAdd,
            FAdd => FAdd,
            DAdd => DAdd,
            ISub => ISub,
            LSub => LSub,
            FSub => FSub,
            DSub => DSub,
            IMul => IMul,
            LMul => LMul,
            FMul => FMul,
            DMul => DMul,
            IDiv => IDiv,
            LDiv => LDiv,
            FDiv => FDiv,
            DDiv => DDiv,
            IRem => IRem,
            LRem => LRem,
            FRem => FRem,
            DRem => DRem,
            INeg => INeg,
            LNeg => LNeg,
            FNeg => FNeg,
            DNeg => DNeg,
            ISh(s) => ISh(*s),
            LSh(s) => LSh(*s),
            IAnd => IAnd,
            LAnd => LAnd,
            IOr => IOr,
            LOr => LOr,
            IXor => IXor,
            LXor => LXor,
            IInc(idx, by) => IInc(*idx, *by),
            I2L => I2L,
            I2F => I2F,
            I2D => I2D,
            L2I => L2I,
            L2F => L2F,
            L2D => L2D,
            F2I => F2I,
            F2L => F2L,
            F2D => F2D,
            D2I => D2I,
            D2L => D2L,
            D2F => D2F,
            I2B => I2B,
            I2C => I2C,
            I2S => I2S,
            LCmp => LCmp,
            FCmp(m) => FCmp(*m),
            DCmp(m) => DCmp(*m),
            GetStatic(field) => GetStatic(map_field(field)?),
            PutStatic(field) => PutStatic(map_field(field)?),
            GetField(field) => GetField(map_field(field)?),
            PutField(field) => PutField(map_field(field)?),
            Invoke(typ, method) => Invoke(*typ, map_method(method)?),
            InvokeDynamic(indy_method) => InvokeDynamic(map_indy_method(indy_method)?),
            New(class) => New(map_class(class)?),
            NewArray(bt) => NewArray(*bt),
            ANewArray(class) => ANewArray(map_class(class)?),
            ArrayLength => ArrayLength,
            CheckCast(class) => CheckCast(map_class(class)?),
            InstanceOf(class) => InstanceOf(map_class(class)?),
            MonitorEnter => MonitorEnter,
            MonitorExit => MonitorExit,
            MultiANewArray(class, dims) => MultiANewArray(map_class(class)?, *dims),
        })
    }
}

/// Operands following an opcode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Operands {
    None,
    Byte(u8),
    SignedByte(i8),
    Short(u16),
    SignedShort(i16),

    /// `iinc` local and increment (both widened under `wide`)
    Increment(u16, i16),

    /// `multianewarray` class and dimensions
    ShortByte(u16, u8),

    /// `invokeinterface` method and argument count (followed by a zero byte)
    Interface(u16, u8),

    /// `invokedynamic` call site (followed by two zero bytes)
    Dynamic(u16),
}

/// Byte layout of a straight-line instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Encoding {
    wide: bool,
    opcode: u8,
    operands: Operands,
}

const WIDE: u8 = 0xc4;

impl Encoding {
    const fn op(opcode: u8) -> Encoding {
        Encoding {
            wide: false,
            opcode,
            operands: Operands::None,
        }
    }

    const fn with(opcode: u8, operands: Operands) -> Encoding {
        Encoding {
            wide: false,
            opcode,
            operands,
        }
    }

    /// Locals 0-3 have dedicated opcodes, then come `op idx` and `wide op idx16`
    fn local(short_form_start: u8, normal_form: u8, idx: u16) -> Encoding {
        match u8::try_from(idx) {
            Ok(n @ 0..=3) => Encoding::op(short_form_start + n),
            Ok(n) => Encoding::with(normal_form, Operands::Byte(n)),
            Err(_) => Encoding {
                wide: true,
                opcode: normal_form,
                operands: Operands::Short(idx),
            },
        }
    }

    fn width(&self) -> usize {
        let operands = match self.operands {
            Operands::None => 0,
            Operands::Byte(_) | Operands::SignedByte(_) => 1,
            Operands::Short(_) | Operands::SignedShort(_) => 2,
            Operands::Increment(_, _) if self.wide => 4,
            Operands::Increment(_, _) => 2,
            Operands::ShortByte(_, _) => 3,
            Operands::Interface(_, _) | Operands::Dynamic(_) => 4,
        };
        usize::from(self.wide) + 1 + operands
    }
}

impl Serialize for Encoding {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        if self.wide {
            WIDE.serialize(writer)?;
        }
        self.opcode.serialize(writer)?;
        match self.operands {
            Operands::None => Ok(()),
            Operands::Byte(b) => b.serialize(writer),
            Operands::SignedByte(b) => b.serialize(writer),
            Operands::Short(s) => s.serialize(writer),
            Operands::SignedShort(s) => s.serialize(writer),
            Operands::Increment(idx, diff) if self.wide => {
                idx.serialize(writer)?;
                diff.serialize(writer)
            }
            Operands::Increment(idx, diff) => {
                (idx as u8).serialize(writer)?;
                (diff as i8).serialize(writer)
            }
            Operands::ShortByte(idx, b) => {
                idx.serialize(writer)?;
                b.serialize(writer)
            }
            Operands::Interface(idx, count) => {
                idx.serialize(writer)?;
                count.serialize(writer)?;
                0u8.serialize(writer)
            }
            Operands::Dynamic(idx) => {
                idx.serialize(writer)?;
                0u16.serialize(writer)
            }
        }
    }
}

impl SerializableInstruction {
    /// Opcode and operands, choosing the most compact form available
    fn encoding(&self) -> Encoding {
        use Instruction::*;
        use Operands::{Byte, Short, SignedByte, SignedShort};

        match self {
            Nop => Encoding::op(0x00),
            AConstNull => Encoding::op(0x01),
            IConstM1 => Encoding::op(0x02),
            IConst0 => Encoding::op(0x03),
            IConst1 => Encoding::op(0x04),
            IConst2 => Encoding::op(0x05),
            IConst3 => Encoding::op(0x06),
            IConst4 => Encoding::op(0x07),
            IConst5 => Encoding::op(0x08),
            LConst0 => Encoding::op(0x09),
            LConst1 => Encoding::op(0x0a),
            FConst0 => Encoding::op(0x0b),
            FConst1 => Encoding::op(0x0c),
            FConst2 => Encoding::op(0x0d),
            DConst0 => Encoding::op(0x0e),
            DConst1 => Encoding::op(0x0f),
            BiPush(b) => Encoding::with(0x10, SignedByte(*b)),
            SiPush(s) => Encoding::with(0x11, SignedShort(*s)),
            Ldc(ConstantIndex(idx)) => match u8::try_from(*idx) {
                Ok(b) => Encoding::with(0x12, Byte(b)),
                Err(_) => Encoding::with(0x13, Short(*idx)),
            },
            Ldc2(ConstantIndex(idx)) => Encoding::with(0x14, Short(*idx)),

            ILoad(idx) => Encoding::local(0x1a, 0x15, *idx),
            LLoad(idx) => Encoding::local(0x1e, 0x16, *idx),
            FLoad(idx) => Encoding::local(0x22, 0x17, *idx),
            DLoad(idx) => Encoding::local(0x26, 0x18, *idx),
            ALoad(idx) => Encoding::local(0x2a, 0x19, *idx),
            IALoad => Encoding::op(0x2e),
            LALoad => Encoding::op(0x2f),
            FALoad => Encoding::op(0x30),
            DALoad => Encoding::op(0x31),
            AALoad => Encoding::op(0x32),
            BALoad => Encoding::op(0x33),
            CALoad => Encoding::op(0x34),
            SALoad => Encoding::op(0x35),
            IStore(idx) => Encoding::local(0x3b, 0x36, *idx),
            LStore(idx) => Encoding::local(0x3f, 0x37, *idx),
            FStore(idx) => Encoding::local(0x43, 0x38, *idx),
            DStore(idx) => Encoding::local(0x47, 0x39, *idx),
            AStore(idx) => Encoding::local(0x4b, 0x3a, *idx),
            IAStore => Encoding::op(0x4f),
            LAStore => Encoding::op(0x50),
            FAStore => Encoding::op(0x51),
            DAStore => Encoding::op(0x52),
            AAStore => Encoding::op(0x53),
            BAStore => Encoding::op(0x54),
            CAStore => Encoding::op(0x55),
            SAStore => Encoding::op(0x56),

            Pop => Encoding::op(0x57),
            Pop2 => Encoding::op(0x58),
            Dup => Encoding::op(0x59),
            DupX1 => Encoding::op(0x5a),
            DupX2 => Encoding::op(0x5b),
            Dup2 => Encoding::op(0x5c),
            Dup2X1 => Encoding::op(0x5d),
            Dup2X2 => Encoding::op(0x5e),
            Swap => Encoding::op(0x5f),

            IAdd => Encoding::op(0x60),
            LAdd => Encoding::op(0x61),
            FAdd => Encoding::op(0x62),
            DAdd => Encoding::op(0x63),
            ISub => Encoding::op(0x64),
            LSub => Encoding::op(0x65),
            FSub => Encoding::op(0x66),
            DSub => Encoding::op(0x67),
            IMul => Encoding::op(0x68),
            LMul => Encoding::op(0x69),
            FMul => Encoding::op(0x6a),
            DMul => Encoding::op(0x6b),
            IDiv => Encoding::op(0x6c),
            LDiv => Encoding::op(0x6d),
            FDiv => Encoding::op(0x6e),
            DDiv => Encoding::op(0x6f),
            IRem => Encoding::op(0x70),
            LRem => Encoding::op(0x71),
            FRem => Encoding::op(0x72),
            DRem => Encoding::op(0x73),
            INeg => Encoding::op(0x74),
            LNeg => Encoding::op(0x75),
            FNeg => Encoding::op(0x76),
            DNeg => Encoding::op(0x77),
            ISh(shift) => Encoding::op(0x78 + shift.opcode_offset()),
            LSh(shift) => Encoding::op(0x79 + shift.opcode_offset()),
            IAnd => Encoding::op(0x7e),
            LAnd => Encoding::op(0x7f),
            IOr => Encoding::op(0x80),
            LOr => Encoding::op(0x81),
            IXor => Encoding::op(0x82),
            LXor => Encoding::op(0x83),
            IInc(idx, diff) => Encoding {
                wide: u8::try_from(*idx).is_err() || i8::try_from(*diff).is_err(),
                opcode: 0x84,
                operands: Operands::Increment(*idx, *diff),
            },

            I2L => Encoding::op(0x85),
            I2F => Encoding::op(0x86),
            I2D => Encoding::op(0x87),
            L2I => Encoding::op(0x88),
            L2F => Encoding::op(0x89),
            L2D => Encoding::op(0x8a),
            F2I => Encoding::op(0x8b),
            F2L => Encoding::op(0x8c),
            F2D => Encoding::op(0x8d),
            D2I => Encoding::op(0x8e),
            D2L => Encoding::op(0x8f),
            D2F => Encoding::op(0x90),
            I2B => Encoding::op(0x91),
            I2C => Encoding::op(0x92),
            I2S => Encoding::op(0x93),
            LCmp => Encoding::op(0x94),
            FCmp(CompareMode::L) => Encoding::op(0x95),
            FCmp(CompareMode::G) => Encoding::op(0x96),
            DCmp(CompareMode::L) => Encoding::op(0x97),
            DCmp(CompareMode::G) => Encoding::op(0x98),

            GetStatic(FieldRefConstantIndex(idx)) => Encoding::with(0xb2, Short(idx.0)),
            PutStatic(FieldRefConstantIndex(idx)) => Encoding::with(0xb3, Short(idx.0)),
            GetField(FieldRefConstantIndex(idx)) => Encoding::with(0xb4, Short(idx.0)),
            PutField(FieldRefConstantIndex(idx)) => Encoding::with(0xb5, Short(idx.0)),
            Invoke(invoke_type, MethodRefConstantIndex(idx)) => match invoke_type {
                InvokeType::Virtual => Encoding::with(0xb6, Short(idx.0)),
                InvokeType::Special => Encoding::with(0xb7, Short(idx.0)),
                InvokeType::Static => Encoding::with(0xb8, Short(idx.0)),
                InvokeType::Interface(count) => {
                    Encoding::with(0xb9, Operands::Interface(idx.0, *count))
                }
            },
            Instruction::InvokeDynamic(InvokeDynamicConstantIndex(idx)) => {
                Encoding::with(0xba, Operands::Dynamic(idx.0))
            }

            New(ClassConstantIndex(idx)) => Encoding::with(0xbb, Short(idx.0)),
            NewArray(base_type) => Encoding::with(0xbc, Byte(base_type.array_type_code())),
            ANewArray(ClassConstantIndex(idx)) => Encoding::with(0xbd, Short(idx.0)),
            ArrayLength => Encoding::op(0xbe),
            CheckCast(ClassConstantIndex(idx)) => Encoding::with(0xc0, Short(idx.0)),
            InstanceOf(ClassConstantIndex(idx)) => Encoding::with(0xc1, Short(idx.0)),
            MonitorEnter => Encoding::op(0xc2),
            MonitorExit => Encoding::op(0xc3),
            MultiANewArray(ClassConstantIndex(idx), dimensions) => {
                Encoding::with(0xc5, Operands::ShortByte(idx.0, *dimensions))
            }
        }
    }
}

impl Width for SerializableInstruction {
    fn width(&self) -> usize {
        self.encoding().width()
    }
}

impl Serialize for SerializableInstruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.encoding().serialize(writer)
    }
}

/// Provisional width, before constants are interned
///
/// Every constant is assumed to land past index 255, so `ldc` is counted in its `ldc_w` form.
/// The exact width is only known once the block is serialized.
impl<'c> Width for VerifierInstruction<'c> {
    fn width(&self) -> usize {
        let unresolved = ConstantIndex(u16::MAX);
        let placeholder = self.map(
            |_| Ok::<_, Infallible>(ClassConstantIndex(unresolved)),
            |_| Ok(unresolved),
            |_| Ok(FieldRefConstantIndex(unresolved)),
            |_| Ok(MethodRefConstantIndex(unresolved)),
            |_| Ok(InvokeDynamicConstantIndex(unresolved)),
        );
        match placeholder {
            Ok(insn) => insn.width(),
            Err(never) => match never {},
        }
    }
}

/// Largest key covered by a `tableswitch` starting at `low` with `len` targets
///
/// `None` if there are no targets or if the range runs past `i32::MAX`.
pub fn table_switch_high(low: i32, len: usize) -> Option<i32> {
    let len = i32::try_from(len).ok()?;
    if len == 0 {
        return None;
    }
    low.checked_add(len - 1)
}

/// Branching JVM bytecode instruction
///
/// The type parameters let us abstract over the representation of
///
///   * __regular relative jump targets__: used in almost all branch instructions
///   * __wide relative jump targets__: used only in `goto_w`
///   * __fallthough targets__: used in all instructions that fall through
///
/// Shortly before the final serialization step, regular jump targets will become signed 16-bit
/// offsets into the code array, wide jump targets will become signed 32-bit offsets into the code
/// array, and fallthrough targets will be replaced with unit (since they are implicit from the
/// order of the blocks in the code array).
#[derive(Clone, Debug, PartialEq)]
pub enum BranchInstruction<Lbl, LblWide, LblNext> {
    If(OrdComparison, Lbl, LblNext), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Lbl, LblNext), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Lbl, LblNext),  // covers `if_acmpeq`, `if_acmpne`
    Goto(Lbl),
    GotoW(LblWide),
    TableSwitch {
        /// `default` must be at a multiple of four bytes from the start of the current method, so
        /// there must be a 0-3 inclusive byte padding
        padding: u8,

        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len() - 1`
        default: LblWide,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<LblWide>,
    },
    LookupSwitch {
        /// `default` must be at a multiple of four bytes from the start of the current method, so
        /// there must be a 0-3 inclusive byte padding
        padding: u8,

        /// Jump target if there is no corresponding key
        default: LblWide,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, LblWide)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
    IfNull(EqComparison, Lbl, LblNext), // covers `ifnull`, `ifnonnull`

    /// This is a synthetic marker used to explicitly end a block which just falls through to the
    /// next block. In the JVM, this is implicit when a block ends without a jump. Making it
    /// explicit allows us to enforce that all blocks end in a branch instruction.
    FallThrough(LblNext),
}

impl<Lbl: Copy, LblWide: Copy, LblNext: Copy> BranchInstruction<Lbl, LblWide, LblNext> {
    /// If the instruction can fall through to the next block, get that next block
    pub fn fallthrough_target(&self) -> Option<LblNext> {
        match self {
            BranchInstruction::Goto(_)
            | BranchInstruction::GotoW(_)
            | BranchInstruction::TableSwitch { .. }
            | BranchInstruction::LookupSwitch { .. }
            | BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow => None,

            BranchInstruction::If(_, _, lbl)
            | BranchInstruction::IfICmp(_, _, lbl)
            | BranchInstruction::IfACmp(_, _, lbl)
            | BranchInstruction::IfNull(_, _, lbl)
            | BranchInstruction::FallThrough(lbl) => Some(*lbl),
        }
    }

    /// If the instruction can jump to another block (non-fallthrough), get that block
    pub fn jump_targets(&self) -> JumpTargets<Lbl, LblWide> {
        match self {
            BranchInstruction::If(_, lbl, _) => JumpTargets::Regular(*lbl),
            BranchInstruction::IfICmp(_, lbl, _) => JumpTargets::Regular(*lbl),
            BranchInstruction::IfACmp(_, lbl, _) => JumpTargets::Regular(*lbl),
            BranchInstruction::Goto(lbl) => JumpTargets::Regular(*lbl),
            BranchInstruction::GotoW(lbl_w) => JumpTargets::Wide(*lbl_w),
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().copied());
                JumpTargets::WideMany(ts)
            }
            BranchInstruction::LookupSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().map(|(_, target)| *target));
                JumpTargets::WideMany(ts)
            }
            BranchInstruction::IReturn => JumpTargets::None,
            BranchInstruction::LReturn => JumpTargets::None,
            BranchInstruction::FReturn => JumpTargets::None,
            BranchInstruction::DReturn => JumpTargets::None,
            BranchInstruction::AReturn => JumpTargets::None,
            BranchInstruction::Return => JumpTargets::None,
            BranchInstruction::AThrow => JumpTargets::None,
            BranchInstruction::IfNull(_, lbl, _) => JumpTargets::Regular(*lbl),
            BranchInstruction::FallThrough(_) => JumpTargets::None,
        }
    }

    pub fn map_labels<Lbl2, LblWide2, LblNext2>(
        &self,
        map_label: impl FnOnce(&Lbl) -> Lbl2,
        map_wide_label: impl Fn(&LblWide) -> LblWide2,
        map_next_label: impl FnOnce(&LblNext) -> LblNext2,
    ) -> BranchInstruction<Lbl2, LblWide2, LblNext2> {
        use BranchInstruction::*;

        match self {
            If(op, lbl, next) => If(*op, map_label(lbl), map_next_label(next)),
            IfICmp(op, lbl, next) => IfICmp(*op, map_label(lbl), map_next_label(next)),
            IfACmp(op, lbl, next) => IfACmp(*op, map_label(lbl), map_next_label(next)),
            Goto(lbl) => Goto(map_label(lbl)),
            GotoW(wide) => GotoW(map_wide_label(wide)),
            TableSwitch {
                padding,
                default,
                low,
                targets,
            } => TableSwitch {
                padding: *padding,
                default: map_wide_label(default),
                low: *low,
                targets: targets.iter().map(map_wide_label).collect(),
            },
            LookupSwitch {
                padding,
                default,
                targets,
            } => LookupSwitch {
                padding: *padding,
                default: map_wide_label(default),
                targets: targets
                    .iter()
                    .map(|(key, lbl)| (*key, map_wide_label(lbl)))
                    .collect(),
            },
            IReturn => IReturn,
            LReturn => LReturn,
            FReturn => FReturn,
            DReturn => DReturn,
            AReturn => AReturn,
            Return => Return,
            AThrow => AThrow,
            IfNull(op, lbl, next) => IfNull(*op, map_label(lbl), map_next_label(next)),
            FallThrough(next) => FallThrough(map_next_label(next)),
        }
    }
}

impl<Lbl, LblWide, LblNext> BranchInstruction<Lbl, LblWide, LblNext> {
    /// Update the alignment padding of a switch (no-op for other instructions)
    pub fn set_padding(&mut self, new_padding: u8) {
        match self {
            BranchInstruction::TableSwitch { padding, .. }
            | BranchInstruction::LookupSwitch { padding, .. } => *padding = new_padding,
            _ => (),
        }
    }

    /// Does control never continue past this instruction?
    pub fn is_return_or_throw(&self) -> bool {
        matches!(
            self,
            BranchInstruction::IReturn
                | BranchInstruction::LReturn
                | BranchInstruction::FReturn
                | BranchInstruction::DReturn
                | BranchInstruction::AReturn
                | BranchInstruction::Return
                | BranchInstruction::AThrow
        )
    }
}

impl<Lbl, LblWide, LblFall> Width for BranchInstruction<Lbl, LblWide, LblFall> {
    fn width(&self) -> usize {
        match self {
            BranchInstruction::FallThrough(_) => 0,

            BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow => 1,

            BranchInstruction::Goto(_)
            | BranchInstruction::If(_, _, _)
            | BranchInstruction::IfICmp(_, _, _)
            | BranchInstruction::IfACmp(_, _, _)
            | BranchInstruction::IfNull(_, _, _) => 3,

            BranchInstruction::GotoW(_) => 5,

            BranchInstruction::TableSwitch {
                padding, targets, ..
            } => 1 + *padding as usize + 4 * (3 + targets.len()),

            BranchInstruction::LookupSwitch {
                padding, targets, ..
            } => 1 + *padding as usize + 8 * (1 + targets.len()),
        }
    }
}

impl Serialize for BranchInstruction<i16, i32, ()> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            BranchInstruction::If(comp, lbl, ()) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x99,
                    OrdComparison::NE => 0x9a,
                    OrdComparison::LT => 0x9b,
                    OrdComparison::GE => 0x9c,
                    OrdComparison::GT => 0x9d,
                    OrdComparison::LE => 0x9e,
                };
                opcode.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::IfICmp(comp, lbl, ()) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x9f,
                    OrdComparison::NE => 0xa0,
                    OrdComparison::LT => 0xa1,
                    OrdComparison::GE => 0xa2,
                    OrdComparison::GT => 0xa3,
                    OrdComparison::LE => 0xa4,
                };
                opcode.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::IfACmp(comp, lbl, ()) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xa5,
                    EqComparison::NE => 0xa6,
                };
                opcode.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::Goto(lbl) => {
                0xa7u8.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::GotoW(lbl_ext) => {
                0xc8u8.serialize(writer)?;
                lbl_ext.serialize(writer)?;
            }
            BranchInstruction::TableSwitch {
                padding,
                default,
                low,
                targets,
            } => {
                0xaau8.serialize(writer)?;
                for _ in 0..*padding {
                    0x00u8.serialize(writer)?;
                }
                default.serialize(writer)?;
                low.serialize(writer)?;
                table_switch_high(*low, targets.len())
                    .ok_or_else(|| {
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            "tableswitch range does not fit in an int",
                        )
                    })?
                    .serialize(writer)?;
                for target in targets {
                    target.serialize(writer)?;
                }
            }
            BranchInstruction::LookupSwitch {
                padding,
                default,
                targets,
            } => {
                0xabu8.serialize(writer)?;
                for _ in 0..*padding {
                    0x00u8.serialize(writer)?;
                }
                default.serialize(writer)?;
                (targets.len() as i32).serialize(writer)?;
                for (key, target) in targets {
                    key.serialize(writer)?;
                    target.serialize(writer)?;
                }
            }
            BranchInstruction::IReturn => 0xacu8.serialize(writer)?,
            BranchInstruction::LReturn => 0xadu8.serialize(writer)?,
            BranchInstruction::FReturn => 0xaeu8.serialize(writer)?,
            BranchInstruction::DReturn => 0xafu8.serialize(writer)?,
            BranchInstruction::AReturn => 0xb0u8.serialize(writer)?,
            BranchInstruction::Return => 0xb1u8.serialize(writer)?,
            BranchInstruction::AThrow => 0xbfu8.serialize(writer)?,
            BranchInstruction::IfNull(comp, lbl, ()) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xc6,
                    EqComparison::NE => 0xc7,
                };
                opcode.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::FallThrough(()) => (),
        }
        Ok(())
    }
}

/// Non-fallthrough jump target of a `BranchInstruction`
pub enum JumpTargets<Lbl, LblWide> {
    None,
    Regular(Lbl),
    Wide(LblWide),
    WideMany(Vec<LblWide>),
}

impl<A> JumpTargets<A, A> {
    /// If all targets are the same type, extract them
    pub fn targets(&self) -> &[A] {
        match self {
            JumpTargets::None => &[],
            JumpTargets::Regular(a) => std::slice::from_ref(a),
            JumpTargets::Wide(a) => std::slice::from_ref(a),
            JumpTargets::WideMany(a_many) => a_many,
        }
    }
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

impl ShiftType {
    /// Distance from `ishl`/`lshl` to the opcode for this shift
    const fn opcode_offset(self) -> u8 {
        match self {
            ShiftType::Left => 0,
            ShiftType::ArithmeticRight => 2,
            ShiftType::LogicalRight => 4,
        }
    }
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because the constant argument it expects is not to a
/// `Constant::MethodRef`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}
