use super::class_file::Constant;
use super::code::Label;
use crate::util::Offset;
use std::fmt::{Display, Formatter};

/// Error produced while assembling a class
///
/// All errors are fatal to the build that produced them. The variants are grouped by
/// [`ErrorCategory`], which is available through [`Error::category`].
#[derive(Debug)]
pub enum Error {
    // Usage errors
    /// The class has already been finished
    ClassFinished,

    /// A field with this name was already added
    DuplicateField(String),

    /// `<init>` and `<clinit>` are added through dedicated calls
    SpecialMethodName(String),

    MissingField(String),
    MissingMethod(String),

    /// A name or descriptor could not be parsed or is not legal where it is used
    InvalidName(String),

    /// A label can only be positioned once
    LabelAlreadyPositioned(Label),

    /// Label was created by a different method
    ForeignLabel(Label),

    /// Label was referenced by a branch but never positioned
    UnpositionedLabel(Label),

    /// An instruction was pushed after an unconditional control transfer
    UnreachableCode,

    /// A label nothing jumps to was positioned in unreachable code
    UnreachableLabel(Label),

    /// Two `lookupswitch` cases share a key
    DuplicateSwitchKey(i32),

    /// A `tableswitch` needs at least one case and its keys must fit in an `int`
    InvalidSwitchRange { low: i32, targets: usize },

    /// Code was finished while execution could still fall off the end of the method
    EndReached,

    /// Method is abstract or native
    NoCode(String),

    /// `ConstantValue` is only allowed on static fields
    NotStaticField(String),

    // Type errors
    /// Instruction does not fit the current frame
    VerifierError {
        instruction: String,
        kind: VerifierErrorKind,
    },

    /// Initial value does not fit the type of the field
    IncompatibleConstant { field: String, found: String },

    /// Type was expected to be a class or interface
    NotAClass(String),

    // Capacity errors
    ConstantPoolOverflow { constant: Constant, offset: usize },

    /// Modified UTF-8 encoding is longer than 65535 bytes
    Utf8TooLong(usize),

    /// Some count in the class file exceeded 65535
    TooMany { what: &'static str, count: usize },

    MethodCodeOverflow(Offset),
    MaxStackOverflow(Offset),
    MaxLocalsOverflow(Offset),

    // Consistency errors
    /// Two control flow paths into the same label disagree
    IncompatibleFrames {
        label: Label,
        component: FrameComponent,
        expected: String,
        found: String,
    },

    /// Two frames recorded at the same address disagree
    ConflictingFrames {
        offset: Offset,
        component: FrameComponent,
        first: String,
        second: String,
    },

    // Internal errors
    /// Branch widening kept changing layout after the allowed number of passes
    WideningDidNotConverge { passes: usize },

    Io(std::io::Error),
}

/// Broad classes of errors
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Builder methods called in an illegal order or with unknown arguments
    Usage,

    /// Incompatible operand types
    Type,

    /// Some fixed-width limit of the class file format was exceeded
    Capacity,

    /// Frames at a merge point disagree
    Consistency,

    Internal,
    Io,
}

/// Which part of a frame was found to be inconsistent
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameComponent {
    Locals,
    Stack,
}

impl Display for FrameComponent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameComponent::Locals => f.write_str("locals"),
            FrameComponent::Stack => f.write_str("stack"),
        }
    }
}

#[derive(Debug)]
pub enum VerifierErrorKind {
    EmptyStack,
    InvalidWidth(usize),
    InvalidIndex(u16),
    InvalidType { expected: String, found: String },
    NotArrayType(String),
    NotReference(String),
    NotUninitialized(String),
    MustReturnValue,
    MustReturnVoid,
    InvalidConstant(String),
}

impl Display for VerifierErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifierErrorKind::EmptyStack => f.write_str("operand stack is empty"),
            VerifierErrorKind::InvalidWidth(width) => {
                write!(f, "expected a value of width {}", width)
            }
            VerifierErrorKind::InvalidIndex(index) => {
                write!(f, "local variable {} is not usable here", index)
            }
            VerifierErrorKind::InvalidType { expected, found } => {
                write!(f, "expected {} but found {}", expected, found)
            }
            VerifierErrorKind::NotArrayType(found) => write!(f, "{} is not an array", found),
            VerifierErrorKind::NotReference(found) => write!(f, "{} is not a reference", found),
            VerifierErrorKind::NotUninitialized(found) => {
                write!(f, "{} is not an uninitialized object", found)
            }
            VerifierErrorKind::MustReturnValue => f.write_str("method must return a value"),
            VerifierErrorKind::MustReturnVoid => f.write_str("method must return void"),
            VerifierErrorKind::InvalidConstant(found) => {
                write!(f, "{} cannot be loaded as a constant", found)
            }
        }
    }
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ClassFinished
            | Error::DuplicateField(_)
            | Error::SpecialMethodName(_)
            | Error::MissingField(_)
            | Error::MissingMethod(_)
            | Error::InvalidName(_)
            | Error::LabelAlreadyPositioned(_)
            | Error::ForeignLabel(_)
            | Error::UnpositionedLabel(_)
            | Error::UnreachableCode
            | Error::UnreachableLabel(_)
            | Error::DuplicateSwitchKey(_)
            | Error::InvalidSwitchRange { .. }
            | Error::EndReached
            | Error::NoCode(_)
            | Error::NotStaticField(_) => ErrorCategory::Usage,

            Error::VerifierError { .. }
            | Error::IncompatibleConstant { .. }
            | Error::NotAClass(_) => ErrorCategory::Type,

            Error::ConstantPoolOverflow { .. }
            | Error::Utf8TooLong(_)
            | Error::TooMany { .. }
            | Error::MethodCodeOverflow(_)
            | Error::MaxStackOverflow(_)
            | Error::MaxLocalsOverflow(_) => ErrorCategory::Capacity,

            Error::IncompatibleFrames { .. } | Error::ConflictingFrames { .. } => {
                ErrorCategory::Consistency
            }

            Error::WideningDidNotConverge { .. } => ErrorCategory::Internal,
            Error::Io(_) => ErrorCategory::Io,
        }
    }

    /// Check a count against the `u16` limit used throughout the class file format
    pub(crate) fn check_count(what: &'static str, count: usize) -> Result<u16, Error> {
        u16::try_from(count).map_err(|_| Error::TooMany { what, count })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ClassFinished => f.write_str("class is already finished"),
            Error::DuplicateField(name) => write!(f, "duplicate field '{}'", name),
            Error::SpecialMethodName(name) => {
                write!(f, "'{}' cannot be added as an ordinary method", name)
            }
            Error::MissingField(name) => write!(f, "no field named '{}'", name),
            Error::MissingMethod(name) => write!(f, "no method named '{}'", name),
            Error::InvalidName(msg) => write!(f, "invalid name: {}", msg),
            Error::LabelAlreadyPositioned(label) => {
                write!(f, "label {} is already positioned", label)
            }
            Error::ForeignLabel(label) => write!(f, "label {} belongs to another method", label),
            Error::UnpositionedLabel(label) => {
                write!(f, "label {} is branched to but never positioned", label)
            }
            Error::UnreachableCode => f.write_str("instruction is unreachable"),
            Error::UnreachableLabel(label) => {
                write!(f, "label {} is unreachable and nothing jumps to it", label)
            }
            Error::DuplicateSwitchKey(key) => write!(f, "duplicate switch key {}", key),
            Error::InvalidSwitchRange { low, targets } => write!(
                f,
                "tableswitch from {} with {} cases does not fit in an int",
                low, targets
            ),
            Error::EndReached => f.write_str("execution can fall off the end of the method"),
            Error::NoCode(name) => write!(f, "method '{}' cannot have code", name),
            Error::NotStaticField(name) => {
                write!(f, "field '{}' must be static to have a constant value", name)
            }
            Error::VerifierError { instruction, kind } => {
                write!(f, "incompatible types for {}: {}", instruction, kind)
            }
            Error::IncompatibleConstant { field, found } => {
                write!(f, "cannot initialize field '{}' with {}", field, found)
            }
            Error::NotAClass(found) => write!(f, "{} is not a class or interface", found),
            Error::ConstantPoolOverflow { constant, offset } => write!(
                f,
                "constant pool overflow at index {} adding {:?}",
                offset, constant
            ),
            Error::Utf8TooLong(len) => {
                write!(f, "string constant is {} bytes long (max is 65535)", len)
            }
            Error::TooMany { what, count } => {
                write!(f, "{} count cannot exceed 65535: {}", what, count)
            }
            Error::MethodCodeOverflow(offset) => {
                write!(f, "method code is too large: {} bytes", offset.0)
            }
            Error::MaxStackOverflow(offset) => {
                write!(f, "operand stack is too large: {} slots", offset.0)
            }
            Error::MaxLocalsOverflow(offset) => {
                write!(f, "too many local variables: {} slots", offset.0)
            }
            Error::IncompatibleFrames {
                label,
                component,
                expected,
                found,
            } => write!(
                f,
                "incompatible types at branch target {}: {} {} vs {}",
                label, component, expected, found
            ),
            Error::ConflictingFrames {
                offset,
                component,
                first,
                second,
            } => write!(
                f,
                "conflicting frames at offset {}: {} {} vs {}",
                offset.0, component, first, second
            ),
            Error::WideningDidNotConverge { passes } => {
                write!(f, "branch widening did not converge after {} passes", passes)
            }
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
