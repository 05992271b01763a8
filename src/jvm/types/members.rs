use super::{Type, TypeContext};
use crate::jvm::class_file::HandleKind;
use crate::jvm::code::InvokeType;
use crate::jvm::{BaseType, BinaryName, UnqualifiedName};
use crate::util::Width;
use std::fmt::{Debug, Formatter};

/// Reference to a field of some class
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldRef<'c> {
    /// Class declaring the field
    pub class: Type<'c>,
    pub name: UnqualifiedName,
    pub field_type: Type<'c>,
    pub is_static: bool,
}

/// Reference to a method of some class
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodRef<'c> {
    /// Class or interface declaring the method
    pub class: Type<'c>,
    pub name: UnqualifiedName,
    pub descriptor: MethodType<'c>,
    pub is_static: bool,
}

/// Parameter and return types of a method
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MethodType<'c> {
    pub parameters: Vec<Type<'c>>,

    /// Use `void` for methods that don't return anything
    pub return_type: Type<'c>,
}

impl<'c> MethodType<'c> {
    pub fn new(parameters: Vec<Type<'c>>, return_type: Type<'c>) -> MethodType<'c> {
        MethodType {
            parameters,
            return_type,
        }
    }

    /// Method descriptor (`(IJ)V`)
    pub fn descriptor(&self) -> String {
        let mut descriptor = String::from("(");
        for parameter in &self.parameters {
            descriptor.push_str(parameter.descriptor());
        }
        descriptor.push(')');
        descriptor.push_str(self.return_type.descriptor());
        descriptor
    }

    /// Total width of the parameters, which must be 255 or less for it to be valid
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this_len = if has_this_param { 1 } else { 0 };
        this_len + self.parameters.iter().map(|param| param.width()).sum::<usize>()
    }
}

impl<'c> Debug for MethodType<'c> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.descriptor())
    }
}

impl<'c> FieldRef<'c> {
    pub fn new(
        class: Type<'c>,
        name: UnqualifiedName,
        field_type: Type<'c>,
        is_static: bool,
    ) -> FieldRef<'c> {
        FieldRef {
            class,
            name,
            field_type,
            is_static,
        }
    }
}

impl<'c> MethodRef<'c> {
    pub fn new(
        class: Type<'c>,
        name: UnqualifiedName,
        descriptor: MethodType<'c>,
        is_static: bool,
    ) -> MethodRef<'c> {
        MethodRef {
            class,
            name,
            descriptor,
            is_static,
        }
    }

    /// Is the declaring type an interface?
    pub fn is_interface(&self) -> bool {
        self.class.is_interface()
    }

    /// Is this a constructor?
    pub fn is_init(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    /// Pick the invoke instruction that calls this method
    pub fn infer_invoke_type(&self) -> InvokeType {
        if self.is_static {
            InvokeType::Static
        } else if self.name == UnqualifiedName::INIT {
            InvokeType::Special
        } else if self.is_interface() {
            let count = self.descriptor.parameter_length(true);
            InvokeType::Interface(u8::try_from(count).unwrap_or(u8::MAX))
        } else {
            InvokeType::Virtual
        }
    }

    /// Method `java.io.PrintStream.println` taking the given argument type
    pub fn println(context: &'c TypeContext, argument: Type<'c>) -> MethodRef<'c> {
        MethodRef::new(
            context.class(&BinaryName::PRINTSTREAM),
            UnqualifiedName::PRINTLN,
            MethodType::new(vec![argument], context.void()),
            false,
        )
    }

    /// No-argument constructor of a class
    pub fn default_init(class: Type<'c>) -> MethodRef<'c> {
        let void = class.context().void();
        MethodRef::new(class, UnqualifiedName::INIT, MethodType::new(vec![], void), false)
    }
}

impl<'c> FieldRef<'c> {
    /// Static field `java.lang.System.out`
    pub fn system_out(context: &'c TypeContext) -> FieldRef<'c> {
        FieldRef::new(
            context.class(&BinaryName::SYSTEM),
            UnqualifiedName::OUT,
            context.class(&BinaryName::PRINTSTREAM),
            true,
        )
    }
}

/// Field or method targeted by a method handle
#[derive(Clone, PartialEq, Debug)]
pub enum MemberRef<'c> {
    Field(FieldRef<'c>),
    Method(MethodRef<'c>),
}

/// Constant of type `java.lang.invoke.MethodHandle`
#[derive(Clone, PartialEq, Debug)]
pub struct MethodHandle<'c> {
    pub kind: HandleKind,
    pub member: MemberRef<'c>,
}

impl<'c> MethodHandle<'c> {
    /// Handle that reads a field
    pub fn getter(field: FieldRef<'c>) -> MethodHandle<'c> {
        let kind = if field.is_static {
            HandleKind::GetStatic
        } else {
            HandleKind::GetField
        };
        MethodHandle {
            kind,
            member: MemberRef::Field(field),
        }
    }

    /// Handle that writes a field
    pub fn setter(field: FieldRef<'c>) -> MethodHandle<'c> {
        let kind = if field.is_static {
            HandleKind::PutStatic
        } else {
            HandleKind::PutField
        };
        MethodHandle {
            kind,
            member: MemberRef::Field(field),
        }
    }

    /// Handle that invokes a method (or constructs an object, for `<init>`)
    pub fn invoker(method: MethodRef<'c>) -> MethodHandle<'c> {
        let kind = match method.infer_invoke_type() {
            InvokeType::Static => HandleKind::InvokeStatic,
            InvokeType::Special => HandleKind::NewInvokeSpecial,
            InvokeType::Interface(_) => HandleKind::InvokeInterface,
            InvokeType::Virtual => HandleKind::InvokeVirtual,
        };
        MethodHandle {
            kind,
            member: MemberRef::Method(method),
        }
    }
}

/// Bootstrap method and its static arguments
#[derive(Clone, PartialEq, Debug)]
pub struct BootstrapMethod<'c> {
    pub handle: MethodHandle<'c>,
    pub arguments: Vec<LoadableConstant<'c>>,
}

/// Call site of an `invokedynamic` instruction
#[derive(Clone, PartialEq, Debug)]
pub struct InvokeDynamic<'c> {
    pub bootstrap: BootstrapMethod<'c>,
    pub name: UnqualifiedName,
    pub descriptor: MethodType<'c>,
}

/// Dynamically-computed constant
#[derive(Clone, PartialEq, Debug)]
pub struct DynamicConstant<'c> {
    pub bootstrap: BootstrapMethod<'c>,
    pub name: UnqualifiedName,
    pub constant_type: Type<'c>,
}

/// Constants which can be pushed with `ldc`, `ldc_w` or `ldc2_w`, and which can be used as
/// bootstrap method arguments
#[derive(Clone, PartialEq, Debug)]
pub enum LoadableConstant<'c> {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(Type<'c>),
    MethodType(MethodType<'c>),
    MethodHandle(MethodHandle<'c>),
    Dynamic(DynamicConstant<'c>),
}

impl<'c> LoadableConstant<'c> {
    /// Type of the value pushed onto the stack
    pub fn constant_type(&self, context: &'c TypeContext) -> Type<'c> {
        match self {
            LoadableConstant::Integer(_) => context.primitive(BaseType::Int),
            LoadableConstant::Float(_) => context.primitive(BaseType::Float),
            LoadableConstant::Long(_) => context.primitive(BaseType::Long),
            LoadableConstant::Double(_) => context.primitive(BaseType::Double),
            LoadableConstant::String(_) => context.string(),
            LoadableConstant::Class(_) => context.class(&BinaryName::CLASS),
            LoadableConstant::MethodType(_) => context.class(&BinaryName::METHODTYPE),
            LoadableConstant::MethodHandle(_) => context.class(&BinaryName::METHODHANDLE),
            LoadableConstant::Dynamic(dynamic) => dynamic.constant_type,
        }
    }
}

/// Width of the value on the stack (which decides between `ldc` and `ldc2_w`)
impl<'c> Width for LoadableConstant<'c> {
    fn width(&self) -> usize {
        match self {
            LoadableConstant::Long(_) | LoadableConstant::Double(_) => 2,
            LoadableConstant::Dynamic(dynamic) => dynamic.constant_type.width(),
            _ => 1,
        }
    }
}

impl<'c> From<i32> for LoadableConstant<'c> {
    fn from(value: i32) -> Self {
        LoadableConstant::Integer(value)
    }
}

impl<'c> From<i64> for LoadableConstant<'c> {
    fn from(value: i64) -> Self {
        LoadableConstant::Long(value)
    }
}

impl<'c> From<f32> for LoadableConstant<'c> {
    fn from(value: f32) -> Self {
        LoadableConstant::Float(value)
    }
}

impl<'c> From<f64> for LoadableConstant<'c> {
    fn from(value: f64) -> Self {
        LoadableConstant::Double(value)
    }
}

impl<'c> From<&str> for LoadableConstant<'c> {
    fn from(value: &str) -> Self {
        LoadableConstant::String(value.to_owned())
    }
}
