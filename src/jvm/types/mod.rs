//! Symbolic types
//!
//! A [`TypeContext`] plays the role of a class loader: it hands out interned [`Type`]s and
//! remembers the superclass and interfaces of every class it knows about. Since types are
//! interned, comparing two types is a pointer comparison.
//!
//! The context is shared by reference and is safe to use from several threads at once. Interned
//! entries are never removed or moved, so a `Type<'c>` stays valid for as long as the context is
//! borrowed.

mod assignable;
mod java_lang;
mod members;

pub use members::*;

use crate::jvm::{BaseType, BinaryName, Error, FieldType, Name, ParseDescriptor, RenderDescriptor};
use crate::util::{RefId, Width};
use elsa::sync::FrozenMap;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

/// Interning table for types
pub struct TypeContext {
    /// Types, keyed by descriptor (`"V"` for `void` and `"null"` for the null type)
    types: FrozenMap<String, Box<TypeData>>,
}

/// Interned type data
pub struct TypeData {
    descriptor: String,
    kind: TypeKind,
}

enum TypeKind {
    Void,
    Null,
    Primitive(BaseType),
    Class {
        name: BinaryName,
        hierarchy: RwLock<Hierarchy>,
    },
    Array {
        /// Descriptor of the type with one less dimension
        component: String,

        /// Descriptor of the non-array element type
        element: String,

        dimensions: usize,
    },
}

#[derive(Clone)]
struct Hierarchy {
    superclass: Option<BinaryName>,
    interfaces: Vec<BinaryName>,
    is_interface: bool,
}

/// Interned type
///
/// Two `Type`s from the same context are equal exactly when they describe the same type.
#[derive(Copy, Clone)]
pub struct Type<'c> {
    context: &'c TypeContext,
    data: RefId<'c, TypeData>,
}

const NULL_KEY: &str = "null";
const VOID_KEY: &str = "V";

impl TypeContext {
    pub fn new() -> TypeContext {
        TypeContext {
            types: FrozenMap::new(),
        }
    }

    /// Intern a type if it isn't there yet
    ///
    /// When two threads race to intern the same descriptor, the first insertion wins and both
    /// get the same entry back.
    fn intern<'c>(&'c self, descriptor: String, make_kind: impl FnOnce() -> TypeKind) -> Type<'c> {
        let data = match self.types.get(descriptor.as_str()) {
            Some(data) => data,
            None => {
                let kind = make_kind();
                self.types.insert(
                    descriptor.clone(),
                    Box::new(TypeData { descriptor, kind }),
                )
            }
        };
        Type {
            context: self,
            data: RefId(data),
        }
    }

    fn lookup<'c>(&'c self, descriptor: &str) -> Option<Type<'c>> {
        self.types.get(descriptor).map(|data| Type {
            context: self,
            data: RefId(data),
        })
    }

    /// Return type of methods that don't return anything
    pub fn void(&self) -> Type<'_> {
        self.intern(String::from(VOID_KEY), || TypeKind::Void)
    }

    /// Type of the `null` literal
    pub fn null(&self) -> Type<'_> {
        self.intern(String::from(NULL_KEY), || TypeKind::Null)
    }

    pub fn primitive(&self, base_type: BaseType) -> Type<'_> {
        self.intern(base_type.render(), || TypeKind::Primitive(base_type))
    }

    pub fn int(&self) -> Type<'_> {
        self.primitive(BaseType::Int)
    }

    pub fn object(&self) -> Type<'_> {
        self.class(&BinaryName::OBJECT)
    }

    pub fn string(&self) -> Type<'_> {
        self.class(&BinaryName::STRING)
    }

    /// Class or interface type
    ///
    /// Classes that have not been declared get `java.lang.Object` as superclass until
    /// [`Self::declare_class`] says otherwise.
    pub fn class(&self, name: &BinaryName) -> Type<'_> {
        self.intern(name.render(), || {
            let hierarchy = match java_lang::lookup(name) {
                Some(known) => Hierarchy {
                    superclass: known.superclass.clone(),
                    interfaces: known.interfaces.to_vec(),
                    is_interface: known.is_interface,
                },
                None => Hierarchy {
                    superclass: Some(BinaryName::OBJECT),
                    interfaces: vec![],
                    is_interface: false,
                },
            };
            TypeKind::Class {
                name: name.clone(),
                hierarchy: RwLock::new(hierarchy),
            }
        })
    }

    /// Record the position of a class in the hierarchy
    ///
    /// Redeclaring a class replaces what was known about it.
    pub fn declare_class<'c>(
        &'c self,
        name: &BinaryName,
        superclass: Type<'c>,
        interfaces: &[Type<'c>],
        is_interface: bool,
    ) -> Result<Type<'c>, Error> {
        let superclass_name = superclass
            .class_name()
            .cloned()
            .ok_or_else(|| Error::NotAClass(superclass.name()))?;
        let interface_names = interfaces
            .iter()
            .map(|interface| {
                interface
                    .class_name()
                    .cloned()
                    .ok_or_else(|| Error::NotAClass(interface.name()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let declared = self.class(name);
        if let TypeKind::Class { hierarchy, .. } = &declared.data.kind {
            let mut hierarchy = hierarchy.write().unwrap_or_else(PoisonError::into_inner);
            hierarchy.superclass = Some(superclass_name);
            hierarchy.interfaces = interface_names;
            hierarchy.is_interface = is_interface;
        }
        Ok(declared)
    }

    /// Array type with `dimensions` more dimensions than `element`
    pub fn array_of<'c>(&'c self, element: Type<'c>, dimensions: usize) -> Result<Type<'c>, Error> {
        if element.is_void() || element.is_null() {
            return Err(Error::InvalidName(format!(
                "cannot make an array of {}",
                element
            )));
        }
        let total = element.dimensions() + dimensions;
        if total > 255 {
            return Err(Error::InvalidName(format!(
                "array type has {} dimensions (max is 255)",
                total
            )));
        }

        let mut array = element;
        for _ in 0..dimensions {
            let component = array;
            let element_descriptor = component.element_type().descriptor().to_owned();
            array = self.intern(format!("[{}", component.descriptor()), || TypeKind::Array {
                component: component.descriptor().to_owned(),
                element: element_descriptor,
                dimensions: component.dimensions() + 1,
            });
        }
        Ok(array)
    }

    pub fn from_field_type(&self, field_type: &FieldType<BinaryName>) -> Result<Type<'_>, Error> {
        match field_type {
            FieldType::Base(base_type) => Ok(self.primitive(*base_type)),
            FieldType::Object(name) => Ok(self.class(name)),
            FieldType::Array(dimensions, element) => {
                let element = self.from_field_type(element)?;
                self.array_of(element, *dimensions)
            }
        }
    }

    /// Resolve a type from one of its names
    ///
    /// Accepted forms are Java keywords (`int`, `void`), descriptors (`J`, `[I`,
    /// `Ljava/lang/String;`), class names in source or internal form (`java.lang.String`,
    /// `java/lang/String`) and source array syntax (`int[][]`). A single uppercase letter that is
    /// a primitive descriptor is read as that primitive.
    pub fn resolve(&self, name: &str) -> Result<Type<'_>, Error> {
        let name = name.trim();

        if let Some(component) = name.strip_suffix("[]") {
            let component = self.resolve(component)?;
            return self.array_of(component, 1);
        }

        if name == "void" || name == VOID_KEY {
            return Ok(self.void());
        }
        if let Some(base_type) = BaseType::from_keyword(name) {
            return Ok(self.primitive(base_type));
        }

        let is_descriptor = name.starts_with('[')
            || (name.starts_with('L') && name.ends_with(';'))
            || (name.len() == 1 && BaseType::parse(name).is_ok());
        if is_descriptor {
            let field_type = FieldType::<BinaryName>::parse(name)
                .map_err(|err| Error::InvalidName(format!("'{}': {}", name, err)))?;
            return self.from_field_type(&field_type);
        }

        let class_name = BinaryName::from_source_name(name)
            .map_err(|err| Error::InvalidName(format!("'{}': {}", name, err)))?;
        Ok(self.class(&class_name))
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        TypeContext::new()
    }
}

impl<'c> Type<'c> {
    pub fn context(self) -> &'c TypeContext {
        self.context
    }

    /// Descriptor (`I`, `[J`, `Ljava/lang/Object;`)
    ///
    /// `void` renders as `V`. The null type has no descriptor and renders as `null`.
    pub fn descriptor(self) -> &'c str {
        &self.data.0.descriptor
    }

    /// Name as it would be written in Java source
    pub fn name(self) -> String {
        self.to_string()
    }

    /// Name of the class or interface (`None` for other types)
    pub fn class_name(self) -> Option<&'c BinaryName> {
        match &self.data.0.kind {
            TypeKind::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Name used in a `CONSTANT_Class` entry
    ///
    /// Arrays use their descriptor here. Primitives, `void` and `null` have no class entry.
    pub fn constant_class_name(self) -> Option<&'c str> {
        match &self.data.0.kind {
            TypeKind::Class { name, .. } => Some(name.as_str()),
            TypeKind::Array { .. } => Some(self.descriptor()),
            _ => None,
        }
    }

    pub fn is_void(self) -> bool {
        matches!(self.data.kind, TypeKind::Void)
    }

    pub fn is_null(self) -> bool {
        matches!(self.data.kind, TypeKind::Null)
    }

    pub fn is_primitive(self) -> bool {
        matches!(self.data.kind, TypeKind::Primitive(_))
    }

    pub fn is_array(self) -> bool {
        matches!(self.data.kind, TypeKind::Array { .. })
    }

    pub fn is_class(self) -> bool {
        matches!(self.data.kind, TypeKind::Class { .. })
    }

    /// Classes, interfaces, arrays and the null type
    pub fn is_reference(self) -> bool {
        self.is_class() || self.is_array() || self.is_null()
    }

    pub fn base_type(self) -> Option<BaseType> {
        match self.data.kind {
            TypeKind::Primitive(base_type) => Some(base_type),
            _ => None,
        }
    }

    /// Number of array dimensions (0 for non-array types)
    pub fn dimensions(self) -> usize {
        match self.data.kind {
            TypeKind::Array { dimensions, .. } => dimensions,
            _ => 0,
        }
    }

    /// Innermost non-array type (the type itself if it isn't an array)
    pub fn element_type(self) -> Type<'c> {
        match &self.data.0.kind {
            TypeKind::Array { element, .. } => self.context.lookup(element).unwrap_or(self),
            _ => self,
        }
    }

    /// Type with one less array dimension
    pub fn component_type(self) -> Option<Type<'c>> {
        match &self.data.0.kind {
            TypeKind::Array { component, .. } => self.context.lookup(component),
            _ => None,
        }
    }

    fn hierarchy(self) -> Option<Hierarchy> {
        match &self.data.0.kind {
            TypeKind::Class { hierarchy, .. } => Some(
                hierarchy
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            ),
            _ => None,
        }
    }

    /// Direct superclass
    ///
    /// Interfaces report `java.lang.Object`, arrays report `java.lang.Object`, and everything
    /// else (including `java.lang.Object` itself) has no superclass.
    pub fn superclass(self) -> Option<Type<'c>> {
        if self.is_array() {
            return Some(self.context.object());
        }
        self.hierarchy()
            .and_then(|hierarchy| hierarchy.superclass)
            .map(|name| self.context.class(&name))
    }

    /// Directly implemented interfaces (or directly extended interfaces, for interfaces)
    pub fn interfaces(self) -> Vec<Type<'c>> {
        if self.is_array() {
            return vec![
                self.context.class(&BinaryName::CLONEABLE),
                self.context.class(&BinaryName::SERIALIZABLE),
            ];
        }
        self.hierarchy()
            .map(|hierarchy| {
                hierarchy
                    .interfaces
                    .iter()
                    .map(|name| self.context.class(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_interface(self) -> bool {
        self.hierarchy()
            .map(|hierarchy| hierarchy.is_interface)
            .unwrap_or(false)
    }

    /// Number of operand stack or local variable slots a value of this type takes
    pub fn width(self) -> usize {
        match self.data.kind {
            TypeKind::Void => 0,
            TypeKind::Primitive(base_type) => base_type.width(),
            _ => 1,
        }
    }

    /// Convert back into a descriptor type
    ///
    /// Returns `None` for `void` and `null`.
    pub fn field_type(self) -> Option<FieldType<BinaryName>> {
        match &self.data.0.kind {
            TypeKind::Void | TypeKind::Null => None,
            TypeKind::Primitive(base_type) => Some(FieldType::Base(*base_type)),
            TypeKind::Class { name, .. } => Some(FieldType::Object(name.clone())),
            TypeKind::Array { .. } => {
                let element = self.element_type().field_type()?;
                Some(FieldType::Array(self.dimensions(), Box::new(element)))
            }
        }
    }
}

impl<'c> Width for Type<'c> {
    fn width(&self) -> usize {
        Type::width(*self)
    }
}

impl<'c> PartialEq for Type<'c> {
    fn eq(&self, other: &Type<'c>) -> bool {
        self.data == other.data
    }
}

impl<'c> Eq for Type<'c> {}

impl<'c> Hash for Type<'c> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state)
    }
}

impl<'c> Debug for Type<'c> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.descriptor())
    }
}

impl<'c> Display for Type<'c> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.data.0.kind {
            TypeKind::Void => f.write_str("void"),
            TypeKind::Null => f.write_str("null"),
            TypeKind::Primitive(base_type) => f.write_str(base_type.keyword()),
            TypeKind::Class { name, .. } => f.write_str(&name.to_source_name()),
            TypeKind::Array { dimensions, .. } => {
                Display::fmt(&self.element_type(), f)?;
                for _ in 0..*dimensions {
                    f.write_str("[]")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolve_forms_agree() {
        let context = TypeContext::new();

        let from_keyword = context.resolve("int").unwrap();
        assert_eq!(from_keyword, context.resolve("I").unwrap());
        assert_eq!(from_keyword.descriptor(), "I");

        let string = context.resolve("java.lang.String").unwrap();
        assert_eq!(string, context.resolve("java/lang/String").unwrap());
        assert_eq!(string, context.resolve("Ljava/lang/String;").unwrap());
        assert_eq!(string, context.string());

        let matrix = context.resolve("long[][]").unwrap();
        assert_eq!(matrix, context.resolve("[[J").unwrap());
        assert_eq!(matrix.dimensions(), 2);
        assert_eq!(matrix.element_type(), context.resolve("long").unwrap());
        assert_eq!(matrix.component_type(), Some(context.resolve("[J").unwrap()));
        assert_eq!(matrix.name(), "long[][]");

        assert!(context.resolve("void").unwrap().is_void());
        assert!(context.resolve("").is_err());
        assert!(context.resolve("[").is_err());
        assert!(context.resolve("void[]").is_err());
    }

    #[test]
    fn widths() {
        let context = TypeContext::new();
        assert_eq!(context.void().width(), 0);
        assert_eq!(context.resolve("double").unwrap().width(), 2);
        assert_eq!(context.resolve("J").unwrap().width(), 2);
        assert_eq!(context.resolve("[J").unwrap().width(), 1);
        assert_eq!(context.null().width(), 1);
    }

    #[test]
    fn hierarchy() {
        let context = TypeContext::new();
        let integer = context.resolve("java.lang.Integer").unwrap();
        assert_eq!(integer.superclass(), Some(context.resolve("java.lang.Number").unwrap()));
        assert_eq!(context.object().superclass(), None);

        let unknown = context.resolve("com.example.Thing").unwrap();
        assert_eq!(unknown.superclass(), Some(context.object()));
        assert!(!unknown.is_interface());

        let runnable = context
            .declare_class(
                &BinaryName::from_source_name("java.lang.Runnable").unwrap(),
                context.object(),
                &[],
                true,
            )
            .unwrap();
        let task = context
            .declare_class(
                &BinaryName::from_source_name("com.example.Task").unwrap(),
                unknown,
                &[runnable],
                false,
            )
            .unwrap();
        assert!(runnable.is_interface());
        assert_eq!(task.superclass(), Some(unknown));
        assert_eq!(task.interfaces(), vec![runnable]);

        assert!(context
            .declare_class(
                &BinaryName::from_source_name("com.example.Bad").unwrap(),
                context.int(),
                &[],
                false
            )
            .is_err());
    }

    #[test]
    fn array_dimension_limit() {
        let context = TypeContext::new();
        let int = context.int();
        let widest = context.array_of(int, 255).unwrap();
        assert_eq!(widest.dimensions(), 255);
        assert!(context.array_of(widest, 1).is_err());
        assert!(context.array_of(context.null(), 1).is_err());
    }

    #[test]
    fn concurrent_interning() {
        let context = TypeContext::new();
        let names = ["java.lang.String", "int[]", "com.example.Shared", "[[D"];

        let per_thread: Vec<Vec<String>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let context = &context;
                    scope.spawn(move || {
                        names
                            .iter()
                            .map(|name| {
                                let typ = context.resolve(name).unwrap();
                                format!("{:p}", typ.descriptor())
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for addresses in &per_thread[1..] {
            assert_eq!(addresses, &per_thread[0]);
        }
    }
}
