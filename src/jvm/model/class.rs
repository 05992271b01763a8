use crate::jvm::class_file;
use crate::jvm::class_file::{
    BootstrapMethods, ClassConstantIndex, ClassFile, ConstantsPool, ConstantsWriter,
    InnerClass, InnerClasses, NestHost, NestMembers, SourceFile, Utf8ConstantIndex, Version,
};
use crate::jvm::code::CodeBuilder;
use crate::jvm::model::{Field, Method};
use crate::jvm::verifier::MethodContext;
use crate::jvm::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldRef, InnerClassAccessFlags,
    LoadableConstant, MethodAccessFlags, MethodRef, MethodType, Name, Serialize, Type,
    TypeContext, UnqualifiedName,
};
use crate::loader::{ClassLoaderService, DefineError, NamePolicy};
use crate::settings::Settings;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Handle to a method added to a [`ClassMaker`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MethodId(usize);

/// Handle to a field added to a [`ClassMaker`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FieldId(usize);

/// Builder for a single class
///
/// Members are kept in the order they are added. Nothing is written out until the class is
/// finished, and a class can only be finished once: afterwards, every method on the builder fails
/// with [`Error::ClassFinished`]. This is also the case if finishing failed.
pub struct ClassMaker<'c> {
    context: &'c TypeContext,
    settings: Settings,

    /// Type of the class being built
    this_type: Type<'c>,
    name: BinaryName,
    superclass: Type<'c>,
    interfaces: Vec<Type<'c>>,
    access_flags: ClassAccessFlags,

    fields: Vec<Field<'c>>,
    field_indices: HashMap<UnqualifiedName, usize>,
    methods: Vec<Method<'c>>,

    /// Host and members of the nest this class is a part of (possibly just this class)
    nest: Arc<Mutex<Nest>>,

    finished: bool,
}

/// Nest of classes, shared between the host and all of its members
#[derive(Debug)]
struct Nest {
    host: BinaryName,
    members: Vec<NestMember>,
}

#[derive(Debug)]
struct NestMember {
    name: BinaryName,

    /// Class this member is lexically nested in (not necessarily the nest host)
    enclosing: BinaryName,

    /// Simple name (`None` for anonymous classes)
    simple_name: Option<UnqualifiedName>,
    access_flags: InnerClassAccessFlags,
}

impl<'c> ClassMaker<'c> {
    /// Start building a new public class
    ///
    /// The class is declared in the type context right away, so code in the class can use the
    /// class type (eg. assign `this` to the superclass type).
    pub fn begin(
        context: &'c TypeContext,
        name: &str,
        superclass: Option<Type<'c>>,
        settings: Settings,
    ) -> Result<ClassMaker<'c>, Error> {
        let name = BinaryName::from_source_name(name).map_err(Error::InvalidName)?;
        let nest = Arc::new(Mutex::new(Nest {
            host: name.clone(),
            members: vec![],
        }));
        Self::begin_in_nest(context, name, superclass, settings, nest)
    }

    fn begin_in_nest(
        context: &'c TypeContext,
        name: BinaryName,
        superclass: Option<Type<'c>>,
        settings: Settings,
        nest: Arc<Mutex<Nest>>,
    ) -> Result<ClassMaker<'c>, Error> {
        let superclass = superclass.unwrap_or_else(|| context.object());
        let this_type = context.declare_class(&name, superclass, &[], false)?;
        Ok(ClassMaker {
            context,
            settings,
            this_type,
            name,
            superclass,
            interfaces: vec![],
            access_flags: ClassAccessFlags::PUBLIC,
            fields: vec![],
            field_indices: HashMap::new(),
            methods: vec![],
            nest,
            finished: false,
        })
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.finished {
            Err(Error::ClassFinished)
        } else {
            Ok(())
        }
    }

    fn lock_nest(&self) -> std::sync::MutexGuard<'_, Nest> {
        self.nest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update what the type context knows about this class
    fn redeclare(&mut self) -> Result<(), Error> {
        let is_interface = self.access_flags.contains(ClassAccessFlags::INTERFACE);
        self.this_type = self.context.declare_class(
            &self.name,
            self.superclass,
            &self.interfaces,
            is_interface,
        )?;
        Ok(())
    }

    pub fn context(&self) -> &'c TypeContext {
        self.context
    }

    pub fn name(&self) -> &BinaryName {
        &self.name
    }

    /// Type of the class under construction
    pub fn class_type(&self) -> Type<'c> {
        self.this_type
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn set_access_flags(&mut self, access_flags: ClassAccessFlags) -> Result<(), Error> {
        self.check_open()?;
        self.access_flags = access_flags;
        self.redeclare()?;

        let name = self.name.clone();
        let mut nest = self.lock_nest();
        if let Some(member) = nest.members.iter_mut().find(|member| member.name == name) {
            member.access_flags = InnerClassAccessFlags::from(access_flags);
        }
        Ok(())
    }

    /// Add an interface to the class
    pub fn implement(&mut self, interface: Type<'c>) -> Result<(), Error> {
        self.check_open()?;
        if !interface.is_class() {
            return Err(Error::NotAClass(interface.name()));
        }
        if !self.interfaces.contains(&interface) {
            self.interfaces.push(interface);
        }
        self.redeclare()
    }

    /// Add a field to the class
    pub fn add_field(
        &mut self,
        access_flags: FieldAccessFlags,
        field_type: Type<'c>,
        name: &str,
    ) -> Result<FieldId, Error> {
        self.check_open()?;
        let name = UnqualifiedName::from_string(name.to_owned()).map_err(Error::InvalidName)?;
        if field_type.is_void() || field_type.is_null() {
            return Err(Error::InvalidName(format!(
                "field '{}' cannot have type {}",
                name, field_type
            )));
        }
        if self.field_indices.contains_key(&name) {
            return Err(Error::DuplicateField(name.as_str().to_owned()));
        }
        self.field_indices.insert(name.clone(), self.fields.len());
        self.fields.push(Field::new(access_flags, name, field_type));
        Ok(FieldId(self.fields.len() - 1))
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Result<FieldRef<'c>, Error> {
        self.check_open()?;
        UnqualifiedName::from_string(name.to_owned())
            .ok()
            .and_then(|name| self.field_indices.get(&name))
            .map(|index| self.fields[*index].reference(self.this_type))
            .ok_or_else(|| Error::MissingField(name.to_owned()))
    }

    /// Set the `ConstantValue` of a static field
    pub fn set_constant_value(
        &mut self,
        field: FieldId,
        value: LoadableConstant<'c>,
    ) -> Result<(), Error> {
        self.check_open()?;
        self.fields
            .get_mut(field.0)
            .ok_or_else(|| Error::MissingField(format!("#{}", field.0)))?
            .set_constant_value(value)
    }

    fn push_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: UnqualifiedName,
        descriptor: MethodType<'c>,
    ) -> Result<MethodId, Error> {
        let parameter_length =
            descriptor.parameter_length(!access_flags.contains(MethodAccessFlags::STATIC));
        if parameter_length > 255 {
            return Err(Error::TooMany {
                what: "parameter slots",
                count: parameter_length,
            });
        }
        if let Some(bad) = descriptor
            .parameters
            .iter()
            .find(|parameter| parameter.is_void() || parameter.is_null())
        {
            return Err(Error::InvalidName(format!(
                "method '{}' cannot have a parameter of type {}",
                name, bad
            )));
        }

        let method = Method {
            access_flags,
            name,
            descriptor,
            code_impl: None,
        };
        let code_impl = if method.has_code() {
            let context = MethodContext {
                this_class: self.this_type,
                return_type: method.descriptor.return_type,
                is_init: method.name == UnqualifiedName::INIT,
            };
            Some(CodeBuilder::new(
                context,
                method.is_static(),
                &method.descriptor.parameters,
            ))
        } else {
            None
        };
        self.methods.push(Method {
            code_impl,
            ..method
        });
        Ok(MethodId(self.methods.len() - 1))
    }

    /// Add an ordinary method
    ///
    /// Constructors and static initializers are added with [`Self::add_constructor`] and
    /// [`Self::add_clinit`].
    pub fn add_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        parameters: Vec<Type<'c>>,
        return_type: Type<'c>,
    ) -> Result<MethodId, Error> {
        self.check_open()?;
        if name == UnqualifiedName::INIT.as_str() || name == UnqualifiedName::CLINIT.as_str() {
            return Err(Error::SpecialMethodName(name.to_owned()));
        }
        UnqualifiedName::check_method_name(name).map_err(Error::InvalidName)?;
        let name = UnqualifiedName::from_string(name.to_owned()).map_err(Error::InvalidName)?;
        self.push_method(access_flags, name, MethodType::new(parameters, return_type))
    }

    /// Add a constructor
    ///
    /// The body must call a superclass (or other) constructor on `this` before returning.
    pub fn add_constructor(
        &mut self,
        access_flags: MethodAccessFlags,
        parameters: Vec<Type<'c>>,
    ) -> Result<MethodId, Error> {
        self.check_open()?;
        let access_flags = access_flags - MethodAccessFlags::STATIC;
        let descriptor = MethodType::new(parameters, self.context.void());
        self.push_method(access_flags, UnqualifiedName::INIT, descriptor)
    }

    /// Add a static initializer body
    ///
    /// Every call continues the same `<clinit>` method, so the id returned is always the same.
    /// Bodies run in the order they were added: a `return` in one body jumps to the start of the
    /// next, and the last body doesn't need to end with a `return`.
    pub fn add_clinit(&mut self) -> Result<MethodId, Error> {
        self.check_open()?;
        let existing = self
            .methods
            .iter()
            .position(|method| method.name == UnqualifiedName::CLINIT);
        let method = match existing {
            Some(index) => MethodId(index),
            None => {
                let descriptor = MethodType::new(vec![], self.context.void());
                self.push_method(MethodAccessFlags::STATIC, UnqualifiedName::CLINIT, descriptor)?
            }
        };
        self.code(method)?.join_body()?;
        Ok(method)
    }

    /// Look up a method by name (the first one added, if the method is overloaded)
    pub fn method(&self, name: &str) -> Result<MethodRef<'c>, Error> {
        self.check_open()?;
        self.methods
            .iter()
            .find(|method| method.name.as_str() == name)
            .map(|method| method.reference(self.this_type))
            .ok_or_else(|| Error::MissingMethod(name.to_owned()))
    }

    /// Reference to a method added to this class
    pub fn method_ref(&self, method: MethodId) -> Result<MethodRef<'c>, Error> {
        self.check_open()?;
        self.methods
            .get(method.0)
            .map(|method| method.reference(self.this_type))
            .ok_or_else(|| Error::MissingMethod(format!("#{}", method.0)))
    }

    /// Code builder for the body of a method
    pub fn code(&mut self, method: MethodId) -> Result<&mut CodeBuilder<'c>, Error> {
        self.check_open()?;
        let method = self
            .methods
            .get_mut(method.0)
            .ok_or_else(|| Error::MissingMethod(format!("#{}", method.0)))?;
        let name = method.name.as_str().to_owned();
        method.code_impl.as_mut().ok_or(Error::NoCode(name))
    }

    /// Start a class nested inside this one
    ///
    /// Named classes are called `Outer$Name`. Anonymous ones are numbered after the classes
    /// already nested directly in this one (`Outer$1`, `Outer$2`, ...). The nested class shares the type context and
    /// settings of this class, but has its own constant pool and must be finished separately.
    pub fn add_nested_class(
        &mut self,
        simple_name: Option<&str>,
        superclass: Option<Type<'c>>,
    ) -> Result<ClassMaker<'c>, Error> {
        self.check_open()?;

        let (name, simple_name) = {
            let nest = self.lock_nest();
            match simple_name {
                Some(simple_name) => {
                    let unqualified = UnqualifiedName::from_string(simple_name.to_owned())
                        .map_err(Error::InvalidName)?;
                    let name = self.name.nested(simple_name).map_err(Error::InvalidName)?;
                    (name, Some(unqualified))
                }
                None => {
                    let index = nest
                        .members
                        .iter()
                        .filter(|member| member.enclosing == self.name)
                        .count()
                        + 1;
                    let name = self
                        .name
                        .nested(&index.to_string())
                        .map_err(Error::InvalidName)?;
                    (name, None)
                }
            }
        };

        {
            let mut nest = self.lock_nest();
            if nest.host == name || nest.members.iter().any(|member| member.name == name) {
                return Err(Error::InvalidName(format!(
                    "nest already has a class named '{}'",
                    name
                )));
            }
            nest.members.push(NestMember {
                name: name.clone(),
                enclosing: self.name.clone(),
                simple_name,
                access_flags: InnerClassAccessFlags::from(ClassAccessFlags::PUBLIC),
            });
        }

        ClassMaker::begin_in_nest(
            self.context,
            name,
            superclass,
            self.settings.clone(),
            self.nest.clone(),
        )
    }

    /// Finish the class and get the class file bytes
    pub fn finish(&mut self) -> Result<Vec<u8>, Error> {
        let class_file = self.finish_class_file(None)?;
        self.write_out(&class_file)
    }

    /// Finish the class under a different name
    ///
    /// Only the name of the class itself is changed, by patching its entry in the constant pool.
    /// Other references to the old name (eg. in descriptors) are left alone.
    pub fn finish_renamed(&mut self, new_name: &str) -> Result<Vec<u8>, Error> {
        let new_name = BinaryName::from_source_name(new_name).map_err(Error::InvalidName)?;
        let class_file = self.finish_class_file(Some(&new_name))?;
        info!("renamed class '{}' to '{}'", self.name, new_name);
        self.write_out(&class_file)
    }

    /// Finish the class and define it through a loader
    ///
    /// The name is reserved first. If the loader hands back a different name, the class is
    /// renamed to fit. The reservation is released if the class can't be built or defined.
    pub fn finish_into<L: ClassLoaderService>(
        &mut self,
        loader: &L,
        policy: NamePolicy,
    ) -> Result<L::Handle, DefineError> {
        self.check_open()?;
        let reservation = loader.reserve(&self.name, policy)?;

        let bytes = if reservation.name() == &self.name {
            self.finish()
        } else {
            let new_name = reservation.name().to_source_name();
            self.finish_renamed(&new_name)
        };
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(err) => {
                loader.release(reservation);
                return Err(DefineError::Build(err));
            }
        };

        match loader.define(reservation.clone(), bytes) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                loader.release(reservation);
                Err(DefineError::Loader(err))
            }
        }
    }

    fn write_out(&self, class_file: &ClassFile) -> Result<Vec<u8>, Error> {
        let name = class_file.class_name().unwrap_or_else(|| self.name.as_str());
        let bytes = class_file.to_bytes().map_err(Error::Io)?;
        info!("finished class '{}' ({} bytes)", name, bytes.len());

        if let Some(directory) = &self.settings.debug_output {
            let path = directory.join(format!("{}.class", name));
            match class_file.save_to_path(&path, true) {
                Ok(()) => info!("wrote '{}'", path.display()),
                Err(err) => warn!("could not write '{}': {}", path.display(), err),
            }
        }

        Ok(bytes)
    }

    /// Lower the class into the class file format
    ///
    /// Constants are interned in the order: class, superclass, interfaces, fields, methods, then
    /// the class attributes (with `BootstrapMethods` last since interning anything before it
    /// might add a bootstrap method).
    fn finish_class_file(&mut self, rename: Option<&BinaryName>) -> Result<ClassFile, Error> {
        self.check_open()?;
        self.finished = true;

        let fields = std::mem::take(&mut self.fields);
        self.field_indices.clear();
        let methods = std::mem::take(&mut self.methods);
        Error::check_count("interfaces", self.interfaces.len())?;
        Error::check_count("fields", fields.len())?;
        Error::check_count("methods", methods.len())?;

        let version = self.settings.version;
        let max_widening_passes = self.settings.max_widening_passes;
        let mut constants = ConstantsPool::new();

        let this_class = self.this_type.constant_index(&mut constants)?;
        let super_class = self.superclass.constant_index(&mut constants)?;
        let interfaces: Vec<ClassConstantIndex> = self
            .interfaces
            .iter()
            .map(|interface| interface.constant_index(&mut constants))
            .collect::<Result<_, _>>()?;

        let fields: Vec<class_file::Field> = fields
            .iter()
            .map(|field| field.serialize_field(&mut constants))
            .collect::<Result<_, _>>()?;
        let methods: Vec<class_file::Method> = methods
            .into_iter()
            .map(|method| method.serialize_method(&mut constants, max_widening_passes))
            .collect::<Result<_, _>>()?;

        let mut attributes = vec![];

        // `SourceFile` attribute
        if let Some(source_file) = &self.settings.source_file {
            let source_file = SourceFile(constants.utf8(source_file.as_str())?);
            attributes.push(constants.get_attribute(source_file)?);
        }

        // `NestHost`/`NestMembers` and `InnerClasses` attributes
        self.nest_attributes(&mut constants, &mut attributes, version)?;

        // `BootstrapMethods` attribute
        if !constants.bootstrap_methods().is_empty() {
            let bootstrap_methods = BootstrapMethods(constants.bootstrap_methods().to_vec());
            Error::check_count("bootstrap methods", bootstrap_methods.0.len())?;
            attributes.push(constants.get_attribute(bootstrap_methods)?);
        }

        if let Some(new_name) = rename {
            constants.rename_class(this_class, new_name.as_str())?;
        }
        Error::check_count("constants", constants.count())?;

        let mut access_flags = self.access_flags;
        if !access_flags.contains(ClassAccessFlags::INTERFACE) {
            access_flags |= ClassAccessFlags::SUPER;
        }

        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    fn nest_attributes(
        &self,
        constants: &mut ConstantsPool,
        attributes: &mut Vec<class_file::Attribute>,
        version: Version,
    ) -> Result<(), Error> {
        let nest = self.lock_nest();
        let is_host = nest.host == self.name;

        if version >= Version::JAVA11 {
            if is_host && !nest.members.is_empty() {
                let members = nest
                    .members
                    .iter()
                    .map(|member| constants.class(member.name.as_str()))
                    .collect::<Result<Vec<_>, _>>()?;
                Error::check_count("nest members", members.len())?;
                attributes.push(constants.get_attribute(NestMembers(members))?);
            } else if !is_host {
                let host = constants.class(nest.host.as_str())?;
                attributes.push(constants.get_attribute(NestHost(host))?);
            }
        }

        // This class (if it is nested) and the classes directly nested in it
        let mut inner_classes = vec![];
        for member in &nest.members {
            if member.name != self.name && member.enclosing != self.name {
                continue;
            }
            let inner_class = constants.class(member.name.as_str())?;
            let outer_class = constants.class(member.enclosing.as_str())?;
            let inner_name = match &member.simple_name {
                Some(simple_name) => constants.utf8(simple_name.as_str())?,
                None => Utf8ConstantIndex(class_file::ConstantIndex::ZERO),
            };
            inner_classes.push(InnerClass {
                inner_class,
                outer_class,
                inner_name,
                access_flags: member.access_flags,
            });
        }
        if !inner_classes.is_empty() {
            Error::check_count("inner classes", inner_classes.len())?;
            attributes.push(constants.get_attribute(InnerClasses(inner_classes))?);
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{BranchInstruction::*, Instruction::*};
    use crate::jvm::ErrorCategory;

    #[test]
    fn finishing_is_final() {
        let context = TypeContext::new();
        let mut class = ClassMaker::begin(&context, "me.Point", None, Settings::default()).unwrap();
        let x = class
            .add_field(FieldAccessFlags::PUBLIC, context.int(), "x")
            .unwrap();
        assert!(matches!(
            class.add_field(FieldAccessFlags::PUBLIC, context.int(), "x"),
            Err(Error::DuplicateField(_))
        ));
        assert_eq!(class.field("x").unwrap().field_type, context.int());
        assert!(matches!(class.field("y"), Err(Error::MissingField(_))));

        let init = class
            .add_constructor(MethodAccessFlags::PUBLIC, vec![])
            .unwrap();
        let code = class.code(init).unwrap();
        code.push_instruction(ALoad(0)).unwrap();
        code.invoke(MethodRef::default_init(context.object()))
            .unwrap();
        code.push_branch_instruction(Return).unwrap();

        let bytes = class.finish().unwrap();
        assert_eq!(&bytes[..4], &ClassFile::MAGIC);

        let err = class.finish().unwrap_err();
        assert!(matches!(err, Error::ClassFinished));
        assert_eq!(err.category(), ErrorCategory::Usage);
        assert!(class
            .add_field(FieldAccessFlags::PUBLIC, context.int(), "z")
            .is_err());
        assert!(class.set_constant_value(x, LoadableConstant::from(1)).is_err());
        assert!(class.code(init).is_err());
    }

    #[test]
    fn failed_finish_is_final() {
        let context = TypeContext::new();
        let mut class =
            ClassMaker::begin(&context, "me.Broken", None, Settings::default()).unwrap();
        let method = class
            .add_method(MethodAccessFlags::STATIC, "run", vec![], context.void())
            .unwrap();
        class.code(method).unwrap().push_instruction(Nop).unwrap();

        assert!(matches!(class.finish(), Err(Error::EndReached)));
        assert!(matches!(class.finish(), Err(Error::ClassFinished)));
    }

    #[test]
    fn special_methods() {
        let context = TypeContext::new();
        let mut class = ClassMaker::begin(&context, "me.Special", None, Settings::default()).unwrap();

        assert!(matches!(
            class.add_method(MethodAccessFlags::PUBLIC, "<init>", vec![], context.void()),
            Err(Error::SpecialMethodName(_))
        ));
        let clinit = class.add_clinit().unwrap();
        assert_eq!(class.add_clinit().unwrap(), clinit);
        assert_eq!(class.methods.len(), 1);

        let abstract_method = class
            .add_method(
                MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
                "shape",
                vec![],
                context.int(),
            )
            .unwrap();
        assert!(matches!(class.code(abstract_method), Err(Error::NoCode(_))));
        assert!(matches!(class.method("missing"), Err(Error::MissingMethod(_))));
        assert_eq!(
            class.method("shape").unwrap().descriptor.descriptor(),
            "()I"
        );
    }

    #[test]
    fn nested_names() {
        let context = TypeContext::new();
        let mut host = ClassMaker::begin(&context, "me.Outer", None, Settings::default()).unwrap();

        let mut named = host.add_nested_class(Some("Inner"), None).unwrap();
        let anonymous = host.add_nested_class(None, None).unwrap();
        assert_eq!(named.name().as_str(), "me/Outer$Inner");
        assert_eq!(anonymous.name().as_str(), "me/Outer$2");
        assert!(matches!(
            host.add_nested_class(Some("a.b"), None),
            Err(Error::InvalidName(_))
        ));
        assert!(host.add_nested_class(Some("Inner"), None).is_err());

        // Numbering restarts inside each enclosing class
        let deeper = named.add_nested_class(None, None).unwrap();
        assert_eq!(deeper.name().as_str(), "me/Outer$Inner$1");
        let third = host.add_nested_class(None, None).unwrap();
        assert_eq!(third.name().as_str(), "me/Outer$3");
    }

    #[test]
    fn clinit_bodies_are_joined() {
        let context = TypeContext::new();
        let mut class = ClassMaker::begin(&context, "me.Init", None, Settings::default()).unwrap();
        class
            .add_field(FieldAccessFlags::STATIC, context.int(), "counter")
            .unwrap();
        let counter = class.field("counter").unwrap();

        // The first body returns early, the second one just ends
        let clinit = class.add_clinit().unwrap();
        let code = class.code(clinit).unwrap();
        code.push_instruction(IConst1).unwrap();
        code.push_instruction(PutStatic(counter.clone())).unwrap();
        code.push_branch_instruction(Return).unwrap();
        assert!(!code.is_reachable());

        class.add_clinit().unwrap();
        let code = class.code(clinit).unwrap();
        assert!(code.is_reachable());
        code.push_instruction(GetStatic(counter.clone())).unwrap();
        code.push_instruction(IConst2).unwrap();
        code.push_instruction(IAdd).unwrap();
        code.push_instruction(PutStatic(counter)).unwrap();

        let class_file = class.finish_class_file(None).unwrap();
        assert_eq!(class_file.methods.len(), 1);
    }

    #[test]
    fn renaming_patches_the_class_name() {
        let context = TypeContext::new();
        let mut class = ClassMaker::begin(&context, "me.Before", None, Settings::default()).unwrap();
        let bytes = class.finish_renamed("me.After").unwrap();

        let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|window| window == needle);
        assert!(contains(b"me/After"));
        assert!(!contains(b"me/Before"));
    }
}
