use crate::jvm::class_file;
use crate::jvm::class_file::ConstantsPool;
use crate::jvm::code::CodeBuilder;
use crate::jvm::{Error, MethodAccessFlags, MethodRef, MethodType, Name, Type, UnqualifiedName};

/// Semantic representation of a method
pub struct Method<'c> {
    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodType<'c>,

    /// Method body (`None` for abstract and native methods)
    pub code_impl: Option<CodeBuilder<'c>>,
}

impl<'c> Method<'c> {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Does this method have a body?
    pub fn has_code(&self) -> bool {
        !self
            .access_flags
            .intersects(MethodAccessFlags::ABSTRACT | MethodAccessFlags::NATIVE)
    }

    /// Reference to this method, as declared on `class`
    pub fn reference(&self, class: Type<'c>) -> MethodRef<'c> {
        MethodRef::new(
            class,
            self.name.clone(),
            self.descriptor.clone(),
            self.is_static(),
        )
    }

    /// Serialize the method, finishing its code along the way
    pub fn serialize_method(
        self,
        constants: &mut ConstantsPool,
        max_widening_passes: Option<usize>,
    ) -> Result<class_file::Method, Error> {
        let name_index = constants.utf8(self.name.as_str())?;
        let descriptor_index = constants.utf8(self.descriptor.descriptor())?;

        let mut attributes = vec![];

        // `Code` attribute
        if let Some(mut code) = self.code_impl {
            code.finish_joined()?;
            let code = code
                .result()?
                .serialize_code(constants, max_widening_passes)?;
            attributes.push(constants.get_attribute(code)?);
        }

        Ok(class_file::Method {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}
