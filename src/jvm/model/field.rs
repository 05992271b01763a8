use crate::jvm::class_file;
use crate::jvm::class_file::{ConstantValue, ConstantsPool, ConstantsWriter};
use crate::jvm::{
    BaseType, Error, FieldAccessFlags, FieldRef, LoadableConstant, Name, Type, UnqualifiedName,
};

/// In-memory representation of a field
pub struct Field<'c> {
    pub access_flags: FieldAccessFlags,
    pub name: UnqualifiedName,
    pub field_type: Type<'c>,

    /// Constant field value
    pub constant_value: Option<LoadableConstant<'c>>,
}

impl<'c> Field<'c> {
    pub fn new(access_flags: FieldAccessFlags, name: UnqualifiedName, field_type: Type<'c>) -> Self {
        Field {
            access_flags,
            name,
            field_type,
            constant_value: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    /// Reference to this field, as declared on `class`
    pub fn reference(&self, class: Type<'c>) -> FieldRef<'c> {
        FieldRef::new(class, self.name.clone(), self.field_type, self.is_static())
    }

    /// Set the initial value of a static field
    ///
    /// Only numeric and string constants can be used, and they must match the field type.
    pub fn set_constant_value(&mut self, value: LoadableConstant<'c>) -> Result<(), Error> {
        if !self.is_static() {
            return Err(Error::NotStaticField(self.name.as_str().to_owned()));
        }

        let fits = match (&value, self.field_type.base_type()) {
            (
                LoadableConstant::Integer(_),
                Some(
                    BaseType::Int
                    | BaseType::Short
                    | BaseType::Char
                    | BaseType::Byte
                    | BaseType::Boolean,
                ),
            ) => true,
            (LoadableConstant::Long(_), Some(BaseType::Long)) => true,
            (LoadableConstant::Float(_), Some(BaseType::Float)) => true,
            (LoadableConstant::Double(_), Some(BaseType::Double)) => true,
            (LoadableConstant::String(_), None) => {
                self.field_type == self.field_type.context().string()
            }
            _ => false,
        };
        if !fits {
            return Err(Error::IncompatibleConstant {
                field: self.name.as_str().to_owned(),
                found: format!("{:?}", value),
            });
        }

        self.constant_value = Some(value);
        Ok(())
    }

    pub fn serialize_field(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<class_file::Field, Error> {
        let name_index = constants.utf8(self.name.as_str())?;
        let descriptor_index = constants.utf8(self.field_type.descriptor())?;

        let mut attributes = vec![];
        if let Some(constant_value) = &self.constant_value {
            let constant_value = ConstantValue(constant_value.constant_index(constants)?);
            attributes.push(constants.get_attribute(constant_value)?);
        }

        Ok(class_file::Field {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::TypeContext;

    fn name(name: &str) -> UnqualifiedName {
        UnqualifiedName::from_string(name.to_owned()).unwrap()
    }

    #[test]
    fn constant_values() {
        let context = TypeContext::new();
        let static_final = FieldAccessFlags::STATIC | FieldAccessFlags::FINAL;

        let mut count = Field::new(static_final, name("COUNT"), context.resolve("short").unwrap());
        count.set_constant_value(LoadableConstant::from(12)).unwrap();
        assert!(matches!(
            count.set_constant_value(LoadableConstant::from(12i64)),
            Err(Error::IncompatibleConstant { .. })
        ));

        let mut greeting = Field::new(static_final, name("GREETING"), context.string());
        greeting
            .set_constant_value(LoadableConstant::from("hello"))
            .unwrap();
        let mut object = Field::new(static_final, name("OBJECT"), context.object());
        assert!(object
            .set_constant_value(LoadableConstant::from("hello"))
            .is_err());

        let mut instance = Field::new(FieldAccessFlags::FINAL, name("x"), context.int());
        assert!(matches!(
            instance.set_constant_value(LoadableConstant::from(1)),
            Err(Error::NotStaticField(_))
        ));
    }

    #[test]
    fn serialized_layout() {
        let context = TypeContext::new();
        let mut constants = ConstantsPool::new();
        let mut field = Field::new(
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC,
            name("LIMIT"),
            context.resolve("long").unwrap(),
        );
        field.set_constant_value(LoadableConstant::from(1i64 << 40)).unwrap();

        let serialized = field.serialize_field(&mut constants).unwrap();
        assert_eq!(constants.find_utf8("LIMIT"), Some(serialized.name_index));
        assert_eq!(constants.find_utf8("J"), Some(serialized.descriptor_index));
        assert_eq!(serialized.attributes.len(), 1);
        assert_eq!(
            constants.find_utf8("ConstantValue"),
            Some(serialized.attributes[0].name_index)
        );
    }
}
