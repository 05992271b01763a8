use super::{BinaryName, Name};
use crate::util::Width;
use std::io::{Error, ErrorKind, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Utility trait for converting descriptors to string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

/// Utility trait for parsing descriptors out of their string representations
pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string, rejecting trailing input
    fn parse(source: &str) -> Result<Self> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(c) => {
                let msg = format!("Unexpected leftover input '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }

    /// Read the descriptor from a character buffer
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self>;
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub const ALL: [BaseType; 8] = [
        BaseType::Boolean,
        BaseType::Byte,
        BaseType::Char,
        BaseType::Short,
        BaseType::Int,
        BaseType::Long,
        BaseType::Float,
        BaseType::Double,
    ];

    /// Java source keyword for the type
    pub const fn keyword(self) -> &'static str {
        match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<BaseType> {
        BaseType::ALL
            .iter()
            .copied()
            .find(|base| base.keyword() == keyword)
    }

    /// Descriptor character for the type
    pub const fn descriptor_char(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    /// Is the type represented as an `int` on the operand stack?
    pub const fn is_int_like(self) -> bool {
        matches!(
            self,
            BaseType::Byte | BaseType::Char | BaseType::Int | BaseType::Short | BaseType::Boolean
        )
    }

    /// Type code used by `newarray`
    pub const fn array_type_code(self) -> u8 {
        match self {
            BaseType::Boolean => 4,
            BaseType::Char => 5,
            BaseType::Float => 6,
            BaseType::Double => 7,
            BaseType::Byte => 8,
            BaseType::Short => 9,
            BaseType::Int => 10,
            BaseType::Long => 11,
        }
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        write_to.push(self.descriptor_char());
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        match source.next() {
            Some(c) => BaseType::ALL
                .iter()
                .copied()
                .find(|base| base.descriptor_char() == c)
                .ok_or_else(|| {
                    let msg = format!("Invalid base type character '{}'", c);
                    Error::new(ErrorKind::InvalidInput, msg)
                }),
            None => Err(Error::new(
                ErrorKind::UnexpectedEof,
                "Missing base type character",
            )),
        }
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        if source.next_if_eq(&'L').is_none() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Expected object type to start with `L`",
            ));
        }
        let mut class_name = String::new();
        loop {
            let c: char = source.next().ok_or_else(|| {
                let msg = format!("Missing terminator for 'L{}'", class_name);
                Error::new(ErrorKind::UnexpectedEof, msg)
            })?;
            if c == ';' {
                return BinaryName::from_string(class_name)
                    .map_err(|msg| Error::new(ErrorKind::InvalidInput, msg));
            }
            class_name.push(c);
        }
    }
}

/// Type of a class, instance, or local variable, as written in a descriptor
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType<Class> {
    Base(BaseType),
    Object(Class),

    /// Array with some number of dimensions (at least 1) and a non-array element type
    Array(usize, Box<FieldType<Class>>),
}

impl<C> FieldType<C> {
    pub const fn object(class_name: C) -> FieldType<C> {
        FieldType::Object(class_name)
    }

    pub const fn int() -> FieldType<C> {
        FieldType::Base(BaseType::Int)
    }

    /// Wrap in one more array dimension
    pub fn array(field_type: FieldType<C>) -> FieldType<C> {
        match field_type {
            FieldType::Array(dimensions, element) => FieldType::Array(dimensions + 1, element),
            other => FieldType::Array(1, Box::new(other)),
        }
    }
}

impl<C> Width for FieldType<C> {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Object(_) | FieldType::Array(_, _) => 1,
        }
    }
}

impl<C: RenderDescriptor> RenderDescriptor for FieldType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Object(class) => class.render_to(write_to),
            FieldType::Array(dimensions, element) => {
                for _ in 0..*dimensions {
                    write_to.push('[');
                }
                element.render_to(write_to);
            }
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for FieldType<C> {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        match source.peek().copied() {
            None => Err(Error::new(ErrorKind::UnexpectedEof, "Missing field type")),
            Some('L') => C::parse_from(source).map(FieldType::Object),
            Some('[') => {
                let mut dimensions = 0;
                while source.next_if_eq(&'[').is_some() {
                    dimensions += 1;
                }
                if dimensions > 255 {
                    let msg = format!("Array type has {} dimensions (max is 255)", dimensions);
                    return Err(Error::new(ErrorKind::InvalidInput, msg));
                }
                let element = match source.peek().copied() {
                    Some('L') => FieldType::Object(C::parse_from(source)?),
                    _ => FieldType::Base(BaseType::parse_from(source)?),
                };
                Ok(FieldType::Array(dimensions, Box::new(element)))
            }
            Some(_) => BaseType::parse_from(source).map(FieldType::Base),
        }
    }
}

/// Signature of a method, as written in a descriptor
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor<Class> {
    pub parameters: Vec<FieldType<Class>>,

    /// `None` is for `void` (ie. no return)
    pub return_type: Option<FieldType<Class>>,
}

impl<C> MethodDescriptor<C> {
    /// Total length of parameters (not the same as the length of the vector),
    /// which must be 255 or less for it to be valid
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this_len = if has_this_param { 1 } else { 0 };
        this_len + self.parameters.iter().map(Width::width).sum::<usize>()
    }
}

impl<C: RenderDescriptor> RenderDescriptor for MethodDescriptor<C> {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl<C: ParseDescriptor> ParseDescriptor for MethodDescriptor<C> {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        if source.next_if_eq(&'(').is_none() {
            let msg = "Expected '(' for method";
            return Err(Error::new(ErrorKind::InvalidInput, msg));
        }

        let mut parameters = vec![];
        while source.next_if_eq(&')').is_none() {
            if source.peek().is_none() {
                let msg = "Expected ')' for method";
                return Err(Error::new(ErrorKind::UnexpectedEof, msg));
            }
            parameters.push(FieldType::<C>::parse_from(source)?);
        }

        let return_type = if source.next_if_eq(&'V').is_some() {
            None
        } else {
            Some(FieldType::<C>::parse_from(source)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fmt::Debug;

    fn round_trip<T: RenderDescriptor + ParseDescriptor + Debug + Eq>(rendered: &str, parsed: T) {
        assert_eq!(rendered, parsed.render());
        assert_eq!(T::parse(rendered).unwrap(), parsed);
    }

    type FT = FieldType<BinaryName>;

    const INT: FT = FieldType::Base(BaseType::Int);
    const DOUBLE: FT = FieldType::Base(BaseType::Double);
    const OBJECT: FT = FieldType::object(BinaryName::OBJECT);
    const STRING: FT = FieldType::object(BinaryName::STRING);

    #[test]
    fn keywords() {
        for base in BaseType::ALL {
            assert_eq!(BaseType::from_keyword(base.keyword()), Some(base));
        }
        assert_eq!(BaseType::from_keyword("void"), None);
    }

    #[test]
    fn field_types() {
        round_trip("Z", FieldType::<BinaryName>::Base(BaseType::Boolean));
        round_trip("Ljava/lang/Object;", OBJECT);
        round_trip(
            "[[[D",
            FieldType::array(FieldType::array(FieldType::array(DOUBLE))),
        );
        round_trip("[Ljava/lang/String;", FieldType::array(STRING));
    }

    #[test]
    fn method_descriptors() {
        round_trip(
            "(I[DLjava/lang/String;)Ljava/lang/Object;",
            MethodDescriptor {
                parameters: vec![INT, FieldType::array(DOUBLE), STRING],
                return_type: Some(OBJECT),
            },
        );
        let descriptor = MethodDescriptor::<BinaryName>::parse("(JID)V").unwrap();
        assert_eq!(descriptor.return_type, None);
        assert_eq!(descriptor.parameter_length(true), 6);
    }

    #[test]
    fn malformed_descriptors() {
        assert!(FT::parse("Ljava/lang/Object").is_err());
        assert!(FT::parse("II").is_err());
        assert!(FT::parse("[").is_err());
        assert!(MethodDescriptor::<BinaryName>::parse("(I").is_err());
        assert!(MethodDescriptor::<BinaryName>::parse("I)V").is_err());
    }
}
