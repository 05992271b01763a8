use crate::jvm::class_file::{Attribute, Utf8ConstantIndex};
use crate::jvm::{FieldAccessFlags, MethodAccessFlags, Serialize};
use byteorder::WriteBytesExt;

/// Field or method declared by a class or interface
///
/// Both share the same layout ([fields][0], [methods][1]) and only differ in their access flags.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.5
/// [1]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.6
#[derive(Debug)]
pub struct Member<Flags> {
    pub access_flags: Flags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

pub type Field = Member<FieldAccessFlags>;
pub type Method = Member<MethodAccessFlags>;

impl<Flags: Serialize> Serialize for Member<Flags> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::ConstantIndex;

    #[test]
    fn member_layout() {
        let method = Method {
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            name_index: Utf8ConstantIndex(ConstantIndex(4)),
            descriptor_index: Utf8ConstantIndex(ConstantIndex(5)),
            attributes: vec![],
        };
        assert_eq!(method.to_bytes().unwrap(), vec![0, 9, 0, 4, 0, 5, 0, 0]);
    }
}
