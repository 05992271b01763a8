//! Minimal class file reader, just enough to inspect what the builder produced

#![allow(dead_code)]

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};

#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
}

#[derive(Debug)]
pub struct ParsedAttribute {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct ParsedMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<ParsedAttribute>,
}

#[derive(Debug)]
pub struct ParsedCode {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub attributes: Vec<ParsedAttribute>,
}

/// Shape of a `StackMapTable` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Same { delta: u16 },
    SameLocals1StackItem { delta: u16 },
    SameLocals1StackItemExtended { delta: u16 },
    Chop { delta: u16, chopped: u8 },
    SameExtended { delta: u16 },
    Append { delta: u16, appended: u8 },
    Full { delta: u16, locals: u16, stack: u16 },
}

#[derive(Debug)]
pub struct ParsedClass {
    pub minor_version: u16,
    pub major_version: u16,

    /// Indexed by constant pool index (slot 0 and the slots after longs/doubles are `None`)
    pub constants: Vec<Option<PoolEntry>>,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<ParsedMember>,
    pub methods: Vec<ParsedMember>,
    pub attributes: Vec<ParsedAttribute>,
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_owned())
}

impl ParsedClass {
    pub fn parse(bytes: &[u8]) -> io::Result<ParsedClass> {
        let mut reader = Cursor::new(bytes);
        if reader.read_u32::<BigEndian>()? != 0xCAFE_BABE {
            return Err(invalid("bad magic"));
        }
        let minor_version = reader.read_u16::<BigEndian>()?;
        let major_version = reader.read_u16::<BigEndian>()?;

        let count = reader.read_u16::<BigEndian>()? as usize;
        let mut constants = vec![None; count.max(1)];
        let mut index = 1;
        while index < count {
            let entry = read_constant(&mut reader)?;
            let wide = matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_));
            constants[index] = Some(entry);
            index += if wide { 2 } else { 1 };
        }
        if index != count {
            return Err(invalid("constant pool count is off"));
        }

        let mut parsed = ParsedClass {
            minor_version,
            major_version,
            constants,
            access_flags: reader.read_u16::<BigEndian>()?,
            this_class: reader.read_u16::<BigEndian>()?,
            super_class: reader.read_u16::<BigEndian>()?,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        };
        for _ in 0..reader.read_u16::<BigEndian>()? {
            let interface = reader.read_u16::<BigEndian>()?;
            parsed.interfaces.push(interface);
        }
        for _ in 0..reader.read_u16::<BigEndian>()? {
            let field = parsed.read_member(&mut reader)?;
            parsed.fields.push(field);
        }
        for _ in 0..reader.read_u16::<BigEndian>()? {
            let method = parsed.read_member(&mut reader)?;
            parsed.methods.push(method);
        }
        parsed.attributes = parsed.read_attributes(&mut reader)?;

        if reader.position() as usize != bytes.len() {
            return Err(invalid("trailing bytes after class"));
        }
        Ok(parsed)
    }

    pub fn utf8(&self, index: u16) -> &str {
        match self.constants.get(index as usize) {
            Some(Some(PoolEntry::Utf8(string))) => string,
            other => panic!("constant #{} is not a Utf8: {:?}", index, other),
        }
    }

    pub fn class_name(&self, index: u16) -> &str {
        match self.constants.get(index as usize) {
            Some(Some(PoolEntry::Class(name))) => self.utf8(*name),
            other => panic!("constant #{} is not a Class: {:?}", index, other),
        }
    }

    pub fn this_class_name(&self) -> &str {
        self.class_name(self.this_class)
    }

    pub fn field(&self, name: &str) -> Option<&ParsedMember> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&ParsedMember> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&ParsedAttribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    fn read_member(&self, reader: &mut Cursor<&[u8]>) -> io::Result<ParsedMember> {
        let access_flags = reader.read_u16::<BigEndian>()?;
        let name = self.utf8(reader.read_u16::<BigEndian>()?).to_owned();
        let descriptor = self.utf8(reader.read_u16::<BigEndian>()?).to_owned();
        let attributes = self.read_attributes(reader)?;
        Ok(ParsedMember {
            access_flags,
            name,
            descriptor,
            attributes,
        })
    }

    fn read_attributes(&self, reader: &mut Cursor<&[u8]>) -> io::Result<Vec<ParsedAttribute>> {
        let count = reader.read_u16::<BigEndian>()?;
        let mut attributes = vec![];
        for _ in 0..count {
            let name = self.utf8(reader.read_u16::<BigEndian>()?).to_owned();
            let length = reader.read_u32::<BigEndian>()? as usize;
            let mut data = vec![0; length];
            reader.read_exact(&mut data)?;
            attributes.push(ParsedAttribute { name, data });
        }
        Ok(attributes)
    }

    /// Decode the `Code` attribute of a method
    pub fn code(&self, method: &ParsedMember) -> io::Result<ParsedCode> {
        let attribute = method
            .attributes
            .iter()
            .find(|attribute| attribute.name == "Code")
            .ok_or_else(|| invalid("method has no code"))?;
        let mut reader = Cursor::new(&attribute.data[..]);
        let max_stack = reader.read_u16::<BigEndian>()?;
        let max_locals = reader.read_u16::<BigEndian>()?;
        let code_length = reader.read_u32::<BigEndian>()? as usize;
        let mut code = vec![0; code_length];
        reader.read_exact(&mut code)?;
        let exception_table_length = reader.read_u16::<BigEndian>()?;
        for _ in 0..exception_table_length {
            reader.read_u64::<BigEndian>()?;
        }
        let attributes = self.read_attributes(&mut reader)?;
        Ok(ParsedCode {
            max_stack,
            max_locals,
            code,
            attributes,
        })
    }
}

impl ParsedCode {
    /// Decode the frames of the `StackMapTable` (empty if there is none)
    pub fn frames(&self) -> io::Result<Vec<FrameKind>> {
        let attribute = match self
            .attributes
            .iter()
            .find(|attribute| attribute.name == "StackMapTable")
        {
            Some(attribute) => attribute,
            None => return Ok(vec![]),
        };

        let mut reader = Cursor::new(&attribute.data[..]);
        let count = reader.read_u16::<BigEndian>()?;
        let mut frames = vec![];
        for _ in 0..count {
            let frame_type = reader.read_u8()?;
            let frame = match frame_type {
                0..=63 => FrameKind::Same {
                    delta: frame_type as u16,
                },
                64..=127 => {
                    skip_verification_type(&mut reader)?;
                    FrameKind::SameLocals1StackItem {
                        delta: frame_type as u16 - 64,
                    }
                }
                247 => {
                    let delta = reader.read_u16::<BigEndian>()?;
                    skip_verification_type(&mut reader)?;
                    FrameKind::SameLocals1StackItemExtended { delta }
                }
                248..=250 => FrameKind::Chop {
                    delta: reader.read_u16::<BigEndian>()?,
                    chopped: 251 - frame_type,
                },
                251 => FrameKind::SameExtended {
                    delta: reader.read_u16::<BigEndian>()?,
                },
                252..=254 => {
                    let delta = reader.read_u16::<BigEndian>()?;
                    let appended = frame_type - 251;
                    for _ in 0..appended {
                        skip_verification_type(&mut reader)?;
                    }
                    FrameKind::Append { delta, appended }
                }
                255 => {
                    let delta = reader.read_u16::<BigEndian>()?;
                    let locals = reader.read_u16::<BigEndian>()?;
                    for _ in 0..locals {
                        skip_verification_type(&mut reader)?;
                    }
                    let stack = reader.read_u16::<BigEndian>()?;
                    for _ in 0..stack {
                        skip_verification_type(&mut reader)?;
                    }
                    FrameKind::Full {
                        delta,
                        locals,
                        stack,
                    }
                }
                _ => return Err(invalid("reserved frame type")),
            };
            frames.push(frame);
        }
        Ok(frames)
    }
}

fn skip_verification_type(reader: &mut Cursor<&[u8]>) -> io::Result<()> {
    match reader.read_u8()? {
        0..=6 => Ok(()),
        7 | 8 => reader.read_u16::<BigEndian>().map(|_| ()),
        _ => Err(invalid("unknown verification type")),
    }
}

fn read_constant(reader: &mut Cursor<&[u8]>) -> io::Result<PoolEntry> {
    let entry = match reader.read_u8()? {
        1 => {
            let length = reader.read_u16::<BigEndian>()? as usize;
            let mut bytes = vec![0; length];
            reader.read_exact(&mut bytes)?;
            PoolEntry::Utf8(String::from_utf8_lossy(&bytes).into_owned())
        }
        3 => PoolEntry::Integer(reader.read_i32::<BigEndian>()?),
        4 => PoolEntry::Float(reader.read_u32::<BigEndian>()?),
        5 => PoolEntry::Long(reader.read_i64::<BigEndian>()?),
        6 => PoolEntry::Double(reader.read_u64::<BigEndian>()?),
        7 => PoolEntry::Class(reader.read_u16::<BigEndian>()?),
        8 => PoolEntry::String(reader.read_u16::<BigEndian>()?),
        9 => PoolEntry::FieldRef(
            reader.read_u16::<BigEndian>()?,
            reader.read_u16::<BigEndian>()?,
        ),
        10 => PoolEntry::MethodRef(
            reader.read_u16::<BigEndian>()?,
            reader.read_u16::<BigEndian>()?,
        ),
        11 => PoolEntry::InterfaceMethodRef(
            reader.read_u16::<BigEndian>()?,
            reader.read_u16::<BigEndian>()?,
        ),
        12 => PoolEntry::NameAndType(
            reader.read_u16::<BigEndian>()?,
            reader.read_u16::<BigEndian>()?,
        ),
        15 => PoolEntry::MethodHandle(reader.read_u8()?, reader.read_u16::<BigEndian>()?),
        16 => PoolEntry::MethodType(reader.read_u16::<BigEndian>()?),
        17 => PoolEntry::Dynamic(
            reader.read_u16::<BigEndian>()?,
            reader.read_u16::<BigEndian>()?,
        ),
        18 => PoolEntry::InvokeDynamic(
            reader.read_u16::<BigEndian>()?,
            reader.read_u16::<BigEndian>()?,
        ),
        tag => return Err(invalid(&format!("unknown constant tag {}", tag))),
    };
    Ok(entry)
}
