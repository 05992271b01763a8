use crate::jvm::BinaryName;

/// Hierarchy facts about a library class that is known ahead of time
pub struct KnownClass {
    pub name: BinaryName,
    pub superclass: Option<BinaryName>,
    pub interfaces: &'static [BinaryName],
    pub is_interface: bool,
}

const fn class(
    name: BinaryName,
    superclass: BinaryName,
    interfaces: &'static [BinaryName],
) -> KnownClass {
    KnownClass {
        name,
        superclass: Some(superclass),
        interfaces,
        is_interface: false,
    }
}

const fn interface(name: BinaryName, interfaces: &'static [BinaryName]) -> KnownClass {
    KnownClass {
        name,
        superclass: Some(BinaryName::OBJECT),
        interfaces,
        is_interface: true,
    }
}

const COMPARABLE: &[BinaryName] = &[BinaryName::COMPARABLE];
const SERIALIZABLE: &[BinaryName] = &[BinaryName::SERIALIZABLE];
const COMPARABLE_SERIALIZABLE: &[BinaryName] =
    &[BinaryName::SERIALIZABLE, BinaryName::COMPARABLE];
const STRING_INTERFACES: &[BinaryName] = &[
    BinaryName::SERIALIZABLE,
    BinaryName::COMPARABLE,
    BinaryName::CHARSEQUENCE,
];

/// Core `java.lang` and `java.io` classes that generated code commonly touches
///
/// Only the superclass and interface edges are recorded. Anything else is looked up by the JVM
/// when the class is loaded.
pub const KNOWN_CLASSES: &[KnownClass] = &[
    KnownClass {
        name: BinaryName::OBJECT,
        superclass: None,
        interfaces: &[],
        is_interface: false,
    },
    interface(BinaryName::CHARSEQUENCE, &[]),
    interface(BinaryName::COMPARABLE, &[]),
    interface(BinaryName::CLONEABLE, &[]),
    interface(BinaryName::SERIALIZABLE, &[]),
    class(BinaryName::STRING, BinaryName::OBJECT, STRING_INTERFACES),
    class(BinaryName::NUMBER, BinaryName::OBJECT, SERIALIZABLE),
    class(BinaryName::BYTE, BinaryName::NUMBER, COMPARABLE),
    class(BinaryName::SHORT, BinaryName::NUMBER, COMPARABLE),
    class(BinaryName::INTEGER, BinaryName::NUMBER, COMPARABLE),
    class(BinaryName::LONG, BinaryName::NUMBER, COMPARABLE),
    class(BinaryName::FLOAT, BinaryName::NUMBER, COMPARABLE),
    class(BinaryName::DOUBLE, BinaryName::NUMBER, COMPARABLE),
    class(BinaryName::BOOLEAN, BinaryName::OBJECT, COMPARABLE_SERIALIZABLE),
    class(BinaryName::CHARACTER, BinaryName::OBJECT, COMPARABLE_SERIALIZABLE),
    class(BinaryName::CLASS, BinaryName::OBJECT, SERIALIZABLE),
    class(BinaryName::ENUM, BinaryName::OBJECT, COMPARABLE_SERIALIZABLE),
    class(BinaryName::RECORD, BinaryName::OBJECT, &[]),
    class(BinaryName::SYSTEM, BinaryName::OBJECT, &[]),
    class(BinaryName::THROWABLE, BinaryName::OBJECT, SERIALIZABLE),
    class(BinaryName::EXCEPTION, BinaryName::THROWABLE, &[]),
    class(BinaryName::RUNTIMEEXCEPTION, BinaryName::EXCEPTION, &[]),
    class(BinaryName::ERROR, BinaryName::THROWABLE, &[]),
    class(BinaryName::OUTPUTSTREAM, BinaryName::OBJECT, &[]),
    class(BinaryName::FILTEROUTPUTSTREAM, BinaryName::OUTPUTSTREAM, &[]),
    class(BinaryName::PRINTSTREAM, BinaryName::FILTEROUTPUTSTREAM, &[]),
    class(BinaryName::METHODHANDLE, BinaryName::OBJECT, &[]),
    class(BinaryName::METHODTYPE, BinaryName::OBJECT, SERIALIZABLE),
];

/// Find the hierarchy facts for a well-known class
pub fn lookup(name: &BinaryName) -> Option<&'static KnownClass> {
    KNOWN_CLASSES.iter().find(|known| &known.name == name)
}
