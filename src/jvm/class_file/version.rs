use crate::jvm::Serialize;
use byteorder::WriteBytesExt;

/// Class file format version
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    pub const JAVA8: Version = Version::major(52);
    pub const JAVA11: Version = Version::major(55);
    pub const JAVA17: Version = Version::major(61);

    const fn major(major_version: u16) -> Version {
        Version {
            major_version,
            minor_version: 0,
        }
    }

    /// `NestHost` and `NestMembers` attributes were added in Java 11
    pub fn supports_nestmates(self) -> bool {
        self >= Version::JAVA11
    }
}

impl Default for Version {
    fn default() -> Version {
        Version::JAVA11
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ordering_and_layout() {
        assert!(Version::JAVA8 < Version::JAVA11);
        assert!(!Version::JAVA8.supports_nestmates());
        assert!(Version::JAVA17.supports_nestmates());
        assert_eq!(Version::JAVA11.to_bytes().unwrap(), vec![0, 0, 0, 55]);
    }
}
