use crate::jvm::class_file::Version;
use std::path::PathBuf;

/// Options that apply to every class assembled in one build
///
/// Nested classes inherit the settings of their host.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Class file version to emit
    ///
    /// `NestHost` and `NestMembers` attributes are only written for Java 11 and up.
    pub version: Version,

    /// Name of the source file, recorded in a `SourceFile` attribute
    pub source_file: Option<String>,

    /// Directory into which every finished class is also written (as `<dir>/<internal name>.class`)
    ///
    /// Failing to write the file is logged but does not fail the build.
    pub debug_output: Option<PathBuf>,

    /// Bound on the number of branch widening passes per method
    ///
    /// `None` means one more than the number of branches in the method, which is always enough.
    pub max_widening_passes: Option<usize>,
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            version: Version::JAVA11,
            source_file: None,
            debug_output: None,
            max_widening_passes: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new()
    }
}
