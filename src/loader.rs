//! Handing finished classes over to a class loader
//!
//! Actually loading classes into a running JVM is outside of what this crate does. Instead, the
//! [`ClassLoaderService`] trait captures what a builder needs from a loader: reserve a name, define
//! the class under that name, and give the name back if the class never gets defined. Names are
//! reserved before any bytes exist so that a builder can be renamed instead of having to start
//! over when its name is taken.
//!
//! [`InMemoryLoader`] is a reference implementation which just collects class files.

use crate::jvm::class_file::ClassFile;
use crate::jvm::{BinaryName, Error, Name};
use log::{debug, info};
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::hash::{BuildHasher, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

/// How to pick the name under which a class gets reserved
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NamePolicy {
    /// Use the requested name or fail
    Exact,

    /// Add a random `$<id>` suffix to the requested name, retrying on collisions
    Unique,
}

/// Claim on a class name, handed out by [`ClassLoaderService::reserve`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reservation {
    name: BinaryName,
    token: u64,
}

impl Reservation {
    pub fn new(name: BinaryName, token: u64) -> Reservation {
        Reservation { name, token }
    }

    /// Name that was reserved (not necessarily the one requested)
    pub fn name(&self) -> &BinaryName {
        &self.name
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}

/// Something that can turn class bytes into loaded classes
///
/// Implementations must be safe to call from several threads at once: two builders may try to
/// reserve the same name concurrently.
pub trait ClassLoaderService {
    /// What a successfully defined class turns into
    type Handle;

    /// Reserve a class name
    fn reserve(&self, name: &BinaryName, policy: NamePolicy) -> Result<Reservation, LoaderError>;

    /// Define a class under a reserved name
    ///
    /// The reservation is consumed when the definition succeeds.
    fn define(&self, reservation: Reservation, bytes: Vec<u8>)
        -> Result<Self::Handle, LoaderError>;

    /// Give up a reservation without defining anything
    fn release(&self, reservation: Reservation);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// The exact name requested is already reserved or defined
    NameConflict(BinaryName),

    /// Reservation was never handed out, or has already been used or released
    UnknownReservation(BinaryName),

    /// A class with this name was already defined
    DuplicateDefinition(BinaryName),

    /// The loader refused the class bytes
    Rejected { name: BinaryName, reason: String },
}

impl Display for LoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderError::NameConflict(name) => {
                write!(f, "class name '{}' is already taken", name.as_str())
            }
            LoaderError::UnknownReservation(name) => {
                write!(f, "no reservation is held for '{}'", name.as_str())
            }
            LoaderError::DuplicateDefinition(name) => {
                write!(f, "class '{}' is already defined", name.as_str())
            }
            LoaderError::Rejected { name, reason } => {
                write!(f, "class '{}' was rejected: {}", name.as_str(), reason)
            }
        }
    }
}

impl std::error::Error for LoaderError {}

/// Failure to get a class defined through a loader
#[derive(Debug)]
pub enum DefineError {
    /// The class itself could not be finished
    Build(Error),

    /// The loader did not accept the class
    Loader(LoaderError),
}

impl Display for DefineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DefineError::Build(err) => write!(f, "failed to build class: {}", err),
            DefineError::Loader(err) => write!(f, "failed to define class: {}", err),
        }
    }
}

impl std::error::Error for DefineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DefineError::Build(err) => Some(err),
            DefineError::Loader(err) => Some(err),
        }
    }
}

impl From<Error> for DefineError {
    fn from(err: Error) -> DefineError {
        DefineError::Build(err)
    }
}

impl From<LoaderError> for DefineError {
    fn from(err: LoaderError) -> DefineError {
        DefineError::Loader(err)
    }
}

/// Maximum number of names tried by [`NamePolicy::Unique`]
pub const MAX_UNIQUE_NAME_ATTEMPTS: usize = 1000;

/// Candidate name for an attempt at finding a unique name
///
/// The suffix starts out small and gets wider as collisions pile up: 8 bits on the first attempt,
/// 16 bits on the next four, then 32 bits.
pub fn unique_candidate(name: &BinaryName, attempt: usize) -> Result<BinaryName, LoaderError> {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_usize(attempt);
    let random = hasher.finish();
    let id = match attempt {
        0 => random & 0xff,
        1..=4 => random & 0xffff,
        _ => random & 0xffff_ffff,
    };
    BinaryName::from_string(format!("{}${}", name.as_str(), id)).map_err(|reason| {
        LoaderError::Rejected {
            name: name.clone(),
            reason,
        }
    })
}

/// Class defined by an [`InMemoryLoader`]
#[derive(Debug, Clone)]
pub struct LoadedClass {
    pub name: BinaryName,
    pub bytes: Arc<[u8]>,
}

/// Loader that keeps defined classes in memory
#[derive(Default)]
pub struct InMemoryLoader {
    state: Mutex<LoaderState>,
}

#[derive(Default)]
struct LoaderState {
    next_token: u64,
    reserved: HashMap<BinaryName, u64>,
    defined: HashMap<BinaryName, Arc<[u8]>>,
}

impl LoaderState {
    fn is_taken(&self, name: &BinaryName) -> bool {
        self.reserved.contains_key(name) || self.defined.contains_key(name)
    }

    fn reserve(&mut self, name: BinaryName) -> Reservation {
        self.next_token += 1;
        self.reserved.insert(name.clone(), self.next_token);
        Reservation::new(name, self.next_token)
    }
}

impl InMemoryLoader {
    pub fn new() -> InMemoryLoader {
        InMemoryLoader::default()
    }

    /// Look up a class that was defined
    pub fn get(&self, name: &BinaryName) -> Option<LoadedClass> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.defined.get(name).map(|bytes| LoadedClass {
            name: name.clone(),
            bytes: bytes.clone(),
        })
    }

    /// Names of all defined classes
    pub fn defined_names(&self) -> Vec<BinaryName> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.defined.keys().cloned().collect()
    }

    /// Is the name currently reserved (but not yet defined)?
    pub fn is_reserved(&self, name: &BinaryName) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.reserved.contains_key(name)
    }
}

impl ClassLoaderService for InMemoryLoader {
    type Handle = LoadedClass;

    fn reserve(&self, name: &BinaryName, policy: NamePolicy) -> Result<Reservation, LoaderError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match policy {
            NamePolicy::Exact => {
                if state.is_taken(name) {
                    return Err(LoaderError::NameConflict(name.clone()));
                }
                Ok(state.reserve(name.clone()))
            }
            NamePolicy::Unique => {
                for attempt in 0..MAX_UNIQUE_NAME_ATTEMPTS {
                    let candidate = unique_candidate(name, attempt)?;
                    if !state.is_taken(&candidate) {
                        debug!(
                            "reserved '{}' after {} attempt(s)",
                            candidate.as_str(),
                            attempt + 1
                        );
                        return Ok(state.reserve(candidate));
                    }
                }
                Err(LoaderError::NameConflict(name.clone()))
            }
        }
    }

    fn define(
        &self,
        reservation: Reservation,
        bytes: Vec<u8>,
    ) -> Result<LoadedClass, LoaderError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let name = reservation.name;

        if state.reserved.get(&name) != Some(&reservation.token) {
            return Err(if state.defined.contains_key(&name) {
                LoaderError::DuplicateDefinition(name)
            } else {
                LoaderError::UnknownReservation(name)
            });
        }
        if !bytes.starts_with(&ClassFile::MAGIC) {
            return Err(LoaderError::Rejected {
                name,
                reason: String::from("missing class file magic"),
            });
        }

        state.reserved.remove(&name);
        let bytes: Arc<[u8]> = Arc::from(bytes);
        state.defined.insert(name.clone(), bytes.clone());
        info!("defined class '{}' ({} bytes)", name.as_str(), bytes.len());
        Ok(LoadedClass { name, bytes })
    }

    fn release(&self, reservation: Reservation) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.reserved.get(&reservation.name) == Some(&reservation.token) {
            state.reserved.remove(&reservation.name);
        }
    }
}
