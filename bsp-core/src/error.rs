//! Typed errors for every call-site-detectable misuse named in the error handling design.
//!
//! Programmer errors (asymmetric collective calls, unregistered ids, bogus processor ids) and
//! bounds misuse are rejected here rather than silently scheduled. The fallible `try_*` entry
//! points on [`crate::World`] return [`WorldError`] directly; the ergonomic, infallible surface
//! (`put`, `get`, `send`, indexing) unwraps these and panics with the error's `Display` text,
//! consistent with treating these as fatal, fail-fast conditions rather than recoverable ones.

use std::fmt;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum WorldError {
    /// A send, put, or get addressed a processor outside `[0, active_processors())`.
    NoSuchProcessor { processor: usize, active: usize },
    /// A registration id was used after `unregister` or was never issued.
    UnknownRegistration { kind: &'static str, id: usize },
    /// Two or more processors registered variables or queues in a different order or with
    /// different types, detected by the reference backend via a per-registration type-name and
    /// ordinal check exchanged at the next barrier.
    CollectiveMismatch {
        kind: &'static str,
        ordinal: usize,
        expected: &'static str,
        found: &'static str,
    },
    /// A coarray slice or element index fell outside the local array's bounds.
    OutOfRange { index: usize, len: usize },
    /// A put carried a different element count than the target range expects.
    SizeMismatch { expected: usize, found: usize },
    /// Buffer sizing during a barrier could not allocate the space it computed as required.
    AllocationFailed(usize),
    /// An unrecoverable, backend-specific transport failure.
    Transport(String),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::NoSuchProcessor { processor, active } => write!(
                f,
                "processor {} is out of range for a world of {} processors",
                processor, active
            ),
            WorldError::UnknownRegistration { kind, id } => {
                write!(f, "{} id {} is not registered in this world", kind, id)
            }
            WorldError::CollectiveMismatch {
                kind,
                ordinal,
                expected,
                found,
            } => write!(
                f,
                "collective mismatch registering {} #{}: expected {}, found {} on another processor",
                kind, ordinal, expected, found
            ),
            WorldError::OutOfRange { index, len } => {
                write!(f, "index {} is out of range for a length of {}", index, len)
            }
            WorldError::SizeMismatch { expected, found } => write!(
                f,
                "expected {} elements but found {}",
                expected, found
            ),
            WorldError::AllocationFailed(bytes) => {
                write!(f, "failed to allocate {} bytes for barrier exchange buffers", bytes)
            }
            WorldError::Transport(msg) => write!(f, "transport failure: {}", msg),
        }
    }
}

impl std::error::Error for WorldError {}

pub type Result<T> = std::result::Result<T, WorldError>;
