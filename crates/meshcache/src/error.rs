//! Error types for meshcache

use std::fmt;
use std::sync::Arc;

/// Boxed error returned by loaders
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for meshcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache operations
///
/// Cloneable so a single coalesced outcome can be handed to every waiter.
#[derive(Debug, Clone)]
pub enum Error {
    /// Lookup key was empty
    InvalidKey,

    /// Local loader failed; the loader's error is kept verbatim
    Loader(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// Remote peer could not serve the key
    PeerFetch(String),

    /// Peer picker registered twice on the same group
    DuplicateRegistration(String),

    /// The computation for a key panicked before producing a result
    Abandoned(String),
}

impl Error {
    /// Wrap a loader failure
    pub fn loader(err: BoxError) -> Self {
        Error::Loader(Arc::from(err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidKey => write!(f, "key is required"),
            Error::Loader(e) => write!(f, "loader error: {}", e),
            Error::PeerFetch(msg) => write!(f, "peer fetch error: {}", msg),
            Error::DuplicateRegistration(name) => {
                write!(f, "peer picker already registered for group {}", name)
            }
            Error::Abandoned(key) => write!(f, "load of key {:?} panicked", key),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Loader(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
