use std::fmt;

/// Result type for murmur-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the engine layer.
///
/// Inside an agent call all variants are absorbed into a placeholder
/// assessment; only log-level `Constraint` failures (and the store errors
/// backing them) terminate a turn.
#[derive(Debug)]
pub enum Error {
    /// A deadline expired waiting on an external call
    Timeout(String),

    /// Network, provider, or storage transport failed
    Transport(String),

    /// A received payload failed parsing beyond repair
    Contract(String),

    /// An internal invariant was violated (e.g. duplicate seq)
    Constraint(String),

    /// The turn was abandoned between stages
    Cancelled,

    /// Event log failure
    Store(murmur_store::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
            Error::Contract(msg) => write!(f, "Contract violation: {}", msg),
            Error::Constraint(msg) => write!(f, "Constraint violated: {}", msg),
            Error::Cancelled => write!(f, "Turn cancelled"),
            Error::Store(err) => write!(f, "Store error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<murmur_store::Error> for Error {
    fn from(err: murmur_store::Error) -> Self {
        match err {
            murmur_store::Error::Constraint(msg) => Error::Constraint(msg),
            other => Error::Store(other),
        }
    }
}

impl Error {
    /// Short stable tag for event payloads.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Error::Timeout(_) => "timeout",
            Error::Transport(_) => "transport",
            Error::Contract(_) => "contract",
            Error::Constraint(_) => "constraint",
            Error::Cancelled => "cancelled",
            Error::Store(_) => "storage",
        }
    }
}
