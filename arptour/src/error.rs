//! Error types for the ARP and tour daemons
//!
//! All I/O and protocol paths return explicit `Result` values; process
//! termination is reserved for startup-time fatal conditions (interface
//! enumeration, raw socket creation).

use std::{fmt, io};

/// Main error type
#[derive(Debug)]
#[must_use = "errors must be handled, not silently discarded"]
pub enum NetError {
    /// Underlying socket or file I/O failure
    Io(io::Error),

    /// A received buffer was too short to hold the named structure
    Truncated {
        what: &'static str,
        len: usize,
    },

    /// A parsed field held a value the protocol does not allow
    InvalidField {
        field: &'static str,
    },

    /// An operation did not complete within its deadline
    Timeout {
        operation: &'static str,
        duration_ms: u64,
    },

    /// The peer closed the connection before the exchange completed
    Disconnected {
        operation: &'static str,
    },

    /// Name service could not resolve a hostname or address
    ResolveFailure {
        name: String,
    },

    /// No usable network interface was found at startup
    NoInterface {
        name: &'static str,
    },

    /// The simplified tour sequence contains only the source itself
    InvalidSequence,
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Truncated { what, len } => {
                write!(f, "{what} truncated ({len} bytes)")
            }
            Self::InvalidField { field } => write!(f, "invalid field: {field}"),
            Self::Timeout {
                operation,
                duration_ms,
            } => write!(f, "{operation} timed out after {duration_ms} ms"),
            Self::Disconnected { operation } => {
                write!(f, "{operation}: peer disconnected")
            }
            Self::ResolveFailure { name } => write!(f, "cannot resolve {name}"),
            Self::NoInterface { name } => {
                write!(f, "no usable interface {name}")
            }
            Self::InvalidSequence => {
                write!(f, "tour sequence points to the source alone")
            }
        }
    }
}

impl std::error::Error for NetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_truncated() {
        let e = NetError::Truncated {
            what: "arp_frame",
            len: 10,
        };
        assert_eq!(e.to_string(), "arp_frame truncated (10 bytes)");
    }

    #[test]
    fn test_io_source() {
        use std::error::Error;
        let e = NetError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(e.source().is_some());
    }
}
