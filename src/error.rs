//! Error taxonomy shared by every TLV operation.

use std::fmt;

/// Coarse classification of a failure; stable across releases, safe to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required input was absent or out of its domain.
    InvalidArgument,
    OutOfMemory,
    /// Content of a node does not fit the shape the template expects.
    InvalidFormat,
    /// Unrecognised tag with the critical flag and nowhere to put it.
    UnknownCriticalTlv,
    /// A non-multiple field's tag was seen more than once at one level.
    DuplicateTlv,
    /// A configured depth, node-count or stream-size bound was exceeded.
    LimitExceeded,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::InvalidFormat => "invalid format",
            ErrorKind::UnknownCriticalTlv => "unknown critical TLV",
            ErrorKind::DuplicateTlv => "duplicate TLV",
            ErrorKind::LimitExceeded => "limit exceeded",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct KsiError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<std::io::Error>,
}

impl KsiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        KsiError { kind, message: message.into(), source: None }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFormat, message)
    }

    pub fn unknown_critical(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownCriticalTlv, message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateTlv, message)
    }

    pub fn limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LimitExceeded, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with a location (template name, tag path) while unwinding.
    pub(crate) fn at(mut self, location: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", location, self.message);
        self
    }
}

impl From<std::io::Error> for KsiError {
    fn from(e: std::io::Error) -> Self {
        // A short read means the stream ended inside a TLV.
        let kind = if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ErrorKind::InvalidFormat
        } else {
            ErrorKind::Io
        };
        KsiError { kind, message: e.to_string(), source: Some(e) }
    }
}

pub type Result<T> = std::result::Result<T, KsiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_prefixed() {
        let e = KsiError::duplicate("tag 0x05").at("Record");
        assert_eq!(e.kind(), ErrorKind::DuplicateTlv);
        assert_eq!(e.to_string(), "duplicate TLV: Record: tag 0x05");
    }

    #[test]
    fn truncated_read_is_invalid_format() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(KsiError::from(io).kind(), ErrorKind::InvalidFormat);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(KsiError::from(io).kind(), ErrorKind::Io);
    }
}
