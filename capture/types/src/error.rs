/*!
    Error types shared across the capture crates.
*/

use std::fmt;

/**
    Result alias used throughout the capture crate ecosystem.
*/
pub type Result<T> = std::result::Result<T, Error>;

/**
    Error type for capture operations.

    Two variants are control-flow signals rather than failures:

    - [`Error::WouldBlock`] is a transient "no data yet / no frame yet"
      condition. The caller should feed more input or retry later.
    - [`Error::EndOfStream`] is the terminal "no more data" condition.

    Callers must treat the two differently: retry for the former, stop for
    the latter. Everything else is a real failure.
*/
#[derive(Debug)]
pub enum Error {
    /// An I/O error from the underlying data source.
    Io(std::io::Error),
    /// A codec or container error, with a description.
    Codec(String),
    /// The requested operation is not supported by this source or backend.
    Unsupported(String),
    /// The input data is malformed.
    InvalidData(String),
    /// The pipeline is misconfigured (missing device, unavailable backend).
    Configuration(String),
    /// No data available yet; transient, retry after feeding more input.
    WouldBlock,
    /// True end of stream; terminal.
    EndOfStream,
}

impl Error {
    /**
        Create a codec error with a description.
    */
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /**
        Create an unsupported-operation error.
    */
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /**
        Create an invalid-data error.
    */
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /**
        Create a configuration error.

        Configuration errors are fatal to a session and are never retried.
    */
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /**
        Returns true for transient conditions that are part of normal
        control flow ("no data yet") rather than failures.
    */
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    /**
        Returns true for the terminal end-of-stream signal.
    */
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Codec(msg) => write!(f, "codec error: {}", msg),
            Self::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            Self::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            Self::Configuration(msg) => write!(f, "configuration error: {}", msg),
            Self::WouldBlock => write!(f, "no data available yet"),
            Self::EndOfStream => write!(f, "end of stream"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_vs_terminal() {
        assert!(Error::WouldBlock.is_transient());
        assert!(!Error::WouldBlock.is_end_of_stream());
        assert!(Error::EndOfStream.is_end_of_stream());
        assert!(!Error::EndOfStream.is_transient());
        assert!(!Error::codec("x").is_transient());
        assert!(!Error::codec("x").is_end_of_stream());
    }

    #[test]
    fn io_error_source_is_preserved() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
