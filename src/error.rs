use thiserror::Error;

/// Failures of the HTTP wire engine.
///
/// Parse failures (`InvalidMethod`, `MalformedHeader`, `InvalidContentLength`) mean the client
/// sent something we cannot interpret and should be answered with a 4xx. `ConnectionClosed` and
/// `Io` mean the transport is gone and the session is broken.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection closed before the expected data arrived")]
    ConnectionClosed,

    #[error("invalid method '{0}'")]
    InvalidMethod(String),

    #[error("malformed header line '{0}'")]
    MalformedHeader(String),

    #[error("invalid content length '{0}'")]
    InvalidContentLength(String),

    #[error("session is already closed")]
    SessionClosed,

    #[error("session cannot {0} more than once")]
    SessionReused(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` iff the error was caused by a malformed request (as opposed to transport or
    /// session misuse).
    #[inline]
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::InvalidMethod(_) | Self::MalformedHeader(_) | Self::InvalidContentLength(_)
        )
    }

    #[inline]
    pub(crate) fn lossy(kind: fn(String) -> Self, bytes: &[u8]) -> Self {
        kind(String::from_utf8_lossy(bytes).into_owned())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
