use crate::frame::RawFrame;
use async_trait::async_trait;
use std::fmt;

/// Source of raw captured frames, bound to one named channel at a time.
///
/// The session owns the handle exclusively from `open` until `close`.
#[async_trait]
pub trait CaptureChannelReader: Send + Sync + 'static {
    type Handle: Send + 'static;

    /// Creates the channel under `channel_name` and waits for the first
    /// producer. Callers bound this with their own timeout.
    async fn open(&self, channel_name: &str) -> Result<Self::Handle, ReaderError>;

    /// Next frame, or `None` once the producer side has closed.
    async fn read_frame(&self, handle: &mut Self::Handle) -> Result<Option<RawFrame>, ReaderError>;

    async fn close(&self, handle: Self::Handle);
}

#[derive(Debug)]
pub enum ReaderError {
    /// Another live listener already owns the channel name.
    NameCollision(String),
    Unsupported(&'static str),
    Malformed(String),
    Io(std::io::Error),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::NameCollision(name) => {
                write!(f, "Channel name '{}' is already in use", name)
            }
            ReaderError::Unsupported(what) => write!(f, "Unsupported: {}", what),
            ReaderError::Malformed(msg) => write!(f, "Malformed frame: {}", msg),
            ReaderError::Io(e) => write!(f, "Channel I/O failed: {}", e),
        }
    }
}

impl std::error::Error for ReaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReaderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReaderError {
    fn from(err: std::io::Error) -> Self {
        ReaderError::Io(err)
    }
}
