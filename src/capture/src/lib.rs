pub mod frame;
pub mod gate;
pub mod metadata;
pub mod presentation;
pub mod reader;
pub mod session;
pub mod signal;
pub mod unix_socket;

pub use frame::{CapturedFrame, RawFrame};
pub use reader::{CaptureChannelReader, ReaderError};
pub use session::{CaptureSession, SessionError, SessionState, SessionStats, StatsSnapshot};
pub use signal::StopSignal;
pub use unix_socket::UnixSocketReader;
