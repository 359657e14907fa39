//! Default capture channel: a local stream socket in the sniffer work dir.
//!
//! Producers connect to `<work dir>/<channel>.sock` and write frames using
//! the envelope described on [`RawFrame::encode`].

use crate::frame::RawFrame;
use crate::reader::{CaptureChannelReader, ReaderError};
use async_trait::async_trait;
use ipcsniff_common::workdir::SnifferWorkDir;
use std::path::PathBuf;

pub struct UnixSocketReader {
    work_dir: SnifferWorkDir,
}

impl UnixSocketReader {
    pub fn new(work_dir: SnifferWorkDir) -> Self {
        Self { work_dir }
    }

    pub fn socket_path(&self, channel_name: &str) -> PathBuf {
        self.work_dir.channel_socket(channel_name)
    }
}

pub use platform::UnixSocketHandle;

#[cfg(unix)]
mod platform {
    use super::*;
    use crate::frame::MAX_PAYLOAD_LEN;
    use bytes::Bytes;
    use std::path::Path;
    use tokio::io::{AsyncReadExt, BufReader};
    use tokio::net::{UnixListener, UnixStream};
    use tracing::{debug, info, warn};

    /// Removes the socket file when the channel goes away, including when an
    /// `open` future is dropped mid-handshake.
    struct SocketFile(PathBuf);

    impl Drop for SocketFile {
        fn drop(&mut self) {
            if let Err(e) = std::fs::remove_file(&self.0) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove socket {}: {}", self.0.display(), e);
                }
            }
        }
    }

    pub struct UnixSocketHandle {
        stream: BufReader<UnixStream>,
        // keeps the channel name claimed until close
        _listener: UnixListener,
        _file: SocketFile,
    }

    async fn claim_path(path: &Path, channel_name: &str) -> Result<(), ReaderError> {
        if !path.exists() {
            return Ok(());
        }
        if UnixStream::connect(path).await.is_ok() {
            return Err(ReaderError::NameCollision(channel_name.to_string()));
        }
        debug!("removing stale socket {}", path.display());
        std::fs::remove_file(path)?;
        Ok(())
    }

    async fn read_envelope(stream: &mut BufReader<UnixStream>) -> Result<Option<RawFrame>, ReaderError> {
        let pid = match stream.read_u32().await {
            Ok(pid) => pid,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let channel_len = stream.read_u16().await? as usize;
        let mut channel = vec![0u8; channel_len];
        stream.read_exact(&mut channel).await?;
        let channel = String::from_utf8(channel)
            .map_err(|_| ReaderError::Malformed("channel name is not UTF-8".to_string()))?;

        let payload_len = stream.read_u32().await? as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(ReaderError::Malformed(format!(
                "payload of {payload_len} bytes exceeds {MAX_PAYLOAD_LEN}"
            )));
        }
        let mut payload = vec![0u8; payload_len];
        stream.read_exact(&mut payload).await?;

        let pid = (pid != 0).then_some(pid);
        Ok(Some(RawFrame::new(pid, channel, Bytes::from(payload))))
    }

    #[async_trait]
    impl CaptureChannelReader for UnixSocketReader {
        type Handle = UnixSocketHandle;

        #[tracing::instrument(skip(self))]
        async fn open(&self, channel_name: &str) -> Result<UnixSocketHandle, ReaderError> {
            self.work_dir
                .init()
                .map_err(|e| ReaderError::Io(std::io::Error::other(e.to_string())))?;

            let path = self.socket_path(channel_name);
            claim_path(&path, channel_name).await?;

            let listener = UnixListener::bind(&path)?;
            let file = SocketFile(path);
            info!("Waiting for a producer on {}", file.0.display());

            let (stream, _) = listener.accept().await?;
            debug!("producer connected on {}", channel_name);

            Ok(UnixSocketHandle {
                stream: BufReader::new(stream),
                _listener: listener,
                _file: file,
            })
        }

        async fn read_frame(
            &self,
            handle: &mut UnixSocketHandle,
        ) -> Result<Option<RawFrame>, ReaderError> {
            read_envelope(&mut handle.stream).await
        }

        async fn close(&self, handle: UnixSocketHandle) {
            drop(handle);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use super::*;

    /// Never constructed on this platform.
    pub enum UnixSocketHandle {}

    #[async_trait]
    impl CaptureChannelReader for UnixSocketReader {
        type Handle = UnixSocketHandle;

        async fn open(&self, _channel_name: &str) -> Result<UnixSocketHandle, ReaderError> {
            Err(ReaderError::Unsupported(
                "local socket capture channels need a Unix platform",
            ))
        }

        async fn read_frame(
            &self,
            handle: &mut UnixSocketHandle,
        ) -> Result<Option<RawFrame>, ReaderError> {
            match *handle {}
        }

        async fn close(&self, handle: UnixSocketHandle) {
            match handle {}
        }
    }
}
