use crate::reader::ReaderError;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use ipcsniff_common::process::ProcessRole;

/// Largest payload a single envelope may carry.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// One frame as handed over by the capture channel reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Process the frame was observed in, if the producer knows it.
    pub pid: Option<u32>,
    /// Identifier of the IPC endpoint that carried the frame.
    pub channel: String,
    pub payload: Bytes,
}

impl RawFrame {
    pub fn new(pid: Option<u32>, channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            pid,
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Envelope used on the local capture socket:
    /// `u32 pid | u16 channel_len | channel | u32 payload_len | payload`,
    /// big endian, pid 0 meaning unknown.
    pub fn encode(&self) -> Result<Bytes, ReaderError> {
        let channel = self.channel.as_bytes();
        let channel_len = u16::try_from(channel.len()).map_err(|_| {
            ReaderError::Malformed(format!("channel name of {} bytes", channel.len()))
        })?;
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(ReaderError::Malformed(format!(
                "payload of {} bytes exceeds {MAX_PAYLOAD_LEN}",
                self.payload.len()
            )));
        }

        let mut buf = BytesMut::with_capacity(10 + channel.len() + self.payload.len());
        buf.put_u32(self.pid.unwrap_or(0));
        buf.put_u16(channel_len);
        buf.put_slice(channel);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }
}

/// A frame that passed the session filters, annotated with the sender's role.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub pid: Option<u32>,
    pub role: Option<ProcessRole>,
    pub channel: String,
    pub payload: Bytes,
    pub received_at: DateTime<Utc>,
}

impl CapturedFrame {
    pub fn from_raw(raw: RawFrame, role: Option<ProcessRole>) -> Self {
        Self {
            pid: raw.pid,
            role,
            channel: raw.channel,
            payload: raw.payload,
            received_at: Utc::now(),
        }
    }

    pub fn category(&self) -> Option<&'static str> {
        self.role.map(|role| role.as_str())
    }
}
