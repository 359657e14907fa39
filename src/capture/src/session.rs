//! Capture session lifecycle: `Idle -> Preparing -> Capturing -> Stopped`.

use crate::frame::{CapturedFrame, RawFrame};
use crate::gate::{FrameGate, Verdict};
use crate::reader::{CaptureChannelReader, ReaderError};
use ipcsniff_common::constants::HANDSHAKE_TIMEOUT_MS;
use ipcsniff_common::target::{CaptureFilter, TargetDescriptor};
use ipcsniff_extracts::channels::ChannelEnumerator;
use ipcsniff_extracts::process::ProcessRegistry;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Preparing,
    Capturing,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Preparing => "preparing",
            SessionState::Capturing => "capturing",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `start` while a start is in flight or a capture is running.
    AlreadyStarted(SessionState),
    /// The session was stopped; build a new one to capture again.
    Finished,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadyStarted(state) => {
                write!(f, "Capture session already started (state: {})", state)
            }
            SessionError::Finished => write!(f, "Capture session has been stopped"),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Default)]
pub struct SessionStats {
    delivered: AtomicU64,
    dropped_pre_existing: AtomicU64,
    dropped_namespace: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub delivered: u64,
    pub dropped_pre_existing: u64,
    pub dropped_namespace: u64,
}

impl SessionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_pre_existing: self.dropped_pre_existing.load(Ordering::Relaxed),
            dropped_namespace: self.dropped_namespace.load(Ordering::Relaxed),
        }
    }

    fn record(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::Accept => &self.delivered,
            Verdict::PreExistingChannel => &self.dropped_pre_existing,
            Verdict::OutsideNamespace => &self.dropped_namespace,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct Lifecycle {
    state: SessionState,
    cancel: Option<CancellationToken>,
    // cancelled once `start` has settled the outcome of its handshake
    handshake_settled: Option<CancellationToken>,
    delivery: Option<JoinHandle<()>>,
}

enum Handshake<H> {
    Opened(H),
    Failed(ReaderError),
    TimedOut,
    Aborted,
}

/// Drives one capture against the target's channel.
///
/// Owns the reader handle for the whole capture. Frames that pass the
/// filter are pushed to `sink`; once [`CaptureSession::stop`] returns no
/// further frame is sent.
pub struct CaptureSession<R: CaptureChannelReader> {
    target: TargetDescriptor,
    filter: CaptureFilter,
    reader: Arc<R>,
    registry: Arc<ProcessRegistry>,
    channels: Arc<dyn ChannelEnumerator>,
    sink: mpsc::Sender<CapturedFrame>,
    handshake_timeout: Duration,
    lifecycle: Mutex<Lifecycle>,
    stats: Arc<SessionStats>,
    pre_existing: std::sync::Mutex<Arc<HashSet<String>>>,
    // cancelled once the reader handle is gone for good
    released: CancellationToken,
    // cancelled when delivery ends, whatever the reason
    delivery_ended: CancellationToken,
}

impl<R: CaptureChannelReader> CaptureSession<R> {
    pub fn new(
        target: TargetDescriptor,
        filter: CaptureFilter,
        reader: Arc<R>,
        registry: Arc<ProcessRegistry>,
        channels: Arc<dyn ChannelEnumerator>,
        sink: mpsc::Sender<CapturedFrame>,
    ) -> Self {
        Self {
            target,
            filter,
            reader,
            registry,
            channels,
            sink,
            handshake_timeout: Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Idle,
                cancel: None,
                handshake_settled: None,
                delivery: None,
            }),
            stats: Arc::new(SessionStats::default()),
            pre_existing: std::sync::Mutex::new(Arc::new(HashSet::new())),
            released: CancellationToken::new(),
            delivery_ended: CancellationToken::new(),
        }
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    pub async fn state(&self) -> SessionState {
        self.lifecycle.lock().await.state
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// Channels that were open in monitored processes when the session
    /// started preparing.
    pub fn pre_existing_channels(&self) -> Arc<HashSet<String>> {
        Arc::clone(
            &self
                .pre_existing
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    /// Resolves once frame delivery has ended, by `stop` or because the
    /// producer closed the channel.
    pub async fn delivery_ended(&self) {
        self.delivery_ended.cancelled().await
    }

    /// Enumerates pre-existing channels, then opens the capture channel.
    ///
    /// Returns `Ok(false)` when the handshake fails or times out (the session
    /// goes back to `Idle`) or when `stop` interrupts it.
    pub async fn start(&self) -> Result<bool, SessionError> {
        let (cancel, _settled) = {
            let mut lifecycle = self.lifecycle.lock().await;
            match lifecycle.state {
                SessionState::Idle => {}
                SessionState::Stopped => return Err(SessionError::Finished),
                state => return Err(SessionError::AlreadyStarted(state)),
            }
            lifecycle.state = SessionState::Preparing;
            let cancel = CancellationToken::new();
            lifecycle.cancel = Some(cancel.clone());
            let settled = CancellationToken::new();
            lifecycle.handshake_settled = Some(settled.clone());
            (cancel, settled.drop_guard())
        };

        info!("Enumerating existing {} channels", self.target.process_name_pattern());
        let pre_existing = self.enumerate_pre_existing().await;
        debug!("{} channels were open before the session", pre_existing.len());
        *self
            .pre_existing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Arc::new(pre_existing.clone());

        let channel_name = self.target.capture_channel_name();
        let handshake = tokio::select! {
            biased;
            _ = cancel.cancelled() => Handshake::Aborted,
            opened = tokio::time::timeout(self.handshake_timeout, self.reader.open(channel_name)) => {
                match opened {
                    Ok(Ok(handle)) => Handshake::Opened(handle),
                    Ok(Err(e)) => Handshake::Failed(e),
                    Err(_) => Handshake::TimedOut,
                }
            }
        };

        let mut lifecycle = self.lifecycle.lock().await;
        match handshake {
            Handshake::Opened(handle) if lifecycle.state == SessionState::Preparing => {
                let gate = FrameGate::new(self.filter.clone(), pre_existing);
                lifecycle.state = SessionState::Capturing;
                lifecycle.delivery = Some(tokio::spawn(deliver(
                    Arc::clone(&self.reader),
                    handle,
                    cancel,
                    Delivery {
                        gate,
                        registry: Arc::clone(&self.registry),
                        stats: Arc::clone(&self.stats),
                        sink: self.sink.clone(),
                        ended: self.delivery_ended.clone(),
                    },
                )));
                info!("Capturing on channel '{}'", channel_name);
                Ok(true)
            }
            Handshake::Opened(handle) => {
                // stopped while the handshake completed
                drop(lifecycle);
                self.reader.close(handle).await;
                debug!("handshake completed after stop, channel released");
                Ok(false)
            }
            Handshake::Aborted => {
                debug!("handshake aborted by stop");
                Ok(false)
            }
            Handshake::Failed(e) => {
                warn!("Could not open channel '{}': {}", channel_name, e);
                Self::back_to_idle(&mut lifecycle);
                Ok(false)
            }
            Handshake::TimedOut => {
                warn!(
                    "Channel '{}' handshake timed out after {:?}",
                    channel_name, self.handshake_timeout
                );
                Self::back_to_idle(&mut lifecycle);
                Ok(false)
            }
        }
    }

    fn back_to_idle(lifecycle: &mut Lifecycle) {
        if lifecycle.state == SessionState::Preparing {
            lifecycle.state = SessionState::Idle;
            lifecycle.cancel = None;
        }
    }

    async fn enumerate_pre_existing(&self) -> HashSet<String> {
        let pids = self.registry.refresh().await.running_pids();
        let channels = Arc::clone(&self.channels);
        tokio::task::spawn_blocking(move || channels.open_channels(&pids))
            .await
            .unwrap_or_else(|e| {
                warn!("channel enumeration task failed: {}", e);
                HashSet::new()
            })
    }

    /// Stops the session from any state. Safe to call repeatedly and from
    /// several tasks; every caller returns only after the channel handle has
    /// been released, including a handle whose handshake completed while
    /// the stop was in progress.
    pub async fn stop(&self) {
        let (cancel, settled, delivery) = {
            let mut lifecycle = self.lifecycle.lock().await;
            if lifecycle.state == SessionState::Stopped {
                drop(lifecycle);
                self.released.cancelled().await;
                return;
            }
            debug!("stopping capture session from {}", lifecycle.state);
            lifecycle.state = SessionState::Stopped;
            (
                lifecycle.cancel.take(),
                lifecycle.handshake_settled.take(),
                lifecycle.delivery.take(),
            )
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        // a handshake that won the race is closed by `start` itself
        if let Some(settled) = settled {
            settled.cancelled().await;
        }
        if let Some(delivery) = delivery {
            if let Err(e) = delivery.await {
                warn!("frame delivery task failed: {}", e);
            }
        }
        self.delivery_ended.cancel();
        self.released.cancel();
        info!("Capture session stopped");
    }
}

struct Delivery {
    gate: FrameGate,
    registry: Arc<ProcessRegistry>,
    stats: Arc<SessionStats>,
    sink: mpsc::Sender<CapturedFrame>,
    ended: CancellationToken,
}

impl Delivery {
    fn admit(&self, raw: RawFrame) -> Option<CapturedFrame> {
        let role = raw.pid.map(|pid| self.registry.classify(pid));
        let verdict = self.gate.check(&raw, role);
        self.stats.record(verdict);
        match verdict {
            Verdict::Accept => Some(CapturedFrame::from_raw(raw, role)),
            rejected => {
                debug!("dropping frame on {}: {:?}", raw.channel, rejected);
                None
            }
        }
    }
}

async fn deliver<R: CaptureChannelReader>(
    reader: Arc<R>,
    mut handle: R::Handle,
    cancel: CancellationToken,
    delivery: Delivery,
) {
    loop {
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            raw = reader.read_frame(&mut handle) => raw,
        };

        let frame = match raw {
            Ok(Some(raw)) => delivery.admit(raw),
            Ok(None) => {
                info!("Capture channel closed by producer");
                break;
            }
            Err(e) => {
                warn!("Reading from capture channel failed: {}", e);
                break;
            }
        };

        if let Some(frame) = frame {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = delivery.sink.send(frame) => {
                    if sent.is_err() {
                        debug!("frame consumer went away");
                        break;
                    }
                }
            }
        }
    }

    reader.close(handle).await;
    delivery.ended.cancel();
}
