//! Transport session
//!
//! Owns the stream of one connection, including:
//! - The single read loop handing each frame to a [`FrameHandler`]
//! - The keep-alive loop
//! - Serialized, deadline-bounded writes
//! - Close-once teardown and close notifications

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_native_tls::native_tls;

use super::{BoxedStream, Dialer, SessionConfig};
use crate::catalog::{payload_type, HeartbeatEvent};
use crate::protocol::{CodecError, Encoder, Envelope, FrameReader};

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Client identity unusable: {0}")]
    Identity(String),

    #[error("Connection timeout after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Write timeout after {0:?}")]
    WriteTimeout(Duration),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed: {0}")]
    ConnectionClosed(CloseReason),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Why a session closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by a local caller
    Requested(String),
    /// The stream failed or ended
    Transport(String),
    /// A frame handler reported a programming error
    Internal(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested(reason) => write!(f, "{}", reason),
            CloseReason::Transport(reason) => write!(f, "transport failure: {}", reason),
            CloseReason::Internal(reason) => write!(f, "internal error: {}", reason),
        }
    }
}

/// Failure handling one inbound frame
#[derive(Error, Debug)]
pub enum FrameError {
    /// The frame is dropped; the session stays up
    #[error("{0}")]
    Dropped(String),

    /// The session must close
    #[error("{0}")]
    Internal(String),
}

/// Consumer of the frames read by a session
///
/// `on_frame` runs on the read loop and must not wait on downstream
/// consumers; the next frame is not read until it returns.
pub trait FrameHandler: Send + Sync {
    fn on_frame(&self, frame: Bytes) -> Result<(), FrameError>;

    /// Called once, after the read loop has stopped
    fn on_closed(&self, reason: &CloseReason);
}

/// Receives the close reason of a session exactly once
#[derive(Debug)]
pub struct ClosedListener {
    rx: watch::Receiver<Option<CloseReason>>,
    delivered: bool,
}

impl ClosedListener {
    /// Wait for the session to close
    ///
    /// Returns the reason the first time, `None` afterwards or if the session
    /// was dropped without closing.
    pub async fn recv(&mut self) -> Option<CloseReason> {
        if self.delivered {
            return None;
        }

        loop {
            let current = self.rx.borrow_and_update().clone();
            if let Some(reason) = current {
                self.delivered = true;
                return Some(reason);
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }
}

/// Session statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl Counters {
    fn sent(&self, bytes: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    fn received(&self, bytes: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    config: SessionConfig,
    dialer: Arc<dyn Dialer>,
    handler: Weak<dyn FrameHandler>,
    encoder: Encoder,
    connected: AtomicBool,
    connect_lock: Mutex<()>,
    writer: Mutex<Option<WriteHalf<BoxedStream>>>,
    closed_tx: watch::Sender<Option<CloseReason>>,
    counters: Counters,
}

/// A handle to one transport session
///
/// Cheap to clone; every clone drives the same stream.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(config: SessionConfig, dialer: Arc<dyn Dialer>, handler: Weak<dyn FrameHandler>) -> Self {
        let (closed_tx, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                encoder: Encoder::new(config.max_frame_size),
                config,
                dialer,
                handler,
                connected: AtomicBool::new(false),
                connect_lock: Mutex::new(()),
                writer: Mutex::new(None),
                closed_tx,
                counters: Counters::default(),
            }),
        }
    }

    /// Establish the stream and start the read and keep-alive loops
    ///
    /// Returns immediately if already connected. A closed session stays
    /// closed; reconnecting takes a new session.
    pub async fn connect(&self) -> SessionResult<()> {
        let _guard = self.inner.connect_lock.lock().await;

        if self.is_connected() {
            return Ok(());
        }
        if let Some(reason) = self.close_reason() {
            return Err(SessionError::ConnectionClosed(reason));
        }

        let limit = self.inner.config.connect_timeout();
        let stream = tokio::time::timeout(limit, self.inner.dialer.dial(&self.inner.config))
            .await
            .map_err(|_| SessionError::ConnectTimeout(limit))??;

        self.start(stream).await;
        tracing::info!("Session connected to {}", self.inner.config.address());
        Ok(())
    }

    async fn start(&self, stream: BoxedStream) {
        let (reader, writer) = tokio::io::split(stream);
        *self.inner.writer.lock().await = Some(writer);
        self.inner.connected.store(true, Ordering::SeqCst);

        let frames = FrameReader::new(reader, self.inner.config.max_frame_size);
        tokio::spawn(read_loop(self.clone(), frames));
        tokio::spawn(keep_alive(
            Arc::downgrade(&self.inner),
            self.inner.config.heartbeat_interval(),
            self.on_closed(),
        ));
    }

    /// Serialize a payload into an envelope and write it as one frame
    pub async fn send<M: prost::Message>(
        &self,
        payload_type: u32,
        payload: &M,
        request_id: Option<String>,
    ) -> SessionResult<()> {
        self.send_envelope(&Envelope::wrap(payload_type, payload, request_id))
            .await
    }

    /// Write one envelope as one frame
    ///
    /// Concurrent callers are serialized so frames never interleave.
    pub async fn send_envelope(&self, envelope: &Envelope) -> SessionResult<()> {
        let mut buf = BytesMut::new();
        self.inner.encoder.encode(envelope, &mut buf)?;

        let deadline = self.inner.config.write_timeout();
        let mut writer = self.inner.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            return Err(self.not_connected());
        };

        let write = async {
            stream.write_all(&buf).await?;
            stream.flush().await?;
            Ok::<(), std::io::Error>(())
        };
        let result = tokio::time::timeout(deadline, write).await;
        // close() takes the writer lock
        drop(writer);

        match result {
            Ok(Ok(())) => {
                self.inner.counters.sent(buf.len() as u64);
                tracing::trace!(
                    "Sent {} ({} bytes)",
                    payload_type::name(envelope.payload_type),
                    buf.len()
                );
                Ok(())
            }
            Ok(Err(e)) => {
                // A partial frame may be on the wire; the stream cannot be reused
                self.close(CloseReason::Transport(format!("write failed: {}", e)))
                    .await;
                Err(SessionError::Io(e))
            }
            Err(_) => {
                self.close(CloseReason::Transport(format!(
                    "write timed out after {:?}",
                    deadline
                )))
                .await;
                Err(SessionError::WriteTimeout(deadline))
            }
        }
    }

    /// Close the session
    ///
    /// Only the first call has an effect; it returns `true`.
    pub async fn close(&self, reason: CloseReason) -> bool {
        if self
            .inner
            .connected
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        tracing::info!(
            "Closing session to {}: {}",
            self.inner.config.address(),
            reason
        );

        let writer = self.inner.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match tokio::time::timeout(self.inner.config.write_timeout(), writer.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!("Shutdown error: {}", e),
                Err(_) => tracing::debug!("Shutdown timed out"),
            }
        }

        self.inner.closed_tx.send_replace(Some(reason));
        true
    }

    /// Listen for the close of this session
    pub fn on_closed(&self) -> ClosedListener {
        ClosedListener {
            rx: self.inner.closed_tx.subscribe(),
            delivered: false,
        }
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.closed_tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.counters.snapshot()
    }

    fn not_connected(&self) -> SessionError {
        match self.close_reason() {
            Some(reason) => SessionError::ConnectionClosed(reason),
            None => SessionError::NotConnected,
        }
    }
}

async fn read_loop(session: Session, mut frames: FrameReader<ReadHalf<BoxedStream>>) {
    let mut closed = session.on_closed();
    let mut consumed = 0;

    let failure = loop {
        let frame = tokio::select! {
            frame = frames.next_frame() => frame,
            _ = closed.recv() => break None,
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => break Some(CloseReason::Transport(e.to_string())),
        };
        session.inner.counters.received(frames.bytes_read() - consumed);
        consumed = frames.bytes_read();

        let Some(handler) = session.inner.handler.upgrade() else {
            break Some(CloseReason::Internal("frame handler dropped".to_string()));
        };
        match handler.on_frame(frame) {
            Ok(()) => {}
            Err(FrameError::Dropped(reason)) => {
                tracing::warn!("Dropped inbound frame: {}", reason);
            }
            Err(FrameError::Internal(reason)) => {
                tracing::error!("Frame handler failed: {}", reason);
                break Some(CloseReason::Internal(reason));
            }
        }
    };

    if let Some(reason) = failure {
        session.close(reason).await;
    }

    let reason = session.close_reason();
    if let (Some(handler), Some(reason)) = (session.inner.handler.upgrade(), reason) {
        handler.on_closed(&reason);
    }
    tracing::debug!("Read loop stopped");
}

async fn keep_alive(session: Weak<Inner>, period: Duration, mut closed: ClosedListener) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = closed.recv() => break,
        }

        let Some(inner) = session.upgrade() else {
            break;
        };
        let session = Session { inner };
        if !session.is_connected() {
            continue;
        }

        if let Err(e) = session
            .send(payload_type::HEARTBEAT_EVENT, &HeartbeatEvent {}, None)
            .await
        {
            tracing::debug!("Heartbeat not sent: {}", e);
        }
    }
}
