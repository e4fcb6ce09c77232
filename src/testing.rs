//! In-memory endpoint for session tests

use async_trait::async_trait;
use bytes::BytesMut;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

use crate::catalog::payload_type::HEARTBEAT_EVENT;
use crate::network::{BoxedStream, Dialer, SessionConfig, SessionError, SessionResult};
use crate::protocol::{Encoder, Envelope, FrameReader, MAX_FRAME_SIZE};

/// Hands out one end of a duplex pipe on the first dial
pub struct PipeDialer {
    stream: Mutex<Option<DuplexStream>>,
    dials: Arc<AtomicUsize>,
}

impl PipeDialer {
    pub fn dial_count(&self) -> Arc<AtomicUsize> {
        self.dials.clone()
    }
}

#[async_trait]
impl Dialer for PipeDialer {
    async fn dial(&self, _config: &SessionConfig) -> SessionResult<BoxedStream> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let stream = self.stream.lock().unwrap().take();
        match stream {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(SessionError::NotConnected),
        }
    }
}

/// The server end of a pipe
pub struct MockServer {
    frames: FrameReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    encoder: Encoder,
}

impl MockServer {
    /// Next envelope from the client, heartbeats included
    pub async fn recv(&mut self) -> Envelope {
        let frame = self.frames.next_frame().await.unwrap();
        Envelope::parse(frame).unwrap()
    }

    /// Next envelope from the client, `None` once the stream ends or breaks
    pub async fn try_recv(&mut self) -> Option<Envelope> {
        let frame = self.frames.next_frame().await.ok()?;
        Envelope::parse(frame).ok()
    }

    /// Next envelope from the client that is not a heartbeat
    pub async fn recv_request(&mut self) -> Envelope {
        loop {
            let envelope = self.recv().await;
            if envelope.payload_type != HEARTBEAT_EVENT {
                return envelope;
            }
        }
    }

    pub async fn push(&mut self, envelope: Envelope) {
        let mut buf = BytesMut::new();
        self.encoder.encode(&envelope, &mut buf).unwrap();
        self.writer.write_all(&buf).await.unwrap();
    }

    pub async fn reply<M: prost::Message>(
        &mut self,
        payload_type: u32,
        payload: &M,
        request_id: Option<String>,
    ) {
        self.push(Envelope::wrap(payload_type, payload, request_id))
            .await;
    }

    /// Write raw bytes, bypassing the framer
    pub async fn push_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Close the server end; the client sees end of stream
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

pub fn pipe() -> (PipeDialer, MockServer) {
    pipe_with_capacity(64 * 1024)
}

/// A pipe that buffers at most `capacity` bytes in each direction
pub fn pipe_with_capacity(capacity: usize) -> (PipeDialer, MockServer) {
    let (client, server) = tokio::io::duplex(capacity);
    let (reader, writer) = tokio::io::split(server);

    (
        PipeDialer {
            stream: Mutex::new(Some(client)),
            dials: Arc::new(AtomicUsize::new(0)),
        },
        MockServer {
            frames: FrameReader::new(reader, MAX_FRAME_SIZE),
            writer,
            encoder: Encoder::default(),
        },
    )
}
