//! Framed transport: whole [`Frame`]s over any byte stream.
//!
//! The transport owns the two halves of one connection. Writers are
//! serialised by an async mutex so frames never interleave mid-message;
//! the reader yields frames in arrival order.
//!
//! `close()` flips a watch flag. Any `recv`/`send` blocked on the stream
//! observes the flag and fails with [`TransportError::ConnectionClosed`], as
//! does every later call.

use std::io;

use easytcp_core::protocol::{decode_header, decode_payload, encode_frame, SequenceCounter};
use easytcp_core::protocol::{Fields, Frame, ProtocolError, HEADER_SIZE};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex};
use tracing::{debug, trace};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Errors surfaced by [`FramedTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer sent bytes that are not a valid frame.
    #[error("framing error: {0}")]
    Framing(#[from] ProtocolError),

    /// The peer disconnected or the transport was closed locally.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame arrived with a different method than the one required.
    #[error("protocol violation: expected {expected}, received {received}")]
    ProtocolViolation { expected: String, received: String },

    /// Any other I/O failure on the underlying stream.
    #[error("connection I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => TransportError::ConnectionClosed,
            _ => TransportError::Io(e),
        }
    }
}

/// A connection that sends and receives whole frames.
pub struct FramedTransport {
    reader: Mutex<Option<BoxedReader>>,
    writer: Mutex<Option<BoxedWriter>>,
    closed: watch::Sender<bool>,
    seq: SequenceCounter,
}

impl FramedTransport {
    /// Wraps a bidirectional stream (a `TcpStream`, a `tokio::io::duplex`
    /// end, a test mock, ...).
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self::from_halves(read_half, write_half)
    }

    /// Builds a transport from independently owned read and write halves.
    pub fn from_halves<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (closed, _) = watch::channel(false);
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
            writer: Mutex::new(Some(Box::new(writer))),
            closed,
            seq: SequenceCounter::new(),
        }
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Sends one frame built from `method` and `fields`.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectionClosed`] if the transport is closed or the
    /// peer went away; [`TransportError::Framing`] if the frame cannot be
    /// encoded.
    pub async fn send(&self, method: &str, fields: Fields) -> Result<(), TransportError> {
        self.send_frame(&Frame::with_fields(method, fields)).await
    }

    /// Sends one already-built frame.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_frame(&self, frame: &Frame) -> Result<(), TransportError> {
        let mut closed_rx = self.closed.subscribe();
        if *closed_rx.borrow_and_update() {
            return Err(TransportError::ConnectionClosed);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;
        let bytes = encode_frame(frame, self.seq.next())?;

        tokio::select! {
            written = write_bytes(writer, &bytes) => {
                trace!(method = %frame.method, len = bytes.len(), "frame sent");
                written
            }
            _ = closed_rx.wait_for(|closed| *closed) => Err(TransportError::ConnectionClosed),
        }
    }

    /// Waits for the next complete frame.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectionClosed`] on EOF, reset or local close;
    /// [`TransportError::Framing`] on malformed input.
    pub async fn recv(&self) -> Result<Frame, TransportError> {
        let mut closed_rx = self.closed.subscribe();
        if *closed_rx.borrow_and_update() {
            return Err(TransportError::ConnectionClosed);
        }

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;

        let result = tokio::select! {
            frame = read_frame(reader) => frame,
            _ = closed_rx.wait_for(|closed| *closed) => Err(TransportError::ConnectionClosed),
        };
        if self.is_closed() {
            guard.take();
        }
        result
    }

    /// Receives one frame and requires its method to be `method`.
    ///
    /// Returns the frame's fields on success.
    ///
    /// # Errors
    ///
    /// [`TransportError::ProtocolViolation`] if another method arrives, plus
    /// every error of [`recv`](Self::recv).
    pub async fn expected(&self, method: &str) -> Result<Fields, TransportError> {
        let frame = self.recv().await?;
        if frame.method != method {
            return Err(TransportError::ProtocolViolation {
                expected: method.to_string(),
                received: frame.method,
            });
        }
        Ok(frame.fields)
    }

    /// Releases the stream. Idempotent.
    ///
    /// Blocked and future `recv`/`send` calls fail with
    /// [`TransportError::ConnectionClosed`].
    pub async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("shutdown of closed transport failed: {e}");
            }
        }
        // A reader blocked in `recv` drops its half itself once it sees the flag.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
    }
}

async fn write_bytes(writer: &mut BoxedWriter, bytes: &[u8]) -> Result<(), TransportError> {
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_frame(reader: &mut BoxedReader) -> Result<Frame, TransportError> {
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;
    let header = decode_header(&header_buf)?;

    let mut payload = vec![0u8; header.payload_len];
    if header.payload_len > 0 {
        reader.read_exact(&mut payload).await?;
    }

    let frame = decode_payload(&payload)?;
    trace!(method = %frame.method, seq = header.seq, "frame received");
    Ok(frame)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
