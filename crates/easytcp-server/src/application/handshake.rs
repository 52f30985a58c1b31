//! Server-side handshake state machine and its peer-side counterpart.
//!
//! ```text
//! server                              peer
//!   |--- HANDSHAKE {} ----------------->|
//!   |<-- HANDSHAKE {} ------------------|
//!   |--- PHASE1 {server_version} ------>|
//!   |<-- PHASE1 {status, version} ------|
//!   |--- HANDSHAKE {}  (admitted) ----->|
//!   |    or BREAK {}   (rejected)       |
//! ```
//!
//! A PHASE1 reply is admitted only when `status` is `"okay"` (any case) and
//! `version` is one of the supported protocol versions.

use std::collections::HashSet;
use std::time::Duration;

use easytcp_core::protocol::{control, Fields};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::infrastructure::transport::{FramedTransport, TransportError};

/// Progress of one [`Handshake`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    AwaitingGreetingEcho,
    AwaitingVersionAck,
    Admitted,
    Failed,
}

impl HandshakeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeState::Admitted | HandshakeState::Failed)
    }
}

/// Why a handshake did not admit the peer.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("peer rejected with status {status:?} and version {version:?}")]
    Rejected {
        status: Option<String>,
        version: Option<String>,
    },

    /// Peer side only: the server answered PHASE1 with BREAK.
    #[error("server aborted the handshake")]
    Aborted,

    #[error("handshake did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("handshake already failed")]
    AlreadyFailed,
}

/// One server-side handshake run.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    version: String,
    supported: HashSet<String>,
}

impl Handshake {
    /// `version` is advertised in PHASE1; `supported` lists the versions a
    /// peer may answer with.
    pub fn new<I, S>(version: impl Into<String>, supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: HandshakeState::Start,
            version: version.into(),
            supported: supported.into_iter().map(Into::into).collect(),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Marks an unfinished handshake as failed, e.g. after its deadline passed.
    pub fn abandon(&mut self) {
        if !self.state.is_terminal() {
            self.state = HandshakeState::Failed;
        }
    }

    /// The admission rule applied to a PHASE1 reply.
    pub fn admits(&self, status: Option<&str>, version: Option<&str>) -> bool {
        let okay = status.is_some_and(|s| s.eq_ignore_ascii_case(control::STATUS_OKAY));
        let supported = version.is_some_and(|v| self.supported.contains(v));
        okay && supported
    }

    /// Drives the exchange to completion over `transport`.
    ///
    /// # Errors
    ///
    /// [`HandshakeError::Rejected`] when the PHASE1 reply fails the admission
    /// rule (BREAK has then been sent), [`HandshakeError::Transport`] on any
    /// transport failure or out-of-order frame.
    pub async fn run(&mut self, transport: &FramedTransport) -> Result<(), HandshakeError> {
        let result = self.drive(transport).await;
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }
        result
    }

    async fn drive(&mut self, transport: &FramedTransport) -> Result<(), HandshakeError> {
        loop {
            self.state = match self.state {
                HandshakeState::Start => {
                    transport.send(control::HANDSHAKE, Fields::new()).await?;
                    HandshakeState::AwaitingGreetingEcho
                }
                HandshakeState::AwaitingGreetingEcho => {
                    transport.expected(control::HANDSHAKE).await?;
                    let mut offer = Fields::new();
                    offer.insert(
                        control::FIELD_SERVER_VERSION.to_string(),
                        Value::from(self.version.as_str()),
                    );
                    transport.send(control::PHASE1, offer).await?;
                    HandshakeState::AwaitingVersionAck
                }
                HandshakeState::AwaitingVersionAck => {
                    let reply = transport.expected(control::PHASE1).await?;
                    let status = reply.get(control::FIELD_STATUS).and_then(Value::as_str);
                    let version = reply.get(control::FIELD_VERSION).and_then(Value::as_str);

                    if !self.admits(status, version) {
                        if let Err(e) = transport.send(control::BREAK, Fields::new()).await {
                            debug!("could not deliver BREAK: {e}");
                        }
                        return Err(HandshakeError::Rejected {
                            status: status.map(str::to_string),
                            version: version.map(str::to_string),
                        });
                    }

                    transport.send(control::HANDSHAKE, Fields::new()).await?;
                    HandshakeState::Admitted
                }
                HandshakeState::Admitted => return Ok(()),
                HandshakeState::Failed => return Err(HandshakeError::AlreadyFailed),
            };
        }
    }
}

/// Performs the peer side of the handshake, answering PHASE1 with
/// `status: "okay"` and `version`.
///
/// Returns the server's advertised version.
///
/// # Errors
///
/// [`HandshakeError::Aborted`] if the server replies BREAK,
/// [`HandshakeError::Transport`] on transport failure or an unexpected frame.
pub async fn client_handshake(
    transport: &FramedTransport,
    version: &str,
) -> Result<String, HandshakeError> {
    transport.expected(control::HANDSHAKE).await?;
    transport.send(control::HANDSHAKE, Fields::new()).await?;

    let offer = transport.expected(control::PHASE1).await?;
    let server_version = offer
        .get(control::FIELD_SERVER_VERSION)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut reply = Fields::new();
    reply.insert(control::FIELD_STATUS.to_string(), Value::from(control::STATUS_OKAY));
    reply.insert(control::FIELD_VERSION.to_string(), Value::from(version));
    transport.send(control::PHASE1, reply).await?;

    let verdict = transport.recv().await?;
    match verdict.method.as_str() {
        control::HANDSHAKE => Ok(server_version),
        control::BREAK => Err(HandshakeError::Aborted),
        _ => Err(TransportError::ProtocolViolation {
            expected: control::HANDSHAKE.to_string(),
            received: verdict.method,
        }
        .into()),
    }
}
