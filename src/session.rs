//! Call session state and in-call signaling payloads
//!
//! This module provides the session lifecycle types shared between the
//! controller and the signaling capability, plus the DTMF INFO payload whose
//! wire format must be preserved exactly for interoperability.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::media::MediaHandle;
use crate::signaling::SignalingSession;

/// Lifecycle state of one call attempt
///
/// Mirrors the Signaling Agent's state-change notification values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Session exists but no handshake has been requested yet
    Initial,
    /// Waiting for the remote handshake (invite or accept in flight)
    Establishing,
    /// Session is connected and media may flow
    Established,
    /// Termination signaled, waiting for teardown
    Terminating,
    /// Session has ended; resources are reclaimed on entry to this state
    Terminated,
}

impl SessionState {
    /// Check if the session can carry in-call signaling and media
    pub fn is_established(&self) -> bool {
        matches!(self, SessionState::Established)
    }

    /// Check if the session has reached its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminated)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Initial => write!(f, "Initial"),
            SessionState::Establishing => write!(f, "Establishing"),
            SessionState::Established => write!(f, "Established"),
            SessionState::Terminating => write!(f, "Terminating"),
            SessionState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Direction of a call from this client's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    /// Received from the network
    Incoming,
    /// Initiated by this client
    Outgoing,
}

/// Content type of the DTMF INFO payload (must match exactly)
pub const DTMF_CONTENT_TYPE: &str = "application/dtmf-relay";

/// Content disposition of the DTMF INFO payload (must match exactly)
pub const DTMF_CONTENT_DISPOSITION: &str = "render";

/// Body of a mid-session INFO message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoBody {
    /// MIME content type
    pub content_type: String,
    /// Content disposition
    pub content_disposition: String,
    /// Raw payload
    pub content: String,
}

impl InfoBody {
    /// Build the in-band DTMF payload for a single digit
    ///
    /// The body is `Signal=<digit>\r\nDuration=1`; peers depend on these
    /// exact bytes.
    pub fn dtmf(digit: char) -> Self {
        Self {
            content_type: DTMF_CONTENT_TYPE.to_string(),
            content_disposition: DTMF_CONTENT_DISPOSITION.to_string(),
            content: format!("Signal={}\r\nDuration=1", digit),
        }
    }
}

/// Check a character against the DTMF alphabet (0-9, A-D, *, #)
pub fn is_dtmf_digit(ch: char) -> bool {
    matches!(ch, '0'..='9' | 'A'..='D' | 'a'..='d' | '*' | '#')
}

/// Context carried by the one active session
pub struct SessionContext {
    /// Remote party identity
    pub remote: String,
    /// Current lifecycle state
    pub state: SessionState,
    /// Handle into the Signaling Agent's session
    pub session: Arc<dyn SignalingSession>,
    /// Media handle, set only while the session is Established
    pub media: Option<MediaHandle>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("remote", &self.remote)
            .field("state", &self.state)
            .field("media", &self.media)
            .finish_non_exhaustive()
    }
}

/// The one active call, tagged by direction
///
/// The controller holds `Option<ActiveSession>`, so an incoming and an
/// outgoing session can never coexist.
#[derive(Debug)]
pub enum ActiveSession {
    /// Call received from the network
    Incoming(SessionContext),
    /// Call initiated by this client
    Outgoing(SessionContext),
}

impl ActiveSession {
    /// Direction tag of this session
    pub fn direction(&self) -> CallDirection {
        match self {
            ActiveSession::Incoming(_) => CallDirection::Incoming,
            ActiveSession::Outgoing(_) => CallDirection::Outgoing,
        }
    }

    /// Shared access to the session context
    pub fn context(&self) -> &SessionContext {
        match self {
            ActiveSession::Incoming(ctx) | ActiveSession::Outgoing(ctx) => ctx,
        }
    }

    /// Mutable access to the session context
    pub fn context_mut(&mut self) -> &mut SessionContext {
        match self {
            ActiveSession::Incoming(ctx) | ActiveSession::Outgoing(ctx) => ctx,
        }
    }
}
