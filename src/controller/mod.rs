//! Call session controller - the core state machine
//!
//! The controller owns the single active call (incoming or outgoing) and
//! every transition it can make. All user commands and all asynchronously
//! delivered signaling/media events funnel into one queue processed by a
//! single task ([`task`]), so each transition runs to completion before the
//! next input is looked at; no locks guard the session slot and re-entrancy
//! is impossible by construction.
//!
//! # Command flow
//!
//! ```text
//! CallController (handle)          ControllerTask (loop)
//!   accept_incoming()  ──┐
//!   initiate_outgoing() ─┼─ mpsc ─> one input at a time ──> transitions
//!   terminate()         ─┤            ▲
//!   send_digits()       ─┘            │
//!                                     │
//! SignalingManager invites ───────────┤
//! session state-change streams ───────┘  (forwarded, generation-tagged)
//! ```
//!
//! Per-operation failures (accept, reject, bye, DTMF, bind) never escape the
//! loop; they become status-projection updates. Only address validation is
//! reported synchronously, before anything is enqueued.

pub(crate) mod task;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{ClientError, ClientResult};
use crate::media::{AudioSink, MediaBinder};
use crate::relay::RelayCredentialIssuer;
use crate::session::{CallDirection, SessionState};
use crate::signaling::{InviteReceiver, SignalingAgent, SignalingSession};
use crate::status::StatusProjection;
use crate::uri::{parse_sip_uri, SipUri};

/// User commands accepted by the controller loop
pub(crate) enum Command {
    AcceptIncoming,
    InitiateOutgoing { target: SipUri },
    Terminate,
    SendDigits { digits: String },
    SetOutputLevel { level: f32 },
    MountSink { sink: Arc<dyn AudioSink> },
    Snapshot { reply: oneshot::Sender<ControllerSnapshot> },
    Shutdown { done: oneshot::Sender<()> },
}

/// Signaling and media events delivered into the controller loop
pub(crate) enum SessionEvent {
    InviteReceived { session: Arc<dyn SignalingSession> },
    StateChanged { generation: u64, state: SessionState },
    TrackAdded { generation: u64 },
}

/// One unit of work for the loop: a command or an event
pub(crate) enum ControllerInput {
    Command(Command),
    Event(SessionEvent),
}

/// Point-in-time view of the active session, for observers and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Direction of the active call
    pub direction: CallDirection,
    /// Remote party identity
    pub remote: String,
    /// Current lifecycle state
    pub state: SessionState,
    /// Whether a media handle is associated with the session
    pub media_bound: bool,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSnapshot {
    /// The active session, if any
    pub session: Option<SessionSnapshot>,
}

/// Handle to the call session controller
///
/// Cheap to clone; all methods enqueue work for the controller loop. The
/// loop processes inputs strictly in order, so a [`snapshot`] issued after a
/// command observes that command's effects.
///
/// [`snapshot`]: CallController::snapshot
#[derive(Clone)]
pub struct CallController {
    input: mpsc::UnboundedSender<ControllerInput>,
    status: watch::Receiver<StatusProjection>,
}

impl CallController {
    /// Spawn the controller loop
    ///
    /// `invites` is the channel the signaling agent delivers inbound
    /// sessions on; `relay` enables credential issuance for outbound calls
    /// when relay traversal is configured.
    pub fn spawn(
        agent: Arc<dyn SignalingAgent>,
        binder: MediaBinder,
        relay: Option<RelayCredentialIssuer>,
        mut invites: InviteReceiver,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        // Inbound invites are just another input for the loop
        let invite_tx = input_tx.clone();
        tokio::spawn(async move {
            while let Some(session) = invites.recv().await {
                if invite_tx
                    .send(ControllerInput::Event(SessionEvent::InviteReceived { session }))
                    .is_err()
                {
                    break;
                }
            }
        });

        let (task, status) = task::ControllerTask::new(agent, binder, relay, input_tx.clone());
        tokio::spawn(task.run(input_rx));

        Self { input: input_tx, status }
    }

    /// Observe the status projection
    pub fn status(&self) -> watch::Receiver<StatusProjection> {
        self.status.clone()
    }

    /// Answer the pending incoming call
    ///
    /// Legal only while an incoming session is awaiting an answer; anything
    /// else is reported to the status projection as an invalid operation and
    /// changes no state.
    pub fn accept_incoming(&self) -> ClientResult<()> {
        self.send(Command::AcceptIncoming)
    }

    /// Place an outgoing call to `target`
    ///
    /// The target URI is validated here, synchronously: a malformed address
    /// fails with [`ClientError::InvalidAddress`] before anything is created
    /// or sent.
    pub fn initiate_outgoing(&self, target: &str) -> ClientResult<()> {
        let target = parse_sip_uri(target)?;
        self.send(Command::InitiateOutgoing { target })
    }

    /// Hang up or reject the active call; a no-op when none exists
    pub fn terminate(&self) -> ClientResult<()> {
        self.send(Command::Terminate)
    }

    /// Send a DTMF digit sequence on the established call
    pub fn send_digits(&self, digits: &str) -> ClientResult<()> {
        self.send(Command::SendDigits { digits: digits.to_string() })
    }

    /// Set speaker output level (clamped to 0.0..=1.0)
    pub fn set_output_level(&self, level: f32) -> ClientResult<()> {
        self.send(Command::SetOutputLevel { level })
    }

    /// Mount the audio output sink, attaching any deferred media binding
    pub fn mount_sink(&self, sink: Arc<dyn AudioSink>) -> ClientResult<()> {
        self.send(Command::MountSink { sink })
    }

    /// Snapshot the controller state
    ///
    /// Also acts as an ordering barrier: every command sent on this handle
    /// before the snapshot has been fully processed when it resolves.
    pub async fn snapshot(&self) -> ClientResult<ControllerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await
            .map_err(|_| ClientError::internal_error("controller loop stopped"))
    }

    /// Stop the controller loop, terminating any active call first
    ///
    /// Resolves only after the loop has hung up whatever was active and
    /// exited, so callers can release the signaling transport afterwards
    /// without cutting off the final reject/bye.
    pub async fn shutdown(&self) {
        let (done, finished) = oneshot::channel();
        if self
            .input
            .send(ControllerInput::Command(Command::Shutdown { done }))
            .is_ok()
        {
            let _ = finished.await;
        }
    }

    fn send(&self, command: Command) -> ClientResult<()> {
        self.input
            .send(ControllerInput::Command(command))
            .map_err(|_| ClientError::internal_error("controller loop stopped"))
    }
}
