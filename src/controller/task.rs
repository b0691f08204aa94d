//! Controller processing loop and transition logic
//!
//! One task owns the session slot, the media binder, and the relay issuer.
//! Inputs arrive pre-merged on a single queue, so every transition here runs
//! without interleaving. Session state-change streams are forwarded into the
//! queue by small per-session tasks tagged with a generation counter; after
//! the slot is reclaimed, events from the old session no longer match the
//! counter and are dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::media::MediaBinder;
use crate::relay::RelayCredentialIssuer;
use crate::session::{is_dtmf_digit, ActiveSession, InfoBody, SessionContext, SessionState};
use crate::signaling::{SignalingAgent, SignalingSession};
use crate::status::{StatusProjection, StatusPublisher};
use crate::uri::SipUri;

use super::{Command, ControllerInput, ControllerSnapshot, SessionEvent, SessionSnapshot};

pub(crate) struct ControllerTask {
    agent: Arc<dyn SignalingAgent>,
    binder: MediaBinder,
    relay: Option<RelayCredentialIssuer>,
    active: Option<ActiveSession>,
    /// Bumped on install and reclaim; stale forwarder events fail the match
    generation: u64,
    status: StatusPublisher,
    input_tx: mpsc::UnboundedSender<ControllerInput>,
    /// Acked after the final hangup so shutdown callers can sequence the
    /// transport teardown behind it
    shutdown_ack: Option<oneshot::Sender<()>>,
}

impl ControllerTask {
    pub(crate) fn new(
        agent: Arc<dyn SignalingAgent>,
        binder: MediaBinder,
        relay: Option<RelayCredentialIssuer>,
        input_tx: mpsc::UnboundedSender<ControllerInput>,
    ) -> (Self, watch::Receiver<StatusProjection>) {
        let (status, status_rx) = StatusPublisher::new();
        let task = Self {
            agent,
            binder,
            relay,
            active: None,
            generation: 0,
            status,
            input_tx,
            shutdown_ack: None,
        };
        (task, status_rx)
    }

    pub(crate) async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<ControllerInput>) {
        while let Some(input) = inputs.recv().await {
            let keep_going = match input {
                ControllerInput::Command(command) => self.handle_command(command).await,
                ControllerInput::Event(event) => {
                    self.handle_event(event).await;
                    true
                }
            };
            if !keep_going {
                break;
            }
        }
        // Hang up whatever is still active so the remote side is not left
        // with a dangling session
        if self.active.is_some() {
            self.terminate_active().await;
        }
        if let Some(done) = self.shutdown_ack.take() {
            let _ = done.send(());
        }
        tracing::debug!("Controller loop stopped");
    }

    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::AcceptIncoming => self.accept_incoming().await,
            Command::InitiateOutgoing { target } => self.initiate_outgoing(target).await,
            Command::Terminate => self.terminate().await,
            Command::SendDigits { digits } => self.send_digits(&digits).await,
            Command::SetOutputLevel { level } => self.binder.set_output_level(level),
            Command::MountSink { sink } => self.binder.mount_sink(sink),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { done } => {
                self.shutdown_ack = Some(done);
                return false;
            }
        }
        true
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::InviteReceived { session } => self.invite_received(session).await,
            SessionEvent::StateChanged { generation, state } => {
                if generation == self.generation {
                    self.state_changed(state).await;
                } else {
                    tracing::debug!(%state, "Dropping state change from reclaimed session");
                }
            }
            SessionEvent::TrackAdded { generation } => {
                if generation == self.generation {
                    self.track_added();
                }
            }
        }
    }

    async fn accept_incoming(&mut self) {
        self.status.action("answer call");
        let session = match &self.active {
            Some(ActiveSession::Incoming(ctx)) if ctx.state == SessionState::Initial => {
                ctx.session.clone()
            }
            Some(_) => {
                self.status.action("cannot answer: call already answered");
                return;
            }
            None => {
                self.status.action("cannot answer: no incoming call");
                return;
            }
        };

        match session.accept().await {
            Ok(()) => {
                if let Some(active) = self.active.as_mut() {
                    active.context_mut().state = SessionState::Establishing;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                self.status.call(format!("failed to answer call: {}", e));
            }
        }
    }

    async fn initiate_outgoing(&mut self, target: SipUri) {
        self.status.action("make outgoing call");
        if self.active.is_some() {
            self.status.action("cannot call: a call is already in progress");
            return;
        }

        let relay = match self.relay.as_mut() {
            Some(issuer) => match issuer.credential(chrono::Utc::now()) {
                Ok(credential) => Some(credential),
                Err(e) => {
                    tracing::error!(error = %e, "Relay credential issuance failed");
                    self.status.call(format!("failed to initiate call: {}", e));
                    return;
                }
            },
            None => None,
        };

        match self.agent.invite(&target, relay).await {
            Ok(session) => {
                let remote = session.remote_identity();
                self.install(ActiveSession::Outgoing(SessionContext {
                    remote: remote.clone(),
                    state: SessionState::Establishing,
                    session,
                    media: None,
                }));
                self.status.call(format!("outgoing call to {}", remote));
                tracing::info!(%remote, "Outgoing call initiated");
            }
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "Invite failed");
                self.status.call(format!("failed to initiate call: {}", e));
            }
        }
    }

    async fn terminate(&mut self) {
        self.status.action("hangup or reject call");
        if self.active.is_none() {
            self.status.action("no active call");
            return;
        }
        self.terminate_active().await;
        self.status.call("call ended");
    }

    /// Signal termination for the active session and reclaim the slot
    async fn terminate_active(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.context_mut().state = SessionState::Terminating;

        // Incoming sessions get both signals: reject answers the pending
        // invite, bye covers a dialog that already progressed. The remote
        // stack honors whichever applies and ignores the other.
        match &active {
            ActiveSession::Incoming(ctx) => {
                if let Err(e) = ctx.session.reject().await {
                    tracing::debug!(error = %e, "Reject failed");
                }
                if let Err(e) = ctx.session.bye().await {
                    tracing::debug!(error = %e, "Bye failed");
                }
            }
            ActiveSession::Outgoing(ctx) => {
                if let Err(e) = ctx.session.bye().await {
                    tracing::debug!(error = %e, "Bye failed");
                }
            }
        }

        self.reclaim(active);
    }

    async fn send_digits(&mut self, digits: &str) {
        self.status.action(format!("send dtmf {}", digits));
        let session = match &self.active {
            Some(active) if active.context().state.is_established() => {
                active.context().session.clone()
            }
            _ => {
                self.status.action("no active call");
                return;
            }
        };

        // Validate the whole sequence before sending anything
        if let Some(bad) = digits.chars().find(|ch| !is_dtmf_digit(*ch)) {
            self.status.call(format!("invalid dtmf digit '{}'", bad));
            return;
        }

        for digit in digits.chars() {
            if let Err(e) = session.send_info(InfoBody::dtmf(digit)).await {
                tracing::warn!(error = %e, "DTMF send failed");
                self.status.call(format!("failed to send dtmf: {}", e));
                return;
            }
        }
        tracing::debug!(count = digits.len(), "DTMF digits sent");
    }

    async fn invite_received(&mut self, session: Arc<dyn SignalingSession>) {
        let remote = session.remote_identity();
        if self.active.is_some() {
            // Busy: the new invite is rejected at the boundary, the active
            // call is untouched
            tracing::warn!(%remote, "Rejecting invite while a call is in progress");
            if let Err(e) = session.reject().await {
                tracing::debug!(error = %e, "Busy reject failed");
            }
            return;
        }

        self.install(ActiveSession::Incoming(SessionContext {
            remote: remote.clone(),
            state: SessionState::Initial,
            session,
            media: None,
        }));
        self.status.call(format!("incoming call from {}", remote));
        tracing::info!(%remote, "Incoming call");
    }

    async fn state_changed(&mut self, state: SessionState) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let previous = active.context().state;
        if previous == state {
            return;
        }
        tracing::debug!(remote = %active.context().remote, %previous, %state, "Session state change");

        match state {
            SessionState::Terminated => {
                // Remote-side teardown; the slot is reclaimed the same way a
                // local hangup reclaims it
                if let Some(active) = self.active.take() {
                    self.reclaim(active);
                }
                self.status.call("call disconnected");
            }
            SessionState::Established => {
                active.context_mut().state = state;
                self.bind_media();
                self.status.call("call connected");
            }
            _ => {
                active.context_mut().state = state;
            }
        }
    }

    /// Bind the session's media source and subscribe to late tracks
    fn bind_media(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(source) = active.context().session.media_source() else {
            tracing::warn!(remote = %active.context().remote, "Established without a media source");
            return;
        };

        let handle = self.binder.bind(&source);
        active.context_mut().media = Some(handle);

        if let Some(mut events) = source.track_events() {
            let generation = self.generation;
            let tx = self.input_tx.clone();
            tokio::spawn(async move {
                while events.changed().await.is_ok() {
                    if tx
                        .send(ControllerInput::Event(SessionEvent::TrackAdded { generation }))
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }
    }

    /// A track arrived after establishment; rebind to pick it up
    fn track_added(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !active.context().state.is_established() {
            return;
        }
        if let Some(source) = active.context().session.media_source() {
            let handle = self.binder.bind(&source);
            active.context_mut().media = Some(handle);
        }
    }

    /// Single reclaim point: unbind media, invalidate forwarders, drop the
    /// session
    fn reclaim(&mut self, mut active: ActiveSession) {
        let ctx = active.context_mut();
        ctx.state = SessionState::Terminated;
        if let Some(handle) = ctx.media.take() {
            self.binder.unbind(handle);
        }
        self.generation = self.generation.wrapping_add(1);
        tracing::info!(remote = %ctx.remote, "Call terminated");
    }

    /// Install a new active session and start forwarding its state stream
    fn install(&mut self, active: ActiveSession) {
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let mut states = active.context().session.state_changes();
        let tx = self.input_tx.clone();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow();
                if tx
                    .send(ControllerInput::Event(SessionEvent::StateChanged { generation, state }))
                    .is_err()
                {
                    break;
                }
                if state.is_terminal() {
                    break;
                }
            }
        });
        self.active = Some(active);
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            session: self.active.as_ref().map(|active| SessionSnapshot {
                direction: active.direction(),
                remote: active.context().remote.clone(),
                state: active.context().state,
                media_bound: active.context().media.is_some(),
            }),
        }
    }
}
