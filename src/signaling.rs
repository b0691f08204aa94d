//! Signaling capability contracts and agent lifecycle management
//!
//! The signaling transport itself (connection establishment, message
//! encoding, retransmission) lives behind the [`SignalingAgent`] and
//! [`SignalingSession`] traits; platform stacks bind concrete adapters to
//! these contracts. This module owns only the lifecycle around them: the
//! [`SignalingManager`] starts the agent, registers with the server, and
//! forwards inbound invites - the sole channel by which the call controller
//! learns of incoming calls.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped -> Starting -> Started(Unregistered -> Registering -> Registered)
//!     -> Stopping -> Stopped
//! ```
//!
//! Whoever acquires the agent through [`SignalingManager::start`] must
//! guarantee [`SignalingManager::stop`] on every exit path; stopping an
//! already-stopped manager is a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::media::MediaSource;
use crate::relay::RelayCredential;
use crate::session::{InfoBody, SessionState};
use crate::uri::{parse_sip_uri, SipUri};

/// Channel on which an agent delivers inbound invite sessions
pub type InviteSender = mpsc::UnboundedSender<Arc<dyn SignalingSession>>;

/// Receiving half of the invite channel
pub type InviteReceiver = mpsc::UnboundedReceiver<Arc<dyn SignalingSession>>;

/// One call-control session with a remote party
///
/// Request methods complete when the request has been issued; acceptance by
/// the remote side arrives later through the [`state_changes`] stream, and
/// callers must tolerate arbitrary delay or failure.
///
/// [`state_changes`]: SignalingSession::state_changes
#[async_trait]
pub trait SignalingSession: Send + Sync {
    /// Identity of the remote party
    fn remote_identity(&self) -> String;

    /// Stream of session lifecycle state notifications
    fn state_changes(&self) -> watch::Receiver<SessionState>;

    /// Media source for this session, once negotiation produced one
    fn media_source(&self) -> Option<Arc<dyn MediaSource>>;

    /// Accept an incoming session
    async fn accept(&self) -> ClientResult<()>;

    /// Reject an incoming session
    async fn reject(&self) -> ClientResult<()>;

    /// Terminate the session
    async fn bye(&self) -> ClientResult<()>;

    /// Send a mid-session INFO message (in-band DTMF)
    async fn send_info(&self, body: InfoBody) -> ClientResult<()>;
}

/// Signaling Agent capability: server connection and session creation
#[async_trait]
pub trait SignalingAgent: Send + Sync {
    /// Register the configured identity with the signaling server
    async fn register(&self) -> ClientResult<()>;

    /// Request a new outbound session towards `target`
    ///
    /// `relay` carries a freshly issued relay credential when relay
    /// traversal is configured.
    async fn invite(
        &self,
        target: &SipUri,
        relay: Option<RelayCredential>,
    ) -> ClientResult<Arc<dyn SignalingSession>>;

    /// Deregister and release all transport resources
    async fn shutdown(&self);
}

impl std::fmt::Debug for dyn SignalingAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn SignalingAgent")
    }
}

/// Constructs a started [`SignalingAgent`] for a configuration
///
/// Inbound invites must be delivered on the supplied sender for the lifetime
/// of the agent.
#[async_trait]
pub trait SignalingAgentFactory: Send + Sync {
    async fn create(
        &self,
        config: &ClientConfig,
        invites: InviteSender,
    ) -> ClientResult<Arc<dyn SignalingAgent>>;
}

/// Registration phase while the agent is started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationPhase {
    /// Agent is up but no registration has succeeded yet
    Unregistered,
    /// Registration request is in flight
    Registering,
    /// Identity is registered with the server
    Registered,
}

/// Lifecycle state of the signaling agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// No agent exists
    Stopped,
    /// Agent construction in progress
    Starting,
    /// Agent is running
    Started(RegistrationPhase),
    /// Agent teardown in progress
    Stopping,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Stopped => write!(f, "Stopped"),
            AgentState::Starting => write!(f, "Starting"),
            AgentState::Started(RegistrationPhase::Unregistered) => write!(f, "Started/Unregistered"),
            AgentState::Started(RegistrationPhase::Registering) => write!(f, "Started/Registering"),
            AgentState::Started(RegistrationPhase::Registered) => write!(f, "Started/Registered"),
            AgentState::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Owns agent start/stop and server registration
pub struct SignalingManager {
    config: ClientConfig,
    factory: Arc<dyn SignalingAgentFactory>,
    agent: Option<Arc<dyn SignalingAgent>>,
    state: AgentState,
}

impl SignalingManager {
    /// Create a manager in the `Stopped` state
    pub fn new(config: ClientConfig, factory: Arc<dyn SignalingAgentFactory>) -> Self {
        Self { config, factory, agent: None, state: AgentState::Stopped }
    }

    /// Current lifecycle state
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Whether the identity is currently registered
    pub fn is_registered(&self) -> bool {
        self.state == AgentState::Started(RegistrationPhase::Registered)
    }

    /// The running agent, if started
    pub fn agent(&self) -> Option<Arc<dyn SignalingAgent>> {
        self.agent.clone()
    }

    /// Start the signaling agent and register with the server
    ///
    /// The local URI is validated before any network action; a malformed
    /// address is reported synchronously and no partial state is created.
    /// Factory failure is reported as [`ClientError::StartupFailed`] and the
    /// manager remains `Stopped`; this layer never retries. A registration
    /// failure after a successful start is logged and leaves the manager in
    /// `Started/Unregistered` with [`SignalingManager::register`] available
    /// for a higher-layer retry.
    ///
    /// Inbound invites are forwarded on `invites` for the agent's lifetime.
    pub async fn start(&mut self, invites: InviteSender) -> ClientResult<Arc<dyn SignalingAgent>> {
        if self.state != AgentState::Stopped {
            return Err(ClientError::invalid_operation(
                "start",
                format!("signaling manager is {}", self.state),
            ));
        }

        parse_sip_uri(&self.config.identity.local_uri)?;

        self.state = AgentState::Starting;
        let agent = match self.factory.create(&self.config, invites).await {
            Ok(agent) => agent,
            Err(e) => {
                self.state = AgentState::Stopped;
                return Err(ClientError::startup_failed(e.to_string()));
            }
        };

        self.agent = Some(agent.clone());
        self.state = AgentState::Started(RegistrationPhase::Unregistered);
        tracing::info!(server = %self.config.identity.server_addr, "Signaling agent started");

        if let Err(e) = self.register().await {
            tracing::warn!(error = %e, "Registration failed, agent remains unregistered");
        }

        Ok(agent)
    }

    /// Issue a registration request for the configured identity
    pub async fn register(&mut self) -> ClientResult<()> {
        let agent = match (&self.state, &self.agent) {
            (AgentState::Started(_), Some(agent)) => agent.clone(),
            _ => {
                return Err(ClientError::invalid_operation(
                    "register",
                    format!("signaling manager is {}", self.state),
                ))
            }
        };

        self.state = AgentState::Started(RegistrationPhase::Registering);
        match agent.register().await {
            Ok(()) => {
                self.state = AgentState::Started(RegistrationPhase::Registered);
                tracing::info!(uri = %self.config.identity.local_uri, "Registered");
                Ok(())
            }
            Err(e) => {
                // Prior safe state: started but unregistered
                self.state = AgentState::Started(RegistrationPhase::Unregistered);
                Err(ClientError::transport_failed(format!("registration failed: {}", e)))
            }
        }
    }

    /// Stop the agent, deregistering and releasing transport resources
    ///
    /// No-op when already stopped.
    pub async fn stop(&mut self) {
        if self.state == AgentState::Stopped {
            return;
        }
        self.state = AgentState::Stopping;
        if let Some(agent) = self.agent.take() {
            agent.shutdown().await;
        }
        self.state = AgentState::Stopped;
        tracing::info!("Signaling agent stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubAgent {
        register_ok: bool,
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SignalingAgent for StubAgent {
        async fn register(&self) -> ClientResult<()> {
            if self.register_ok {
                Ok(())
            } else {
                Err(ClientError::transport_failed("407 rejected"))
            }
        }

        async fn invite(
            &self,
            _target: &SipUri,
            _relay: Option<RelayCredential>,
        ) -> ClientResult<Arc<dyn SignalingSession>> {
            Err(ClientError::transport_failed("not under test"))
        }

        async fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct StubFactory {
        create_ok: bool,
        register_ok: bool,
        created: Arc<AtomicBool>,
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SignalingAgentFactory for StubFactory {
        async fn create(
            &self,
            _config: &ClientConfig,
            _invites: InviteSender,
        ) -> ClientResult<Arc<dyn SignalingAgent>> {
            self.created.store(true, Ordering::SeqCst);
            if self.create_ok {
                Ok(Arc::new(StubAgent {
                    register_ok: self.register_ok,
                    shutdowns: self.shutdowns.clone(),
                }))
            } else {
                Err(ClientError::transport_failed("connection refused"))
            }
        }
    }

    fn config(local_uri: &str) -> ClientConfig {
        ClientConfig::new(IdentityConfig::new("wss://sip.example.com:7443", local_uri))
    }

    fn manager(local_uri: &str, create_ok: bool, register_ok: bool) -> (SignalingManager, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicBool::new(false));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let factory = Arc::new(StubFactory {
            create_ok,
            register_ok,
            created: created.clone(),
            shutdowns: shutdowns.clone(),
        });
        (SignalingManager::new(config(local_uri), factory), created, shutdowns)
    }

    #[tokio::test]
    async fn start_registers_and_stop_releases() {
        let (mut mgr, _, shutdowns) = manager("sip:alice@example.com", true, true);
        let (tx, _rx) = mpsc::unbounded_channel();

        assert_eq!(mgr.state(), AgentState::Stopped);
        mgr.start(tx).await.expect("start should succeed");
        assert!(mgr.is_registered());

        mgr.stop().await;
        assert_eq!(mgr.state(), AgentState::Stopped);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        // Stopping again is a no-op
        mgr.stop().await;
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_local_uri_fails_before_any_network_action() {
        let (mut mgr, created, _) = manager("alice@example.com", true, true);
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = mgr.start(tx).await.expect_err("must fail");
        assert!(matches!(err, ClientError::InvalidAddress { .. }));
        assert_eq!(mgr.state(), AgentState::Stopped, "no partial state");
        assert!(!created.load(Ordering::SeqCst), "factory must not be reached");
    }

    #[tokio::test]
    async fn factory_failure_is_startup_error_and_stays_stopped() {
        let (mut mgr, _, _) = manager("sip:alice@example.com", false, true);
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = mgr.start(tx).await.expect_err("must fail");
        assert!(matches!(err, ClientError::StartupFailed { .. }));
        assert_eq!(mgr.state(), AgentState::Stopped);
    }

    #[tokio::test]
    async fn registration_failure_leaves_agent_started_unregistered() {
        let (mut mgr, _, _) = manager("sip:alice@example.com", true, false);
        let (tx, _rx) = mpsc::unbounded_channel();

        mgr.start(tx).await.expect("start itself succeeds");
        assert_eq!(mgr.state(), AgentState::Started(RegistrationPhase::Unregistered));

        let err = mgr.register().await.expect_err("retry also fails");
        assert!(matches!(err, ClientError::TransportFailed { .. }));
        assert_eq!(mgr.state(), AgentState::Started(RegistrationPhase::Unregistered));
    }

    #[tokio::test]
    async fn register_without_start_is_invalid_operation() {
        let (mut mgr, _, _) = manager("sip:alice@example.com", true, true);
        let err = mgr.register().await.expect_err("must fail");
        assert!(matches!(err, ClientError::InvalidOperation { .. }));
    }
}
