//! Top-level softphone coordinator
//!
//! [`Softphone`] wires the pieces together: it validates the configuration,
//! starts the signaling agent through the [`SignalingManager`], hands its
//! invite stream to a spawned [`CallController`], and guarantees everything
//! is torn down again on [`Softphone::stop`]. Call control and status
//! observation are delegated to the controller handle.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use softphone_core::{ClientConfig, IdentityConfig, Softphone};
//! # use softphone_core::SignalingAgentFactory;
//!
//! # async fn run(factory: Arc<dyn SignalingAgentFactory>) -> softphone_core::ClientResult<()> {
//! let config = ClientConfig::new(
//!     IdentityConfig::new("wss://sip.example.com:7443", "sip:alice@example.com")
//!         .with_credentials("alice", "secret"),
//! );
//!
//! let mut phone = Softphone::new(config, factory)?;
//! phone.start().await?;
//!
//! phone.call("sip:bob@example.com")?;
//! // ... later
//! phone.hangup()?;
//!
//! phone.stop().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::ClientConfig;
use crate::controller::{CallController, ControllerSnapshot};
use crate::error::{ClientError, ClientResult};
use crate::media::{AudioSink, MediaBinder};
use crate::relay::RelayCredentialIssuer;
use crate::signaling::{AgentState, SignalingAgentFactory, SignalingManager};
use crate::status::StatusProjection;

/// Coordinates signaling lifecycle, call control, and media binding
pub struct Softphone {
    config: ClientConfig,
    manager: SignalingManager,
    controller: Option<CallController>,
    sink: Option<Arc<dyn AudioSink>>,
}

impl std::fmt::Debug for Softphone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Softphone")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Softphone {
    /// Create a stopped softphone
    ///
    /// Fails fast on an invalid configuration; nothing is created until
    /// [`Softphone::start`].
    pub fn new(
        config: ClientConfig,
        factory: Arc<dyn SignalingAgentFactory>,
    ) -> ClientResult<Self> {
        config.validate()?;
        Ok(Self {
            manager: SignalingManager::new(config.clone(), factory),
            config,
            controller: None,
            sink: None,
        })
    }

    /// Provide the audio output sink up front
    ///
    /// Without this, media bindings are deferred until a sink is mounted via
    /// [`Softphone::mount_sink`].
    pub fn with_audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Start signaling and spawn the call controller
    pub async fn start(&mut self) -> ClientResult<()> {
        if self.controller.is_some() {
            return Err(ClientError::invalid_operation("start", "softphone already started"));
        }

        let (invite_tx, invite_rx) = mpsc::unbounded_channel();
        let agent = self.manager.start(invite_tx).await?;

        let binder = MediaBinder::new(self.sink.clone());
        let relay = self.config.relay.clone().map(RelayCredentialIssuer::new);
        self.controller = Some(CallController::spawn(agent, binder, relay, invite_rx));
        Ok(())
    }

    /// Stop everything: hang up any active call, stop the controller loop,
    /// deregister and release the signaling agent
    ///
    /// Safe to call on every exit path; stopping twice is a no-op.
    pub async fn stop(&mut self) {
        if let Some(controller) = self.controller.take() {
            // The shutdown ack guarantees the final reject/bye went out while
            // the transport was still up
            controller.shutdown().await;
        }
        self.manager.stop().await;
    }

    /// Signaling lifecycle state
    pub fn agent_state(&self) -> AgentState {
        self.manager.state()
    }

    /// Whether the configured identity is registered
    pub fn is_registered(&self) -> bool {
        self.manager.is_registered()
    }

    /// Retry registration after a failed or expired one
    pub async fn register(&mut self) -> ClientResult<()> {
        self.manager.register().await
    }

    /// Observe the status projection
    pub fn status(&self) -> ClientResult<watch::Receiver<StatusProjection>> {
        Ok(self.controller()?.status())
    }

    /// Answer the pending incoming call
    pub fn answer(&self) -> ClientResult<()> {
        self.controller()?.accept_incoming()
    }

    /// Place an outgoing call
    pub fn call(&self, target: &str) -> ClientResult<()> {
        self.controller()?.initiate_outgoing(target)
    }

    /// Place an outgoing call to the configured default target
    pub fn call_default_target(&self) -> ClientResult<()> {
        let target = self
            .config
            .identity
            .default_target_uri
            .clone()
            .ok_or_else(|| ClientError::missing_configuration("default_target_uri"))?;
        self.controller()?.initiate_outgoing(&target)
    }

    /// Hang up or reject the active call
    pub fn hangup(&self) -> ClientResult<()> {
        self.controller()?.terminate()
    }

    /// Send DTMF digits on the established call
    pub fn send_digits(&self, digits: &str) -> ClientResult<()> {
        self.controller()?.send_digits(digits)
    }

    /// Set speaker output level (clamped to 0.0..=1.0)
    pub fn set_output_level(&self, level: f32) -> ClientResult<()> {
        self.controller()?.set_output_level(level)
    }

    /// Mount the audio output sink after start
    pub fn mount_sink(&self, sink: Arc<dyn AudioSink>) -> ClientResult<()> {
        self.controller()?.mount_sink(sink)
    }

    /// Snapshot the call controller state
    pub async fn snapshot(&self) -> ClientResult<ControllerSnapshot> {
        self.controller()?.snapshot().await
    }

    fn controller(&self) -> ClientResult<&CallController> {
        self.controller
            .as_ref()
            .ok_or_else(|| ClientError::invalid_operation("call control", "softphone is not started"))
    }
}
