//! # Softphone Core
//!
//! Call-session coordination layer for softphone applications. This crate
//! owns the call lifecycle, signaling agent lifecycle, media binding, relay
//! credential issuance, and a display-ready status projection; the actual
//! signaling and media transports plug in behind trait contracts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Softphone                   │
//! │  (start/stop discipline, delegation)         │
//! ├──────────────┬──────────────┬────────────────┤
//! │ Signaling    │ Call Session │ Media          │
//! │ Manager      │ Controller   │ Binder         │
//! │              │              │                │
//! │ agent start/ │ one active   │ sink attach,   │
//! │ stop, regis- │ call, all    │ gain, deferred │
//! │ tration      │ transitions  │ binding        │
//! ├──────────────┴──────────────┴────────────────┤
//! │ SignalingAgent / SignalingSession /          │
//! │ MediaSource / AudioSink  (platform adapters) │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The controller processes every command and every signaling/media event on
//! a single queue, one at a time, so at most one call exists and no
//! transition can interleave with another. Per-operation failures surface on
//! the [`StatusProjection`] watch channel rather than as panics or broken
//! state.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use softphone_core::{ClientConfig, IdentityConfig, RelayConfig, Softphone};
//! # use softphone_core::SignalingAgentFactory;
//!
//! # async fn run(factory: Arc<dyn SignalingAgentFactory>) -> softphone_core::ClientResult<()> {
//! let config = ClientConfig::new(
//!     IdentityConfig::new("wss://sip.example.com:7443", "sip:alice@example.com")
//!         .with_credentials("alice", "secret"),
//! )
//! .with_relay(RelayConfig::new(
//!     "turns:turn.example.com:5349",
//!     "turn.example.com",
//!     "shared-secret",
//!     8400,
//! ));
//!
//! let mut phone = Softphone::new(config, factory)?;
//! phone.start().await?;
//!
//! let mut status = phone.status()?;
//! tokio::spawn(async move {
//!     while status.changed().await.is_ok() {
//!         println!("{}", status.borrow().call_status);
//!     }
//! });
//!
//! phone.call("sip:bob@example.com")?;
//! phone.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod media;
pub mod relay;
pub mod session;
pub mod signaling;
pub mod status;
pub mod uri;

pub use client::Softphone;
pub use config::{ClientConfig, IdentityConfig, RelayConfig};
pub use controller::{CallController, ControllerSnapshot, SessionSnapshot};
pub use error::{ClientError, ClientResult};
pub use media::{AudioSink, MediaBinder, MediaHandle, MediaSource, MediaStream, MediaTrack};
pub use relay::{RelayCredential, RelayCredentialIssuer};
pub use session::{
    is_dtmf_digit, CallDirection, InfoBody, SessionState, DTMF_CONTENT_DISPOSITION,
    DTMF_CONTENT_TYPE,
};
pub use signaling::{
    AgentState, InviteReceiver, InviteSender, RegistrationPhase, SignalingAgent,
    SignalingAgentFactory, SignalingManager, SignalingSession,
};
pub use status::StatusProjection;
pub use uri::{parse_sip_uri, SipUri};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
