//! Configuration for the softphone client
//!
//! The identity and relay configuration are immutable for the process
//! lifetime and loaded exactly once at startup, either built in code with
//! the `with_*` methods or read from a JSON file.
//!
//! ```rust
//! use softphone_core::config::{ClientConfig, IdentityConfig, RelayConfig};
//!
//! let config = ClientConfig::new(
//!     IdentityConfig::new("wss://sip.example.com:7443", "sip:alice@example.com")
//!         .with_credentials("alice", "secret123")
//!         .with_default_target("sip:bob@example.com"),
//! )
//! .with_relay(RelayConfig::new("turn.example.com:3478", "turn.example.com", "s3cr3t", 3600));
//!
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::uri::parse_sip_uri;

/// Identity configuration for registering with the signaling server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Signaling server address (e.g. "wss://sip.example.com:7443")
    pub server_addr: String,

    /// Local SIP URI identifying this client (e.g. "sip:alice@example.com")
    pub local_uri: String,

    /// Authorization username (optional)
    pub auth_username: Option<String>,

    /// Authorization password (optional)
    pub auth_password: Option<String>,

    /// Default call target URI used when none is supplied (optional)
    pub default_target_uri: Option<String>,
}

impl IdentityConfig {
    /// Create a new identity configuration without credentials
    pub fn new(server_addr: impl Into<String>, local_uri: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            local_uri: local_uri.into(),
            auth_username: None,
            auth_password: None,
            default_target_uri: None,
        }
    }

    /// Set authorization credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth_username = Some(username.into());
        self.auth_password = Some(password.into());
        self
    }

    /// Set the default call target
    pub fn with_default_target(mut self, target_uri: impl Into<String>) -> Self {
        self.default_target_uri = Some(target_uri.into());
        self
    }
}

/// Relay (TURN-style) traversal configuration
///
/// Consumed by the [`crate::relay::RelayCredentialIssuer`] to derive
/// short-lived credential pairs before session negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay server address (host:port)
    pub server_addr: String,

    /// Relay server name, embedded in the credential username
    pub server_name: String,

    /// Shared secret used to sign credentials
    pub shared_secret: String,

    /// Credential validity window in seconds
    pub credential_ttl_secs: u64,
}

impl RelayConfig {
    /// Create a new relay configuration
    pub fn new(
        server_addr: impl Into<String>,
        server_name: impl Into<String>,
        shared_secret: impl Into<String>,
        credential_ttl_secs: u64,
    ) -> Self {
        Self {
            server_addr: server_addr.into(),
            server_name: server_name.into(),
            shared_secret: shared_secret.into(),
            credential_ttl_secs,
        }
    }
}

/// Top-level configuration for the softphone client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Identity and registration settings
    pub identity: IdentityConfig,

    /// Relay traversal settings; `None` disables relay credentials
    pub relay: Option<RelayConfig>,

    /// User agent string advertised to the signaling server
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new client configuration with defaults
    pub fn new(identity: IdentityConfig) -> Self {
        Self {
            identity,
            relay: None,
            user_agent: format!("softphone-core/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set relay traversal configuration
    pub fn with_relay(mut self, relay: RelayConfig) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Load a configuration from a JSON file, once, at startup
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> ClientResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ClientError::invalid_configuration("config_file", e.to_string())
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            ClientError::invalid_configuration("config_file", e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration before any network action
    ///
    /// Configuration errors are fatal at startup; they are surfaced to the
    /// operator and never retried by this layer.
    pub fn validate(&self) -> ClientResult<()> {
        if self.identity.server_addr.is_empty() {
            return Err(ClientError::missing_configuration("identity.server_addr"));
        }
        parse_sip_uri(&self.identity.local_uri)?;
        if let Some(target) = &self.identity.default_target_uri {
            parse_sip_uri(target)?;
        }
        if let Some(relay) = &self.relay {
            if relay.server_name.is_empty() {
                return Err(ClientError::missing_configuration("relay.server_name"));
            }
            if relay.shared_secret.is_empty() {
                return Err(ClientError::missing_configuration("relay.shared_secret"));
            }
            if relay.credential_ttl_secs == 0 {
                return Err(ClientError::invalid_configuration(
                    "relay.credential_ttl_secs",
                    "must be greater than zero",
                ));
            }
        }
        Ok(())
    }
}
