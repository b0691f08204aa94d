//! Relay credential issuance for NAT traversal
//!
//! Derives short-lived, signed relay (TURN-style) authentication pairs in
//! the REST credential scheme: the username is `"<expiry>:<server-name>"`
//! and the password is the base64 HMAC-SHA1 of the username under the shared
//! secret. A credential is valid for exactly one expiry window and is never
//! reused past `expires_at`.
//!
//! The clock is injected so issuance is deterministic under test; two calls
//! with identical inputs and `now` yield identical output, while a one
//! second difference in `now` already changes the username.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::config::RelayConfig;
use crate::error::{ClientError, ClientResult};

type HmacSha1 = Hmac<Sha1>;

/// A short-lived relay authentication pair
///
/// Never mutated after issuance; discard once `expires_at` has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCredential {
    /// Credential username: `"<expiry-unix>:<server-name>"`
    pub username: String,
    /// Keyed signature over the username (base64 HMAC-SHA1)
    pub password: String,
    /// When the credential was issued
    pub issued_at: DateTime<Utc>,
    /// When the credential stops being valid (`issued_at + ttl`)
    pub expires_at: DateTime<Utc>,
}

impl RelayCredential {
    /// Whether the credential is still valid at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Issue a relay credential for `name` signed with `secret`
///
/// Pure function of its inputs; `now` is the issuance instant. Fails with a
/// configuration error when `name` or `secret` is empty or `ttl_secs` is
/// zero.
pub fn issue(
    name: &str,
    secret: &str,
    ttl_secs: u64,
    now: DateTime<Utc>,
) -> ClientResult<RelayCredential> {
    if name.is_empty() {
        return Err(ClientError::missing_configuration("relay.server_name"));
    }
    if secret.is_empty() {
        return Err(ClientError::missing_configuration("relay.shared_secret"));
    }
    if ttl_secs == 0 {
        return Err(ClientError::invalid_configuration(
            "relay.credential_ttl_secs",
            "must be greater than zero",
        ));
    }

    let expires_at = now + Duration::seconds(ttl_secs as i64);
    let username = format!("{}:{}", expires_at.timestamp(), name);

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| ClientError::internal_error(format!("HMAC key setup failed: {}", e)))?;
    mac.update(username.as_bytes());
    let password = BASE64.encode(mac.finalize().into_bytes());

    Ok(RelayCredential { username, password, issued_at: now, expires_at })
}

/// Stateful issuer bound to a [`RelayConfig`]
///
/// Caches the credential for the current window and reissues the moment the
/// window closes, so a credential can never be reused across windows.
#[derive(Debug)]
pub struct RelayCredentialIssuer {
    config: RelayConfig,
    cached: Option<RelayCredential>,
}

impl RelayCredentialIssuer {
    /// Create an issuer for the given relay configuration
    pub fn new(config: RelayConfig) -> Self {
        Self { config, cached: None }
    }

    /// Relay server address the credential is intended for
    pub fn server_addr(&self) -> &str {
        &self.config.server_addr
    }

    /// Return a credential valid at `now`, issuing a fresh one if the cached
    /// credential has expired (or none exists yet)
    pub fn credential(&mut self, now: DateTime<Utc>) -> ClientResult<RelayCredential> {
        if let Some(cached) = &self.cached {
            if cached.is_valid_at(now) {
                return Ok(cached.clone());
            }
        }

        let fresh = issue(
            &self.config.server_name,
            &self.config.shared_secret,
            self.config.credential_ttl_secs,
            now,
        )?;
        tracing::debug!(
            username = %fresh.username,
            expires_at = %fresh.expires_at,
            "Issued relay credential"
        );
        self.cached = Some(fresh.clone());
        Ok(fresh)
    }
}
