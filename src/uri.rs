//! SIP URI validation
//!
//! Malformed local and target URIs must be detected before any network
//! action, so every address that enters the crate goes through
//! [`parse_sip_uri`] first.

use url::Url;

use crate::error::{ClientError, ClientResult};

/// A validated SIP URI
///
/// Holds the original string plus the user and host parts split out for
/// logging and display. Only `sip:` and `sips:` schemes are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipUri {
    uri: String,
    user: String,
    host: String,
    secure: bool,
}

impl SipUri {
    /// The full URI string as supplied
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// User part of the URI (before `@`)
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Host part of the URI (after `@`, may include a port)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the URI uses the `sips:` scheme
    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

impl std::fmt::Display for SipUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// Parse and validate a SIP URI of the form `sip:user@host[:port]`
///
/// Returns [`ClientError::InvalidAddress`] for anything else. No partial
/// state is created on failure.
pub fn parse_sip_uri(input: &str) -> ClientResult<SipUri> {
    let parsed = Url::parse(input)
        .map_err(|e| ClientError::invalid_address(input, e.to_string()))?;

    let secure = match parsed.scheme() {
        "sip" => false,
        "sips" => true,
        other => {
            return Err(ClientError::invalid_address(
                input,
                format!("unsupported scheme '{}'", other),
            ))
        }
    };

    // sip: URIs are opaque to the url crate; the user@host part is the path
    let rest = parsed.path();
    let (user, host) = rest.split_once('@').ok_or_else(|| {
        ClientError::invalid_address(input, "expected user@host after scheme")
    })?;

    if user.is_empty() {
        return Err(ClientError::invalid_address(input, "empty user part"));
    }
    if host.is_empty() || host.split(':').next().unwrap_or("").is_empty() {
        return Err(ClientError::invalid_address(input, "empty host part"));
    }

    Ok(SipUri {
        uri: input.to_string(),
        user: user.to_string(),
        host: host.to_string(),
        secure,
    })
}
