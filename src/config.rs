use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;

use crate::error::SessionError;

/// Kind of an ICE server entry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Stun,
    Turn,
}

/// A single configurable ICE server.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IceServerConfig {
    pub kind: ServerKind,
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            kind: ServerKind::Stun,
            url: url.into(),
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            kind: ServerKind::Turn,
            url: url.into(),
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    /// Prepends the `stun:`/`turn:` scheme when the URL was given bare.
    pub fn scheme_url(&self) -> String {
        if self.url.starts_with("stun:") || self.url.starts_with("turn:") {
            self.url.clone()
        } else {
            let scheme = match self.kind {
                ServerKind::Turn => "turn:",
                ServerKind::Stun => "stun:",
            };
            format!("{}{}", scheme, self.url)
        }
    }
}

/// Identity and transport settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub local_name: String,
    pub remote_name: String,
    pub ice_servers: Vec<IceServerConfig>,
}

impl SessionConfig {
    pub fn new(local_name: impl Into<String>, remote_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            remote_name: remote_name.into(),
            ice_servers: default_ice_servers(),
        }
    }

    /// Replaces the default STUN pair with user-supplied servers.
    pub fn with_ice_servers(mut self, servers: Vec<IceServerConfig>) -> Result<Self, SessionError> {
        validate_servers(&servers)?;
        self.ice_servers = servers;
        Ok(self)
    }
}

pub fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![
        IceServerConfig::stun("stun:stun.l.google.com:19302"),
        IceServerConfig::stun("stun:stun1.l.google.com:19302"),
    ]
}

pub fn validate_servers(servers: &[IceServerConfig]) -> Result<(), SessionError> {
    for server in servers {
        if server.url.is_empty() {
            return Err(SessionError::InvalidIceServer(
                "server URL cannot be empty".into(),
            ));
        }
        if server.kind == ServerKind::Turn
            && (server.username.is_none() || server.credential.is_none())
        {
            return Err(SessionError::InvalidIceServer(
                "TURN servers require username and credential".into(),
            ));
        }
    }
    Ok(())
}

/// Builds the peer-connection configuration from the session's server list.
pub(crate) fn rtc_config(servers: &[IceServerConfig]) -> RTCConfiguration {
    let ice_servers = servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![config.scheme_url()],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect();

    RTCConfiguration {
        ice_servers,
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_urls_get_a_scheme() {
        let stun = IceServerConfig::stun("stun.example.org:3478");
        assert_eq!(stun.scheme_url(), "stun:stun.example.org:3478");

        let turn = IceServerConfig::turn("turn.example.org:3478", "u", "p");
        assert_eq!(turn.scheme_url(), "turn:turn.example.org:3478");
    }

    #[test]
    fn prefixed_urls_are_untouched() {
        let stun = IceServerConfig::stun("stun:stun.l.google.com:19302");
        assert_eq!(stun.scheme_url(), "stun:stun.l.google.com:19302");
    }

    #[test]
    fn turn_without_credentials_is_rejected() {
        let mut server = IceServerConfig::turn("turn.example.org", "u", "p");
        server.credential = None;
        assert!(validate_servers(&[server]).is_err());
    }

    #[test]
    fn empty_url_is_rejected() {
        let server = IceServerConfig::stun("");
        assert!(validate_servers(&[server]).is_err());
    }
}
