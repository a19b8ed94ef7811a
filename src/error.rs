use thiserror::Error;

/// Failures raised while starting or driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Both participant names must be non-empty before a session can start.
    #[error("participant names must be non-empty")]
    EmptyName,

    /// Joining the signaling topic failed. Fatal for the session; there is
    /// no automatic retry.
    #[error("unable to join signaling topic {topic}: {source}")]
    Join {
        topic: String,
        source: SignalingError,
    },

    #[error("invalid ICE server configuration: {0}")]
    InvalidIceServer(String),

    #[error("webrtc failure: {0}")]
    Webrtc(#[from] webrtc::Error),

    #[error("malformed negotiation payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Failures of the signaling transport collaborator.
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("join refused: {0}")]
    Refused(String),

    #[error("signaling connection closed")]
    Closed,

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Failures of the media source collaborator.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The user (or platform) denied the capability request.
    #[error("media permission denied")]
    PermissionDenied,

    #[error("no usable capture device: {0}")]
    Unavailable(String),
}
