use std::sync::Arc;
use std::time::Duration;

use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_remote::TrackRemote;

use crate::status::LinkStatus;

/// ========== CONSTANTS ==========

/// Label of the single data channel carried by each connection.
pub const CHANNEL_LABEL: &str = "msg";

/// Quiet window for coalescing remote track notifications into one stream
/// assignment.
pub const STREAM_SETTLE_WINDOW: Duration = Duration::from_millis(750);

/// ========== SESSION STATE ==========

/// All mutable per-session state. Owned exclusively by the engine task;
/// one instance per active session, nothing shared across sessions.
pub(crate) struct SessionState {
    /// Generation of the current connection. Bumped on every replacement;
    /// platform events tagged with an older epoch are ignored.
    pub epoch: u64,
    /// The single live peer connection, if any.
    pub conn: Option<Arc<RTCPeerConnection>>,
    /// The text channel of the current connection.
    pub channel: Option<Arc<RTCDataChannel>>,
    pub channel_open: bool,
    /// Text lines submitted before the channel opened, flushed on open.
    pub outbox: Vec<String>,
    /// Remote candidates that arrived before the remote description was
    /// applied, in arrival order.
    pub pending_candidates: Vec<RTCIceCandidateInit>,
    pub remote_described: bool,
    /// Remote tracks collected while the settle window is open.
    pub settling_tracks: Vec<Arc<TrackRemote>>,
    /// Last status class reported to the application.
    pub status: Option<LinkStatus>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            conn: None,
            channel: None,
            channel_open: false,
            outbox: Vec::new(),
            pending_candidates: Vec::new(),
            remote_described: false,
            settling_tracks: Vec::new(),
            status: None,
        }
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }

    /// Discards the negotiation state tied to the current connection and
    /// moves to the next epoch. Returns the old connection for the caller
    /// to close; any events it still emits carry a dead epoch.
    ///
    /// Two buffers survive on purpose: the outbox (unsent user text
    /// belongs to the session, not the connection) and the pending remote
    /// candidates (they accompany the remote's offer, which is exactly
    /// what a glare replacement is about to answer).
    pub fn replace_connection(&mut self) -> Option<Arc<RTCPeerConnection>> {
        self.epoch += 1;
        self.channel = None;
        self.channel_open = false;
        self.remote_described = false;
        self.settling_tracks.clear();
        self.conn.take()
    }
}
