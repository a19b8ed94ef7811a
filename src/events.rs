use std::sync::Arc;

use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::track::track_remote::TrackRemote;

use crate::peer::types::{AnswerPayload, CandidatePayload, IcePayload, OfferPayload};
use crate::status::LinkStatus;

/// Everything the negotiation engine reacts to, merged into one ordered
/// queue. Platform callbacks carry the epoch of the connection that
/// registered them so events from a replaced connection can be dropped by
/// identity rather than by unsubscription.
pub(crate) enum EngineEvent {
    // Inbound signaling, already decoded by the transport.
    RemoteOffer(OfferPayload),
    RemoteAnswer(AnswerPayload),
    RemoteIce(IcePayload),

    // Platform notifications.
    LocalCandidate {
        epoch: u64,
        candidate: CandidatePayload,
    },
    IceStateChanged {
        epoch: u64,
        state: RTCIceConnectionState,
    },
    ChannelReceived {
        epoch: u64,
        channel: Arc<RTCDataChannel>,
    },
    ChannelOpen {
        epoch: u64,
    },
    ChannelText {
        epoch: u64,
        text: String,
    },
    ChannelClosed {
        epoch: u64,
    },
    TrackAdded {
        epoch: u64,
        track: Arc<TrackRemote>,
    },
    StreamSettled {
        epoch: u64,
    },

    // Local commands from the session handle.
    Connect,
    StartMedia,
    SendText(String),
    Close,
}

/// What the engine reports to the embedding application.
#[derive(Clone)]
pub enum PeerEvent {
    /// The projected connectivity class changed.
    Status(LinkStatus),
    /// The text channel is open end to end.
    ChannelOpen,
    /// An inbound chat line, already `"<sender>: <text>"` formatted.
    Message(String),
    /// The settled set of remote tracks for one media stream.
    RemoteStream {
        stream_id: String,
        tracks: Vec<Arc<TrackRemote>>,
    },
    /// Every capability request was denied; text chat is unaffected.
    MediaDenied,
    /// The session was closed locally.
    Closed,
}
