//! Two-party real-time channel over WebRTC, negotiated through a
//! relay-based signaling transport.
//!
//! Both participants run the same code: each joins its own
//! `handshake:<name>` topic, pushes offers/answers/candidates tagged with
//! the other's name, and lets the relay route them. The engine owns the
//! peer connection, resolves simultaneous offers, buffers candidates that
//! outrun their descriptions, and reports connectivity, chat text and
//! remote media through a single event stream.
//!
//! The signaling relay and the media capture device are collaborator
//! traits ([`signaling::SignalingTransport`], [`media::MediaSource`]); an
//! in-process relay is included for tests and demos.

pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod status;

pub use config::{IceServerConfig, ServerKind, SessionConfig};
pub use error::{MediaError, SessionError, SignalingError};
pub use events::PeerEvent;
pub use media::{MediaRequest, MediaSource, NoMedia};
pub use peer::PeerSession;
pub use session::Session;
pub use signaling::{
    LoopbackSignaling, SignalMessage, SignalSender, SignalingLink, SignalingTransport,
};
pub use status::LinkStatus;
