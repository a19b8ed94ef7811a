use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::{rtc_config, IceServerConfig};
use crate::error::SessionError;
use crate::events::EngineEvent;

/// Creates the peer connection for one epoch and wires every platform
/// callback into the engine queue. The callbacks own nothing but the
/// sender and their epoch tag; all state changes happen in the engine.
pub(crate) async fn new_peer(
    servers: &[IceServerConfig],
    epoch: u64,
    engine_tx: mpsc::UnboundedSender<EngineEvent>,
) -> Result<Arc<RTCPeerConnection>, SessionError> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)?;
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let pc = Arc::new(api.new_peer_connection(rtc_config(servers)).await?);

    // Trickle ICE. Each real candidate is forwarded immediately; the None
    // end-of-gathering marker never leaves this callback.
    let tx = engine_tx.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        match cand {
            Some(c) => match c.to_json() {
                Ok(init) => {
                    debug!(epoch, candidate = %init.candidate, "local candidate gathered");
                    let _ = tx.send(EngineEvent::LocalCandidate {
                        epoch,
                        candidate: init.into(),
                    });
                }
                Err(err) => warn!(%err, "could not serialize local candidate"),
            },
            None => debug!(epoch, "candidate gathering completed"),
        }
        Box::pin(async {})
    }));

    let tx = engine_tx.clone();
    pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
        let _ = tx.send(EngineEvent::IceStateChanged { epoch, state });
        Box::pin(async {})
    }));

    // The answering side obtains its text channel through this
    // notification; the offering side never sees it fire.
    let tx = engine_tx.clone();
    pc.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
        let _ = tx.send(EngineEvent::ChannelReceived { epoch, channel });
        Box::pin(async {})
    }));

    let tx = engine_tx;
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let _ = tx.send(EngineEvent::TrackAdded { epoch, track });
        Box::pin(async {})
    }));

    Ok(pc)
}
