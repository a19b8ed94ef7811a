use std::sync::Arc;

use tracing::{debug, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::RTCPeerConnection;

use crate::peer::state::SessionState;
use crate::peer::types::CandidatePayload;

/// Applies a remote candidate immediately when the remote description is
/// already in place, otherwise buffers it. Buffering is part of the
/// contract: a candidate outrunning its offer/answer must not be lost.
pub(crate) async fn accept_remote_candidate(state: &mut SessionState, payload: CandidatePayload) {
    let init = payload.to_init();
    let ready = state.remote_described;
    match state.conn.clone() {
        Some(pc) if ready => apply(&pc, init).await,
        _ => {
            debug!("remote description not set yet, queuing candidate");
            state.pending_candidates.push(init);
        }
    }
}

/// Drains the pending queue in arrival order. Runs after every successful
/// `set_remote_description`.
pub(crate) async fn apply_pending(state: &mut SessionState) {
    if state.pending_candidates.is_empty() {
        return;
    }
    let Some(pc) = state.conn.clone() else {
        return;
    };
    let queued = std::mem::take(&mut state.pending_candidates);
    debug!(count = queued.len(), "applying queued remote candidates");
    for init in queued {
        apply(&pc, init).await;
    }
}

async fn apply(pc: &Arc<RTCPeerConnection>, init: RTCIceCandidateInit) {
    // A single bad candidate is skipped, never fatal for the session.
    if let Err(err) = pc.add_ice_candidate(init).await {
        warn!(%err, "failed to add remote candidate");
    }
}
