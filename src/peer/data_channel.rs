use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;

use crate::events::EngineEvent;

/// Wires a freshly created or received channel into the engine queue.
/// Called by the offering side right after `create_data_channel` and by
/// the answering side from the channel-available notification.
pub(crate) fn attach_channel(
    dc: &Arc<RTCDataChannel>,
    epoch: u64,
    engine_tx: mpsc::UnboundedSender<EngineEvent>,
) {
    let tx = engine_tx.clone();
    dc.on_open(Box::new(move || {
        let _ = tx.send(EngineEvent::ChannelOpen { epoch });
        Box::pin(async {})
    }));

    let tx = engine_tx.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        // Messages are opaque UTF-8 text; anything else is dropped.
        match String::from_utf8(msg.data.to_vec()) {
            Ok(text) => {
                let _ = tx.send(EngineEvent::ChannelText { epoch, text });
            }
            Err(_) => warn!(epoch, "dropping non-UTF-8 channel message"),
        }
        Box::pin(async {})
    }));

    let tx = engine_tx;
    dc.on_close(Box::new(move || {
        let _ = tx.send(EngineEvent::ChannelClosed { epoch });
        Box::pin(async {})
    }));
}

/// Sends one chat line over an open channel. Failures are logged and
/// dropped; channel loss surfaces separately through the state projector.
pub(crate) async fn send_line(dc: &Arc<RTCDataChannel>, line: String) {
    debug!(len = line.len(), "channel send");
    if let Err(err) = dc.send_text(line).await {
        warn!(%err, "channel send failed");
    }
}
