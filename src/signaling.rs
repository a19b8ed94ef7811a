use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SignalingError;
use crate::peer::types::{AnswerPayload, IcePayload, OfferPayload};
use crate::session::handshake_topic;

/// One negotiation message as it crosses the relay.
///
/// The relay routes by the payload's `target` field; receivers additionally
/// filter by `from`, since a topic may see cross-talk.
#[derive(Debug, Clone)]
pub enum SignalMessage {
    Offer(OfferPayload),
    Answer(AnswerPayload),
    Ice(IcePayload),
}

impl SignalMessage {
    /// The relay-level event name this message is pushed under.
    pub fn event(&self) -> &'static str {
        match self {
            SignalMessage::Offer(_) => "offer",
            SignalMessage::Answer(_) => "answer",
            SignalMessage::Ice(_) => "ice",
        }
    }

    pub fn from(&self) -> &str {
        match self {
            SignalMessage::Offer(p) => &p.from,
            SignalMessage::Answer(p) => &p.from,
            SignalMessage::Ice(p) => &p.from,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            SignalMessage::Offer(p) => &p.target,
            SignalMessage::Answer(p) => &p.target,
            SignalMessage::Ice(p) => &p.target,
        }
    }

    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            SignalMessage::Offer(p) => serde_json::to_value(p),
            SignalMessage::Answer(p) => serde_json::to_value(p),
            SignalMessage::Ice(p) => serde_json::to_value(p),
        }
    }

    /// Reassembles a typed message from a raw `(event, payload)` pair as a
    /// concrete transport receives them off the wire.
    pub fn from_event(event: &str, payload: serde_json::Value) -> Result<Self, SignalingError> {
        let malformed = |e: serde_json::Error| SignalingError::Transport(e.to_string());
        match event {
            "offer" => Ok(SignalMessage::Offer(
                serde_json::from_value(payload).map_err(malformed)?,
            )),
            "answer" => Ok(SignalMessage::Answer(
                serde_json::from_value(payload).map_err(malformed)?,
            )),
            "ice" => Ok(SignalMessage::Ice(
                serde_json::from_value(payload).map_err(malformed)?,
            )),
            other => Err(SignalingError::Transport(format!(
                "unknown signaling event {other:?}"
            ))),
        }
    }
}

/// Push half of a joined topic.
#[async_trait]
pub trait SignalSender: Send + Sync {
    async fn push(&self, message: SignalMessage) -> Result<(), SignalingError>;
}

/// A joined topic: the push handle plus the inbound message stream.
pub struct SignalingLink {
    pub sender: Arc<dyn SignalSender>,
    pub inbound: mpsc::UnboundedReceiver<SignalMessage>,
}

/// The relay collaborator. Delivery is at-least-once while the underlying
/// connection lives; nothing is guaranteed across reconnects.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn join(&self, topic: &str) -> Result<SignalingLink, SignalingError>;
}

/// In-process relay that routes messages between joined topics by their
/// `target` name, the way the real relay does. Used by the integration
/// tests and useful for demos.
#[derive(Clone, Default)]
pub struct LoopbackSignaling {
    topics: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<SignalMessage>>>>,
}

impl LoopbackSignaling {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalingTransport for LoopbackSignaling {
    async fn join(&self, topic: &str) -> Result<SignalingLink, SignalingError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics
            .lock()
            .expect("loopback topic table poisoned")
            .insert(topic.to_owned(), tx);
        Ok(SignalingLink {
            sender: Arc::new(LoopbackSender {
                topics: Arc::clone(&self.topics),
            }),
            inbound: rx,
        })
    }
}

struct LoopbackSender {
    topics: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<SignalMessage>>>>,
}

#[async_trait]
impl SignalSender for LoopbackSender {
    async fn push(&self, message: SignalMessage) -> Result<(), SignalingError> {
        let topic = handshake_topic(message.target());
        let tx = self
            .topics
            .lock()
            .expect("loopback topic table poisoned")
            .get(&topic)
            .cloned();
        match tx {
            // A target that never joined is relay noise, not an error.
            None => Ok(()),
            Some(tx) => tx.send(message).map_err(|_| SignalingError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::OfferPayload;

    fn offer(from: &str, target: &str) -> SignalMessage {
        SignalMessage::Offer(OfferPayload {
            from: from.into(),
            target: target.into(),
            offer: "{}".into(),
        })
    }

    #[tokio::test]
    async fn loopback_routes_by_target_name() {
        let relay = LoopbackSignaling::new();
        let alice = relay.join("handshake:alice").await.unwrap();
        let mut bob = relay.join("handshake:bob").await.unwrap();

        alice.sender.push(offer("alice", "bob")).await.unwrap();

        let received = bob.inbound.recv().await.unwrap();
        assert_eq!(received.from(), "alice");
        assert_eq!(received.event(), "offer");
    }

    #[tokio::test]
    async fn pushes_to_absent_targets_are_dropped() {
        let relay = LoopbackSignaling::new();
        let alice = relay.join("handshake:alice").await.unwrap();
        assert!(alice.sender.push(offer("alice", "nobody")).await.is_ok());
    }

    #[test]
    fn raw_events_reassemble_into_typed_messages() {
        let payload = serde_json::json!({
            "from": "bob",
            "target": "alice",
            "offer": "{\"type\":\"offer\",\"sdp\":\"\"}",
        });
        let message = SignalMessage::from_event("offer", payload).unwrap();
        assert_eq!(message.event(), "offer");
        assert_eq!(message.from(), "bob");
        assert_eq!(message.target(), "alice");

        assert!(SignalMessage::from_event("presence", serde_json::json!({})).is_err());
    }
}
