use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Payload of an `offer` signaling event. The session description rides as
/// its canonical JSON form, stringified.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OfferPayload {
    pub from: String,
    pub target: String,
    pub offer: String,
}

impl OfferPayload {
    pub fn new(
        from: &str,
        target: &str,
        description: &RTCSessionDescription,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            from: from.to_owned(),
            target: target.to_owned(),
            offer: serde_json::to_string(description)?,
        })
    }

    pub fn description(&self) -> Result<RTCSessionDescription, serde_json::Error> {
        serde_json::from_str(&self.offer)
    }
}

/// Payload of an `answer` signaling event.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnswerPayload {
    pub from: String,
    pub target: String,
    pub answer: String,
}

impl AnswerPayload {
    pub fn new(
        from: &str,
        target: &str,
        description: &RTCSessionDescription,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            from: from.to_owned(),
            target: target.to_owned(),
            answer: serde_json::to_string(description)?,
        })
    }

    pub fn description(&self) -> Result<RTCSessionDescription, serde_json::Error> {
        serde_json::from_str(&self.answer)
    }
}

/// Payload of an `ice` signaling event.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IcePayload {
    pub from: String,
    pub target: String,
    pub ice: String,
}

impl IcePayload {
    pub fn new(
        from: &str,
        target: &str,
        candidate: &CandidatePayload,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            from: from.to_owned(),
            target: target.to_owned(),
            ice: serde_json::to_string(candidate)?,
        })
    }

    pub fn candidate(&self) -> Result<CandidatePayload, serde_json::Error> {
        serde_json::from_str(&self.ice)
    }
}

/// An ICE candidate in its canonical JSON form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CandidatePayload {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
}

impl CandidatePayload {
    pub fn to_init(&self) -> RTCIceCandidateInit {
        RTCIceCandidateInit {
            candidate: self.candidate.clone(),
            sdp_mid: self.sdp_mid.clone(),
            sdp_mline_index: self.sdp_mline_index,
            username_fragment: None,
        }
    }
}

impl From<RTCIceCandidateInit> for CandidatePayload {
    fn from(init: RTCIceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
        }
    }
}
