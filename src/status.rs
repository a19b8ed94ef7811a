use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;

/// The three connectivity classes the UI layer consumes. Projection is
/// total over the ICE connection states and push-driven; `Degraded` is
/// terminal here, recovery is not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Negotiation or connectivity checks still in flight.
    Connecting,
    /// The peer link is usable.
    Ready,
    /// The link was lost or never established.
    Degraded,
}

impl LinkStatus {
    pub fn from_ice(state: RTCIceConnectionState) -> Self {
        match state {
            RTCIceConnectionState::New
            | RTCIceConnectionState::Checking
            | RTCIceConnectionState::Unspecified => LinkStatus::Connecting,
            RTCIceConnectionState::Connected | RTCIceConnectionState::Completed => {
                LinkStatus::Ready
            }
            RTCIceConnectionState::Disconnected
            | RTCIceConnectionState::Failed
            | RTCIceConnectionState::Closed => LinkStatus::Degraded,
        }
    }

    /// Whether the message input should accept text in this state.
    pub fn input_enabled(self) -> bool {
        self == LinkStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_ice_state_maps_to_one_class() {
        use RTCIceConnectionState::*;
        let cases = [
            (New, LinkStatus::Connecting),
            (Checking, LinkStatus::Connecting),
            (Unspecified, LinkStatus::Connecting),
            (Connected, LinkStatus::Ready),
            (Completed, LinkStatus::Ready),
            (Disconnected, LinkStatus::Degraded),
            (Failed, LinkStatus::Degraded),
            (Closed, LinkStatus::Degraded),
        ];
        for (state, class) in cases {
            assert_eq!(LinkStatus::from_ice(state), class, "{state:?}");
        }
    }

    #[test]
    fn input_is_enabled_only_when_ready() {
        assert!(LinkStatus::Ready.input_enabled());
        assert!(!LinkStatus::Connecting.input_enabled());
        assert!(!LinkStatus::Degraded.input_enabled());
    }
}
