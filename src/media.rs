use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use webrtc::track::track_local::TrackLocal;

use crate::error::MediaError;

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// One capability request against the media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRequest {
    pub audio: bool,
    pub video: bool,
}

impl MediaRequest {
    pub const fn audio_video() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }

    pub const fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }
}

/// The ordered requests tried on permission denial: the full request
/// first, then the reduced audio-only fallback. Bounded by construction,
/// no recursive retry.
pub fn capability_ladder() -> [MediaRequest; 2] {
    [MediaRequest::audio_video(), MediaRequest::audio_only()]
}

/// Supplies local capture tracks. Device enumeration and selection stay on
/// the collaborator's side; the engine only asks for tracks matching a
/// capability request.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn request(&self, request: &MediaRequest) -> Result<Vec<LocalTrack>, MediaError>;
}

/// A media source with no capture devices; every request is denied. Used
/// by text-only sessions.
pub struct NoMedia;

#[async_trait]
impl MediaSource for NoMedia {
    async fn request(&self, _request: &MediaRequest) -> Result<Vec<LocalTrack>, MediaError> {
        Err(MediaError::Unavailable("no capture devices".into()))
    }
}

/// Walks the capability ladder; the first granted request wins. `None`
/// means every rung was denied and the caller should surface a permission
/// failure without touching the ongoing text negotiation.
pub async fn acquire_tracks(source: &dyn MediaSource) -> Option<Vec<LocalTrack>> {
    for request in capability_ladder() {
        match source.request(&request).await {
            Ok(tracks) => return Some(tracks),
            Err(err) => {
                debug!(?request, %err, "media request denied, trying next rung");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use webrtc::api::media_engine::MIME_TYPE_OPUS;
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
    use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

    fn audio_track() -> LocalTrack {
        Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            "peerchat".to_owned(),
        ))
    }

    struct DenyVideo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaSource for DenyVideo {
        async fn request(&self, request: &MediaRequest) -> Result<Vec<LocalTrack>, MediaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.video {
                Err(MediaError::PermissionDenied)
            } else {
                Ok(vec![audio_track()])
            }
        }
    }

    #[tokio::test]
    async fn denied_video_falls_back_to_audio_only() {
        let source = DenyVideo {
            calls: AtomicUsize::new(0),
        };
        let tracks = acquire_tracks(&source).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_ladder_yields_none() {
        assert!(acquire_tracks(&NoMedia).await.is_none());
    }

    #[test]
    fn ladder_tries_the_full_request_first() {
        let ladder = capability_ladder();
        assert_eq!(ladder[0], MediaRequest::audio_video());
        assert_eq!(ladder[1], MediaRequest::audio_only());
    }
}
