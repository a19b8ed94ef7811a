//! End-to-end negotiation over the in-process relay: two engines, real
//! peer connections, host candidates only.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use peerchat::media::LocalTrack;
use peerchat::{
    LinkStatus, LoopbackSignaling, MediaError, MediaRequest, MediaSource, NoMedia, PeerEvent,
    PeerSession, SessionConfig,
};

const SETTLE: Duration = Duration::from_secs(30);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peerchat=debug".into()),
        )
        .try_init();
}

async fn start(
    relay: &LoopbackSignaling,
    local: &str,
    remote: &str,
) -> Result<(PeerSession, UnboundedReceiver<PeerEvent>)> {
    start_with_media(relay, local, remote, Arc::new(NoMedia)).await
}

async fn start_with_media(
    relay: &LoopbackSignaling,
    local: &str,
    remote: &str,
    media: Arc<dyn MediaSource>,
) -> Result<(PeerSession, UnboundedReceiver<PeerEvent>)> {
    // Host candidates alone connect two engines in one process; no STUN.
    let config = SessionConfig::new(local, remote).with_ice_servers(Vec::new())?;
    let (session, events) = PeerSession::connect(config, relay, media).await?;
    Ok((session, events))
}

async fn wait_channel_open(events: &mut UnboundedReceiver<PeerEvent>) -> Result<()> {
    timeout(SETTLE, async {
        while let Some(event) = events.recv().await {
            if matches!(event, PeerEvent::ChannelOpen) {
                return Ok(());
            }
        }
        bail!("event stream ended before the channel opened")
    })
    .await?
}

async fn wait_message(events: &mut UnboundedReceiver<PeerEvent>) -> Result<String> {
    timeout(SETTLE, async {
        while let Some(event) = events.recv().await {
            if let PeerEvent::Message(text) = event {
                return Ok(text);
            }
        }
        bail!("event stream ended before a message arrived")
    })
    .await?
}

async fn wait_ready(events: &mut UnboundedReceiver<PeerEvent>) -> Result<()> {
    timeout(SETTLE, async {
        while let Some(event) = events.recv().await {
            if matches!(event, PeerEvent::Status(LinkStatus::Ready)) {
                return Ok(());
            }
        }
        bail!("event stream ended before the link became ready")
    })
    .await?
}

#[tokio::test(flavor = "multi_thread")]
async fn text_round_trip_between_named_peers() -> Result<()> {
    init_tracing();
    let relay = LoopbackSignaling::new();
    let (alice, mut alice_events) = start(&relay, "alice", "bob").await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (bob, mut bob_events) = start(&relay, "bob", "alice").await?;

    wait_channel_open(&mut alice_events).await?;
    wait_channel_open(&mut bob_events).await?;

    alice.send_text("hi");
    assert_eq!(wait_message(&mut bob_events).await?, "alice: hi");

    bob.send_text("hello");
    assert_eq!(wait_message(&mut alice_events).await?, "bob: hello");

    alice.close();
    bob.close();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn link_status_reaches_ready_on_both_sides() -> Result<()> {
    init_tracing();
    let relay = LoopbackSignaling::new();
    let (_alice, mut alice_events) = start(&relay, "alice", "bob").await?;
    let (_bob, mut bob_events) = start(&relay, "bob", "alice").await?;

    wait_ready(&mut alice_events).await?;
    wait_ready(&mut bob_events).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_connect_converges_to_one_channel() -> Result<()> {
    init_tracing();
    let relay = LoopbackSignaling::new();
    // Both sides join and offer in the same tick; glare resolution must
    // leave a single working channel.
    let (alice, mut alice_events) = start(&relay, "alice", "bob").await?;
    let (bob, mut bob_events) = start(&relay, "bob", "alice").await?;

    wait_channel_open(&mut alice_events).await?;
    wait_channel_open(&mut bob_events).await?;

    bob.send_text("hey");
    assert_eq!(wait_message(&mut alice_events).await?, "bob: hey");

    alice.send_text("hey yourself");
    assert_eq!(wait_message(&mut bob_events).await?, "alice: hey yourself");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn offer_pushed_before_the_peer_joined_is_recovered() -> Result<()> {
    init_tracing();
    let relay = LoopbackSignaling::new();
    // Bob's initial offer targets a topic nobody has joined yet and is
    // dropped by the relay; the session must still converge once alice
    // appears and offers.
    let (bob, mut bob_events) = start(&relay, "bob", "alice").await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let (alice, mut alice_events) = start(&relay, "alice", "bob").await?;

    wait_channel_open(&mut alice_events).await?;
    wait_channel_open(&mut bob_events).await?;

    alice.send_text("made it");
    assert_eq!(wait_message(&mut bob_events).await?, "alice: made it");

    bob.close();
    alice.close();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn text_submitted_early_is_queued_and_flushed() -> Result<()> {
    init_tracing();
    let relay = LoopbackSignaling::new();
    let (alice, _alice_events) = start(&relay, "alice", "bob").await?;
    // No channel exists yet; both lines must survive until it opens.
    alice.send_text("first");
    alice.send_text("second");

    let (_bob, mut bob_events) = start(&relay, "bob", "alice").await?;
    assert_eq!(wait_message(&mut bob_events).await?, "alice: first");
    assert_eq!(wait_message(&mut bob_events).await?, "alice: second");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn close_is_reported_to_the_application() -> Result<()> {
    init_tracing();
    let relay = LoopbackSignaling::new();
    let (alice, mut alice_events) = start(&relay, "alice", "bob").await?;
    alice.close();

    timeout(SETTLE, async {
        while let Some(event) = alice_events.recv().await {
            if matches!(event, PeerEvent::Closed) {
                return Ok(());
            }
        }
        bail!("event stream ended without a close notification")
    })
    .await??;
    alice.join().await;
    Ok(())
}

/// Behaves like a camera-less machine: video rungs are denied, audio is
/// served from one static sample track the test keeps writing into.
struct StaticAudio {
    track: Arc<TrackLocalStaticSample>,
}

impl StaticAudio {
    fn new() -> Self {
        Self {
            track: Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    ..Default::default()
                },
                "audio".to_owned(),
                "peerchat-stream".to_owned(),
            )),
        }
    }
}

#[async_trait]
impl MediaSource for StaticAudio {
    async fn request(&self, request: &MediaRequest) -> Result<Vec<LocalTrack>, MediaError> {
        if request.video {
            return Err(MediaError::PermissionDenied);
        }
        Ok(vec![self.track.clone()])
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn media_renegotiation_delivers_a_settled_stream() -> Result<()> {
    init_tracing();
    let relay = LoopbackSignaling::new();
    let media = Arc::new(StaticAudio::new());
    let (alice, mut alice_events) =
        start_with_media(&relay, "alice", "bob", media.clone()).await?;
    let (_bob, mut bob_events) = start(&relay, "bob", "alice").await?;

    wait_channel_open(&mut alice_events).await?;
    wait_channel_open(&mut bob_events).await?;

    // Streaming renegotiates over the live connection. The track only
    // surfaces on bob's side once RTP flows, so keep writing samples.
    alice.start_media();
    let track = media.track.clone();
    let writer = tokio::spawn(async move {
        loop {
            let _ = track
                .write_sample(&Sample {
                    data: vec![0u8; 40].into(),
                    duration: Duration::from_millis(20),
                    ..Default::default()
                })
                .await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    let result = timeout(Duration::from_secs(60), async {
        loop {
            match bob_events.recv().await {
                Some(PeerEvent::RemoteStream { stream_id, tracks }) => {
                    return Ok((stream_id, tracks));
                }
                Some(PeerEvent::MediaDenied) => bail!("media was denied"),
                Some(_) => continue,
                None => bail!("event stream ended before the remote stream settled"),
            }
        }
    })
    .await;
    writer.abort();

    let (stream_id, tracks) = result??;
    assert_eq!(stream_id, "peerchat-stream");
    assert!(!tracks.is_empty());
    Ok(())
}
