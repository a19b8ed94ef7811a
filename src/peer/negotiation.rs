use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::{validate_servers, IceServerConfig, SessionConfig};
use crate::debounce::Debouncer;
use crate::error::SessionError;
use crate::events::{EngineEvent, PeerEvent};
use crate::media::{acquire_tracks, MediaSource};
use crate::peer::connection::new_peer;
use crate::peer::data_channel::{attach_channel, send_line};
use crate::peer::ice;
use crate::peer::state::{SessionState, CHANNEL_LABEL, STREAM_SETTLE_WINDOW};
use crate::peer::types::{AnswerPayload, IcePayload, OfferPayload};
use crate::session::Session;
use crate::signaling::{SignalMessage, SignalSender, SignalingTransport};
use crate::status::LinkStatus;

/// Handle to a running negotiation engine. Commands are enqueued on the
/// same ordered queue the platform callbacks feed, so user actions and
/// remote events interleave deterministically.
pub struct PeerSession {
    commands: mpsc::UnboundedSender<EngineEvent>,
    engine: JoinHandle<()>,
}

impl PeerSession {
    /// Starts a session: validates both names, joins the derived topic,
    /// spawns the engine and triggers the initial offer.
    ///
    /// A refused join is fatal for the session; there is no retry.
    pub async fn connect(
        config: SessionConfig,
        transport: &dyn SignalingTransport,
        media: Arc<dyn MediaSource>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PeerEvent>), SessionError> {
        validate_servers(&config.ice_servers)?;
        let session = Session::new(&config.local_name, &config.remote_name)?;

        let link = transport
            .join(session.topic())
            .await
            .map_err(|source| SessionError::Join {
                topic: session.topic().to_owned(),
                source,
            })?;

        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        // Inbound signaling merges into the engine queue.
        let inbound_tx = engine_tx.clone();
        let mut inbound = link.inbound;
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                let forward = match message {
                    SignalMessage::Offer(p) => EngineEvent::RemoteOffer(p),
                    SignalMessage::Answer(p) => EngineEvent::RemoteAnswer(p),
                    SignalMessage::Ice(p) => EngineEvent::RemoteIce(p),
                };
                if inbound_tx.send(forward).is_err() {
                    break;
                }
            }
        });

        let engine = Engine {
            session,
            servers: config.ice_servers,
            state: SessionState::new(),
            signaling: link.sender,
            media,
            events: event_tx,
            engine_tx: engine_tx.clone(),
            settle: Debouncer::new(STREAM_SETTLE_WINDOW),
        };

        // The join succeeded; the first negotiation round starts now.
        let _ = engine_tx.send(EngineEvent::Connect);

        let task = tokio::spawn(engine.run(engine_rx));

        Ok((
            Self {
                commands: engine_tx,
                engine: task,
            },
            event_rx,
        ))
    }

    /// Submits one chat line. Queued until the channel opens.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.commands.send(EngineEvent::SendText(text.into()));
    }

    /// Acquires local media and renegotiates over the live connection.
    pub fn start_media(&self) {
        let _ = self.commands.send(EngineEvent::StartMedia);
    }

    /// Tears the session down. The engine emits `PeerEvent::Closed` and
    /// stops.
    pub fn close(&self) {
        let _ = self.commands.send(EngineEvent::Close);
    }

    /// Waits for the engine task to finish after `close`.
    pub async fn join(self) {
        let _ = self.engine.await;
    }
}

/// During glare the designated yielding side abandons its own offer and
/// answers the incoming one; the other side ignores the incoming offer and
/// keeps its own outstanding. Both sides compute the role from the same
/// name comparison, so exactly one of them yields.
fn yields_on_glare(local_name: &str, remote_name: &str) -> bool {
    local_name <= remote_name
}

fn chat_line(local_name: &str, text: &str) -> String {
    format!("{}: {}", local_name, text)
}

struct Engine {
    session: Session,
    servers: Vec<IceServerConfig>,
    state: SessionState,
    signaling: Arc<dyn SignalSender>,
    media: Arc<dyn MediaSource>,
    events: mpsc::UnboundedSender<PeerEvent>,
    engine_tx: mpsc::UnboundedSender<EngineEvent>,
    settle: Debouncer,
}

impl Engine {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        while let Some(event) = rx.recv().await {
            if self.handle(event).await {
                break;
            }
        }
        debug!(topic = %self.session.topic(), "engine stopped");
    }

    /// Dispatches one event. Returns true when the session is finished.
    async fn handle(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Connect => {
                if let Err(err) = self.make_offer_and_send().await {
                    warn!(%err, "initial offer failed");
                }
            }

            EngineEvent::RemoteOffer(payload) => {
                if !self.session.accepts_sender(&payload.from) {
                    debug!(from = %payload.from, "dropping offer from unexpected sender");
                } else if let Err(err) = self.handle_remote_offer(payload).await {
                    warn!(%err, "remote offer handling failed");
                }
            }

            EngineEvent::RemoteAnswer(payload) => {
                if !self.session.accepts_sender(&payload.from) {
                    debug!(from = %payload.from, "dropping answer from unexpected sender");
                } else if let Err(err) = self.handle_remote_answer(payload).await {
                    warn!(%err, "remote answer handling failed");
                }
            }

            EngineEvent::RemoteIce(payload) => {
                if !self.session.accepts_sender(&payload.from) {
                    debug!(from = %payload.from, "dropping candidate from unexpected sender");
                } else {
                    match payload.candidate() {
                        Ok(candidate) => {
                            ice::accept_remote_candidate(&mut self.state, candidate).await;
                        }
                        Err(err) => warn!(%err, "malformed remote candidate"),
                    }
                }
            }

            EngineEvent::LocalCandidate { epoch, candidate } => {
                if self.state.is_current(epoch) {
                    match IcePayload::new(
                        self.session.local_name(),
                        self.session.remote_name(),
                        &candidate,
                    ) {
                        Ok(payload) => self.push(SignalMessage::Ice(payload)).await,
                        Err(err) => warn!(%err, "could not encode local candidate"),
                    }
                }
            }

            EngineEvent::IceStateChanged { epoch, state } => {
                if self.state.is_current(epoch) {
                    let class = LinkStatus::from_ice(state);
                    debug!(?state, ?class, "ice connection state changed");
                    if self.state.status != Some(class) {
                        self.state.status = Some(class);
                        let _ = self.events.send(PeerEvent::Status(class));
                    }
                }
            }

            EngineEvent::ChannelReceived { epoch, channel } => {
                if self.state.is_current(epoch) {
                    debug!(label = %channel.label(), "data channel received");
                    attach_channel(&channel, epoch, self.engine_tx.clone());
                    // The channel may have opened before the handlers were
                    // in place; synthesize the open event in that case.
                    if channel.ready_state() == RTCDataChannelState::Open {
                        let _ = self.engine_tx.send(EngineEvent::ChannelOpen { epoch });
                    }
                    self.state.channel = Some(channel);
                }
            }

            EngineEvent::ChannelOpen { epoch } => {
                if self.state.is_current(epoch) && !self.state.channel_open {
                    self.state.channel_open = true;
                    let _ = self.events.send(PeerEvent::ChannelOpen);
                    self.flush_outbox().await;
                }
            }

            EngineEvent::ChannelText { epoch, text } => {
                if self.state.is_current(epoch) {
                    let _ = self.events.send(PeerEvent::Message(text));
                }
            }

            EngineEvent::ChannelClosed { epoch } => {
                if self.state.is_current(epoch) {
                    debug!("data channel closed");
                    self.state.channel_open = false;
                }
            }

            EngineEvent::TrackAdded { epoch, track } => {
                if self.state.is_current(epoch) {
                    debug!(id = %track.id(), stream = %track.stream_id(), "remote track added");
                    self.state.settling_tracks.push(track);
                    let tx = self.engine_tx.clone();
                    self.settle.call(move || {
                        let _ = tx.send(EngineEvent::StreamSettled { epoch });
                    });
                }
            }

            EngineEvent::StreamSettled { epoch } => {
                if self.state.is_current(epoch) {
                    self.emit_settled_stream();
                }
            }

            EngineEvent::SendText(text) => {
                self.send_text(text).await;
            }

            EngineEvent::StartMedia => {
                if let Err(err) = self.start_media().await {
                    warn!(%err, "media renegotiation failed");
                }
            }

            EngineEvent::Close => {
                self.close().await;
                return true;
            }
        }
        false
    }

    /// Returns the current connection, creating and wiring one if absent.
    async fn ensure_connection(&mut self) -> Result<Arc<RTCPeerConnection>, SessionError> {
        if let Some(pc) = self.state.conn.clone() {
            return Ok(pc);
        }
        let pc = new_peer(&self.servers, self.state.epoch, self.engine_tx.clone()).await?;
        self.state.conn = Some(pc.clone());
        Ok(pc)
    }

    /// One offer round: ensure connection and channel, generate and apply
    /// the offer, push it. Renegotiation takes the same path and simply
    /// finds the channel already present.
    async fn make_offer_and_send(&mut self) -> Result<(), SessionError> {
        let pc = self.ensure_connection().await?;

        // The channel must exist before the offer is generated, or the
        // offer's media description carries no data channel line.
        if self.state.channel.is_none() {
            let dc = pc
                .create_data_channel(CHANNEL_LABEL, Some(RTCDataChannelInit::default()))
                .await?;
            attach_channel(&dc, self.state.epoch, self.engine_tx.clone());
            self.state.channel = Some(dc);
        }

        let offer = pc.create_offer(None).await?;
        pc.set_local_description(offer).await?;

        // Push the applied local description, not the raw create_offer
        // result, so the wire carries exactly what this side committed to.
        let Some(description) = pc.local_description().await else {
            warn!("local description missing after set_local_description");
            return Ok(());
        };
        let payload = OfferPayload::new(
            self.session.local_name(),
            self.session.remote_name(),
            &description,
        )?;
        self.push(SignalMessage::Offer(payload)).await;
        info!(target = %self.session.remote_name(), "offer sent");
        Ok(())
    }

    async fn handle_remote_offer(&mut self, payload: OfferPayload) -> Result<(), SessionError> {
        let description = payload.description()?;

        // Glare: their offer arrived while ours is outstanding.
        if let Some(pc) = self.state.conn.clone() {
            if pc.signaling_state() == RTCSignalingState::HaveLocalOffer {
                if yields_on_glare(self.session.local_name(), self.session.remote_name()) {
                    info!("simultaneous offers, abandoning local offer to answer");
                    if let Some(old) = self.state.replace_connection() {
                        // Close in the background; its callbacks carry a
                        // dead epoch either way.
                        tokio::spawn(async move {
                            let _ = old.close().await;
                        });
                    }
                } else {
                    // The remote side yields. Re-announce the standing
                    // offer: if the original was pushed before the remote
                    // joined the relay, this copy is the one that gets
                    // answered; if they already hold it, the duplicate is
                    // absorbed as a re-application of the same description.
                    info!("simultaneous offers, keeping local offer; remote side yields");
                    if let Some(description) = pc.local_description().await {
                        let payload = OfferPayload::new(
                            self.session.local_name(),
                            self.session.remote_name(),
                            &description,
                        )?;
                        self.push(SignalMessage::Offer(payload)).await;
                    }
                    return Ok(());
                }
            }
        }

        let pc = self.ensure_connection().await?;
        pc.set_remote_description(description).await?;
        self.state.remote_described = true;
        ice::apply_pending(&mut self.state).await;

        let answer = pc.create_answer(None).await?;
        pc.set_local_description(answer).await?;
        let Some(description) = pc.local_description().await else {
            warn!("local description missing after answering");
            return Ok(());
        };
        let payload = AnswerPayload::new(
            self.session.local_name(),
            self.session.remote_name(),
            &description,
        )?;
        self.push(SignalMessage::Answer(payload)).await;
        info!(target = %self.session.remote_name(), "answer sent");
        Ok(())
    }

    async fn handle_remote_answer(&mut self, payload: AnswerPayload) -> Result<(), SessionError> {
        let Some(pc) = self.state.conn.clone() else {
            // Remote-side ordering bug; locally unrecoverable, non-fatal.
            warn!("answer received with no local connection");
            return Ok(());
        };
        if pc.signaling_state() != RTCSignalingState::HaveLocalOffer {
            // Duplicate delivery or an answer to an abandoned offer.
            debug!(state = ?pc.signaling_state(), "ignoring answer in current state");
            return Ok(());
        }
        let description = payload.description()?;
        pc.set_remote_description(description).await?;
        self.state.remote_described = true;
        ice::apply_pending(&mut self.state).await;
        info!("answer applied");
        Ok(())
    }

    async fn send_text(&mut self, text: String) {
        let line = chat_line(self.session.local_name(), &text);
        match self.state.channel.clone() {
            Some(dc) if self.state.channel_open => send_line(&dc, line).await,
            _ => {
                debug!("channel not open yet, queueing text");
                self.state.outbox.push(line);
            }
        }
    }

    async fn flush_outbox(&mut self) {
        let queued = std::mem::take(&mut self.state.outbox);
        if queued.is_empty() {
            return;
        }
        let Some(dc) = self.state.channel.clone() else {
            return;
        };
        debug!(count = queued.len(), "flushing queued text");
        for line in queued {
            send_line(&dc, line).await;
        }
    }

    /// Emits the coalesced remote stream after the settle window closes.
    /// The stream assigned last within the window wins.
    fn emit_settled_stream(&mut self) {
        let tracks = std::mem::take(&mut self.state.settling_tracks);
        let Some(last) = tracks.last() else {
            return;
        };
        let stream_id = last.stream_id();
        let tracks: Vec<_> = tracks
            .iter()
            .filter(|t| t.stream_id() == stream_id)
            .cloned()
            .collect();
        info!(stream = %stream_id, tracks = tracks.len(), "remote stream settled");
        let _ = self.events.send(PeerEvent::RemoteStream { stream_id, tracks });
    }

    async fn start_media(&mut self) -> Result<(), SessionError> {
        let Some(tracks) = acquire_tracks(self.media.as_ref()).await else {
            // Every rung of the ladder was denied. Text chat is
            // unaffected; the application shows the blocking notice.
            let _ = self.events.send(PeerEvent::MediaDenied);
            return Ok(());
        };
        let pc = self.ensure_connection().await?;
        for track in tracks {
            pc.add_track(track).await?;
        }
        // A second offer round over the same connection; the channel
        // already exists, so only the media lines change.
        self.make_offer_and_send().await
    }

    async fn close(&mut self) {
        self.settle.cancel();
        if let Some(dc) = self.state.channel.take() {
            let _ = dc.close().await;
        }
        if let Some(pc) = self.state.conn.take() {
            let _ = pc.close().await;
        }
        let _ = self.events.send(PeerEvent::Closed);
        info!(topic = %self.session.topic(), "session closed");
    }

    async fn push(&self, message: SignalMessage) {
        if let Err(err) = self.signaling.push(message).await {
            warn!(%err, "signaling push failed");
        }
    }
}
