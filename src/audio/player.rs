use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::{MusicQueue, TrackRef},
        sink::{Completion, CompletionNotifier, OutputSink, VoiceConnector},
        transcoder::{Quality, Transcoder},
    },
    error::{MusicError, MusicResult},
    ui::announcer::Announcer,
};

/// Collaborators and tunables shared by every guild player.
pub struct PlayerDeps<S: OutputSink> {
    pub connector: Arc<dyn VoiceConnector<Sink = S>>,
    pub transcoder: Arc<dyn Transcoder<Stream = S::Stream>>,
    pub announcer: Arc<dyn Announcer>,
    pub default_volume: f32,
    pub connect_timeout: Duration,
    pub transcode_timeout: Duration,
}

// Implementar Clone manualmente: S no necesita ser Clone
impl<S: OutputSink> Clone for PlayerDeps<S> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            transcoder: self.transcoder.clone(),
            announcer: self.announcer.clone(),
            default_volume: self.default_volume,
            connect_timeout: self.connect_timeout,
            transcode_timeout: self.transcode_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    ConnectedIdle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined(ChannelId),
    AlreadyConnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started(TrackRef),
    /// Something is already loaded; the track (if any) waits at `position` (1-based).
    Queued {
        current: TrackRef,
        position: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeOutcome {
    Applied(u8),
    NothingPlaying,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub current_track: Option<TrackRef>,
    pub queue: Vec<TrackRef>,
    pub volume_percent: u8,
    pub quality: Quality,
}

struct PlayerState<S> {
    current_track: Option<TrackRef>,
    queue: MusicQueue,
    volume: f32,
    quality: Quality,
    sink: Option<S>,
    generation: u64,
    suppress_advance: bool,
    announce_channel: ChannelId,
    /// Set when the registry evicts this player; it refuses commands afterwards.
    retired: bool,
}

impl<S: OutputSink> PlayerState<S> {
    fn playback_state(&self) -> PlaybackState {
        match (&self.sink, &self.current_track) {
            (None, _) => PlaybackState::Idle,
            (Some(_), None) => PlaybackState::ConnectedIdle,
            (Some(sink), Some(_)) if sink.is_paused() => PlaybackState::Paused,
            (Some(_), Some(_)) => PlaybackState::Playing,
        }
    }
}

/// Receiving end of a player's completion inbox; drained by [`pump_completions`].
pub struct CompletionInbox(mpsc::UnboundedReceiver<Completion>);

impl CompletionInbox {
    pub async fn recv(&mut self) -> Option<Completion> {
        self.0.recv().await
    }
}

/// Mensajes para el canal de anuncios, enviados con el lock ya liberado.
struct Outbox {
    channel: ChannelId,
    messages: Vec<String>,
}

impl Outbox {
    fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            messages: Vec::new(),
        }
    }

    fn push(&mut self, text: impl Into<String>) {
        self.messages.push(text.into());
    }
}

/// Reproductor de una guild: cola, sink de voz y máquina de estados.
///
/// All state sits behind one async mutex. Commands and completions both take
/// it, so every mutation of the queue, the current track and the generation
/// counter is serialized per guild. Announcements are sent after the guard
/// is dropped.
pub struct GuildPlayer<S: OutputSink> {
    guild_id: GuildId,
    deps: PlayerDeps<S>,
    state: Mutex<PlayerState<S>>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<S: OutputSink> GuildPlayer<S> {
    pub fn new(
        guild_id: GuildId,
        announce_channel: ChannelId,
        deps: PlayerDeps<S>,
    ) -> (Arc<Self>, CompletionInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = PlayerState {
            current_track: None,
            queue: MusicQueue::new(),
            volume: deps.default_volume.clamp(0.0, 1.0),
            quality: Quality::default(),
            sink: None,
            generation: 0,
            suppress_advance: false,
            announce_channel,
            retired: false,
        };

        let player = Arc::new(Self {
            guild_id,
            deps,
            state: Mutex::new(state),
            completions: tx,
        });
        (player, CompletionInbox(rx))
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Conecta al canal de voz del usuario si no hay sink
    pub async fn join(&self, voice_channel: Option<ChannelId>) -> MusicResult<JoinOutcome> {
        let mut state = self.lock_live().await?;
        if state.sink.is_some() {
            return Ok(JoinOutcome::AlreadyConnected);
        }
        let channel_id = voice_channel.ok_or(MusicError::NoVoiceChannel)?;
        self.ensure_sink(&mut state, Some(channel_id)).await?;
        Ok(JoinOutcome::Joined(channel_id))
    }

    /// Agrega a la cola, devuelve el nuevo tamaño
    pub async fn enqueue(&self, track: TrackRef) -> MusicResult<usize> {
        Ok(self.lock_live().await?.queue.add_track(track))
    }

    /// Joins if needed, queues `track` and starts playback when nothing is loaded.
    pub async fn play(
        &self,
        track: Option<TrackRef>,
        voice_channel: Option<ChannelId>,
    ) -> MusicResult<PlayOutcome> {
        let mut state = self.lock_live().await?;
        if state.sink.is_none() && voice_channel.is_none() {
            // Nowhere to play; don't queue either.
            return Err(MusicError::NoVoiceChannel);
        }
        let position = track.map(|t| state.queue.add_track(t));

        if let Some(current) = &state.current_track {
            return Ok(PlayOutcome::Queued {
                current: current.clone(),
                position,
            });
        }

        let mut outbox = Outbox::new(state.announce_channel);
        let started = self.start_next(&mut state, voice_channel, &mut outbox).await;
        drop(state);
        self.send(outbox).await;
        Ok(PlayOutcome::Started(started?))
    }

    /// Loads the head of the queue into the sink, unless a track is already loaded.
    pub async fn play_next(&self, voice_channel: Option<ChannelId>) -> MusicResult<PlayOutcome> {
        let mut state = self.lock_live().await?;
        if let Some(current) = &state.current_track {
            return Ok(PlayOutcome::Queued {
                current: current.clone(),
                position: None,
            });
        }

        let mut outbox = Outbox::new(state.announce_channel);
        let started = self.start_next(&mut state, voice_channel, &mut outbox).await;
        drop(state);
        self.send(outbox).await;
        Ok(PlayOutcome::Started(started?))
    }

    /// Detiene sin avanzar; the pending completion clears the current track.
    pub async fn stop(&self) -> MusicResult<TrackRef> {
        let mut state = self.lock_live().await?;
        let track = Self::active_track(&state)?;
        state.suppress_advance = true;
        if let Some(sink) = state.sink.as_mut() {
            sink.stop();
        }
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        Ok(track)
    }

    /// Salta el track actual; the pending completion advances the queue.
    pub async fn skip(&self) -> MusicResult<TrackRef> {
        let mut state = self.lock_live().await?;
        let track = Self::active_track(&state)?;
        // Overrides an earlier stop whose completion hasn't arrived yet.
        state.suppress_advance = false;
        if let Some(sink) = state.sink.as_mut() {
            sink.stop();
        }
        info!("⏭️ Saltando {} en guild {}", track, self.guild_id);
        Ok(track)
    }

    pub async fn pause(&self) -> MusicResult<()> {
        let mut state = self.lock_live().await?;
        if state.playback_state() != PlaybackState::Playing {
            return Err(MusicError::NotPlaying);
        }
        if let Some(sink) = state.sink.as_mut() {
            sink.pause();
        }
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        Ok(())
    }

    pub async fn resume(&self) -> MusicResult<()> {
        let mut state = self.lock_live().await?;
        if state.playback_state() != PlaybackState::Paused {
            return Err(MusicError::NotPaused);
        }
        if let Some(sink) = state.sink.as_mut() {
            sink.resume();
        }
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        Ok(())
    }

    pub async fn dequeue(&self, index: usize) -> MusicResult<TrackRef> {
        self.lock_live().await?.queue.remove_track(index)
    }

    pub async fn clear_queue(&self) -> MusicResult<usize> {
        Ok(self.lock_live().await?.queue.clear())
    }

    /// Ajusta el volumen (0-100, clamped). Only stored while something is loaded;
    /// a paused track takes the new volume too.
    pub async fn set_volume(&self, percent: i64) -> MusicResult<VolumeOutcome> {
        let percent = percent.clamp(0, 100) as u8;
        let mut state = self.lock_live().await?;
        if state.current_track.is_none() {
            return Ok(VolumeOutcome::NothingPlaying);
        }

        let volume = f32::from(percent) / 100.0;
        state.volume = volume;
        if let Some(sink) = state.sink.as_mut() {
            if sink.is_playing() || sink.is_paused() {
                sink.set_volume(volume);
            }
        }
        info!("🔊 Volumen ajustado a {}% en guild {}", percent, self.guild_id);
        Ok(VolumeOutcome::Applied(percent))
    }

    pub async fn set_quality(&self, level: &str) -> MusicResult<Quality> {
        let quality: Quality = level.parse()?;
        self.lock_live().await?.quality = quality;
        info!("🎚️ Calidad {} en guild {}", quality, self.guild_id);
        Ok(quality)
    }

    /// Desconecta y libera el sink. The queue survives.
    pub async fn leave(&self) -> MusicResult<()> {
        let mut state = self.lock_live().await?;
        let mut sink = state.sink.take().ok_or(MusicError::NotConnected)?;
        Self::invalidate_playback(&mut state);

        if let Err(e) = sink.disconnect().await {
            warn!("Error al desconectar en guild {}: {}", self.guild_id, e);
        }
        Ok(())
    }

    /// The transport dropped us from voice without a `leave`.
    pub async fn handle_disconnect(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut sink) = state.sink.take() {
            // The voice call outlives the sink; its track must not keep playing.
            sink.stop();
            Self::invalidate_playback(&mut state);
            info!("🔌 Sink liberado tras desconexión externa en guild {}", self.guild_id);
        }
    }

    pub async fn set_announce_channel(&self, channel_id: ChannelId) {
        self.state.lock().await.announce_channel = channel_id;
    }

    pub async fn state(&self) -> PlaybackState {
        self.state.lock().await.playback_state()
    }

    pub async fn snapshot(&self) -> MusicResult<PlayerSnapshot> {
        let state = self.lock_live().await?;
        Ok(PlayerSnapshot {
            state: state.playback_state(),
            current_track: state.current_track.clone(),
            queue: state.queue.tracks(),
            volume_percent: (state.volume * 100.0).round() as u8,
            quality: state.quality,
        })
    }

    /// Retires the player when nothing would be lost by dropping it.
    ///
    /// Never waits: a busy lock counts as not idle. Once this returns true
    /// every command on this instance fails with [`MusicError::PlayerRetired`],
    /// so a caller still holding it can't connect an orphan.
    pub fn try_retire(&self) -> bool {
        let Ok(mut state) = self.state.try_lock() else {
            return false;
        };
        let idle = state.sink.is_none() && state.current_track.is_none() && state.queue.is_empty();
        if idle {
            state.retired = true;
        }
        idle
    }

    /// Applies one completion from the inbox.
    pub async fn handle_completion(&self, completion: Completion) {
        let mut state = self.state.lock().await;
        if completion.generation != state.generation {
            debug!(
                "Ignorando completion obsoleta (gen {} != {}) en guild {}",
                completion.generation, state.generation, self.guild_id
            );
            return;
        }

        let mut outbox = Outbox::new(state.announce_channel);
        let finished = state.current_track.take();
        if let Err(reason) = completion.outcome {
            let failure = MusicError::PlaybackError {
                track: finished.as_ref().map(ToString::to_string).unwrap_or_default(),
                reason,
            };
            error!("{} (guild {})", failure, self.guild_id);
            outbox.push(failure.to_string());
        }

        if std::mem::take(&mut state.suppress_advance) {
            debug!("Stop confirmado en guild {}", self.guild_id);
        } else if state.queue.is_empty() {
            info!("📭 Cola terminada en guild {}", self.guild_id);
        } else {
            match self.start_next(&mut state, None, &mut outbox).await {
                Ok(track) => outbox.push(format!("Now playing: {}", track)),
                // Each failed track is already in the outbox.
                Err(MusicError::PlaybackError { .. }) => {}
                Err(e) => outbox.push(e.to_string()),
            }
        }

        drop(state);
        self.send(outbox).await;
    }

    async fn lock_live(&self) -> MusicResult<MutexGuard<'_, PlayerState<S>>> {
        let state = self.state.lock().await;
        if state.retired {
            return Err(MusicError::PlayerRetired);
        }
        Ok(state)
    }

    async fn send(&self, outbox: Outbox) {
        for text in &outbox.messages {
            self.deps.announcer.announce(outbox.channel, text).await;
        }
    }

    fn active_track(state: &PlayerState<S>) -> MusicResult<TrackRef> {
        match state.playback_state() {
            PlaybackState::Playing | PlaybackState::Paused => {
                state.current_track.clone().ok_or(MusicError::NotPlaying)
            }
            _ => Err(MusicError::NotPlaying),
        }
    }

    fn invalidate_playback(state: &mut PlayerState<S>) {
        // Any completion still in flight belongs to the old generation.
        state.generation += 1;
        state.suppress_advance = false;
        state.current_track = None;
    }

    async fn ensure_sink(
        &self,
        state: &mut PlayerState<S>,
        voice_channel: Option<ChannelId>,
    ) -> MusicResult<()> {
        if state.sink.is_some() {
            return Ok(());
        }
        let channel_id = voice_channel.ok_or(MusicError::NoVoiceChannel)?;

        let sink = tokio::time::timeout(
            self.deps.connect_timeout,
            self.deps.connector.connect(self.guild_id, channel_id),
        )
        .await
        .map_err(|_| {
            MusicError::ConnectionError(format!(
                "timed out after {}",
                humantime::format_duration(self.deps.connect_timeout)
            ))
        })??;

        state.sink = Some(sink);
        info!("🔊 Sink conectado en guild {} (canal {})", self.guild_id, channel_id);
        Ok(())
    }

    /// Pops tracks until one starts. Failed tracks are dropped and reported
    /// through `outbox`; if none starts, the last failure is returned.
    async fn start_next(
        &self,
        state: &mut PlayerState<S>,
        voice_channel: Option<ChannelId>,
        outbox: &mut Outbox,
    ) -> MusicResult<TrackRef> {
        let mut last_failure = None;
        while let Some(track) = state.queue.next_track() {
            if let Err(e) = self.ensure_sink(state, voice_channel).await {
                state.queue.push_front(track);
                return Err(e);
            }
            state.current_track = Some(track.clone());

            match self.try_start(state, &track).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo {} en guild {}", track, self.guild_id);
                    return Ok(track);
                }
                Err(reason) => {
                    state.current_track = None;
                    let failure = MusicError::PlaybackError {
                        track: track.to_string(),
                        reason: reason.to_string(),
                    };
                    error!("{} (guild {})", failure, self.guild_id);
                    outbox.push(failure.to_string());
                    last_failure = Some(failure);
                }
            }
        }
        Err(last_failure.unwrap_or(MusicError::QueueEmpty))
    }

    async fn try_start(&self, state: &mut PlayerState<S>, track: &TrackRef) -> MusicResult<()> {
        let stream = tokio::time::timeout(
            self.deps.transcode_timeout,
            self.deps.transcoder.transcode(track, state.quality),
        )
        .await
        .map_err(|_| {
            MusicError::TranscodeError(format!(
                "timed out after {}",
                humantime::format_duration(self.deps.transcode_timeout)
            ))
        })??;

        state.generation += 1;
        state.suppress_advance = false;
        let notifier = CompletionNotifier::new(self.completions.clone(), state.generation);
        let volume = state.volume;
        let sink = state.sink.as_mut().ok_or(MusicError::NotConnected)?;
        sink.start(stream, volume, notifier).await
    }
}

/// Drains a player's inbox until the player is dropped.
pub async fn pump_completions<S: OutputSink>(
    player: Weak<GuildPlayer<S>>,
    mut inbox: CompletionInbox,
) {
    while let Some(completion) = inbox.recv().await {
        let Some(player) = player.upgrade() else {
            break;
        };
        player.handle_completion(completion).await;
    }
    debug!("Inbox de completions cerrado");
}
