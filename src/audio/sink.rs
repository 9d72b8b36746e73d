//! Voice output: the sink that plays one frame stream at a time for a guild,
//! and the connector that opens it.
//!
//! Completion is reported through a [`CompletionNotifier`], which posts a
//! [`Completion`] into the owning player's inbox instead of calling back into
//! it. Songbird fires track events from its own driver task; nothing in here
//! touches player state directly.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::Input,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{MusicError, MusicResult};

/// End of one playback attempt, tagged with the generation it was started under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub generation: u64,
    pub outcome: Result<(), String>,
}

/// One-shot handle given to a sink on `start`.
///
/// Clones share the fired flag, so however many track events a driver
/// raises, at most one completion reaches the inbox.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    tx: mpsc::UnboundedSender<Completion>,
    generation: u64,
    fired: Arc<AtomicBool>,
}

impl CompletionNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Completion>, generation: u64) -> Self {
        Self {
            tx,
            generation,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false if this attempt was already reported or the player is gone.
    pub fn notify(&self, outcome: Result<(), String>) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tx
            .send(Completion {
                generation: self.generation,
                outcome,
            })
            .is_ok()
    }
}

#[async_trait]
pub trait OutputSink: Send + 'static {
    type Stream: Send + 'static;

    async fn start(
        &mut self,
        stream: Self::Stream,
        volume: f32,
        notifier: CompletionNotifier,
    ) -> MusicResult<()>;

    /// Halts the active stream. The notifier given to `start` still fires.
    fn stop(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    fn set_volume(&mut self, volume: f32);

    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Releases the underlying voice connection.
    async fn disconnect(&mut self) -> MusicResult<()>;
}

#[async_trait]
pub trait VoiceConnector: Send + Sync + 'static {
    type Sink: OutputSink;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<Self::Sink>;
}

/// Sink respaldado por una llamada de songbird
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    track: Option<TrackHandle>,
    active: Arc<AtomicBool>,
    paused: bool,
}

impl SongbirdSink {
    fn new(manager: Arc<Songbird>, guild_id: GuildId, call: Arc<Mutex<Call>>) -> Self {
        Self {
            manager,
            guild_id,
            call,
            track: None,
            active: Arc::new(AtomicBool::new(false)),
            paused: false,
        }
    }
}

// La Call sobrevive al sink dentro del manager: un track sin parar seguiría
// sonando al reutilizarla en el próximo join.
impl Drop for SongbirdSink {
    fn drop(&mut self) {
        if let Some(track) = self.track.take() {
            let _ = track.stop();
        }
    }
}

#[async_trait]
impl OutputSink for SongbirdSink {
    type Stream = Input;

    async fn start(
        &mut self,
        stream: Input,
        volume: f32,
        notifier: CompletionNotifier,
    ) -> MusicResult<()> {
        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(stream)
        };
        let _ = handle.set_volume(volume);

        let active = Arc::new(AtomicBool::new(true));
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackCompletionHandler {
                        guild_id: self.guild_id,
                        notifier: notifier.clone(),
                        active: active.clone(),
                    },
                )
                .map_err(|e| {
                    MusicError::ConnectionError(format!("voice driver rejected track events: {e}"))
                })?;
        }

        self.track = Some(handle);
        self.active = active;
        self.paused = false;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(track) = &self.track {
            let _ = track.stop();
        }
        self.paused = false;
    }

    fn pause(&mut self) {
        if let Some(track) = &self.track {
            let _ = track.pause();
            self.paused = true;
        }
    }

    fn resume(&mut self) {
        if let Some(track) = &self.track {
            let _ = track.play();
            self.paused = false;
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(track) = &self.track {
            let _ = track.set_volume(volume);
        }
    }

    fn is_playing(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.paused
    }

    fn is_paused(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.paused
    }

    async fn disconnect(&mut self) -> MusicResult<()> {
        self.stop();
        self.track = None;
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| MusicError::ConnectionError(e.to_string()))?;
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }
}

/// Handler para End/Error de un track: reenvía el resultado al inbox del player
struct TrackCompletionHandler {
    guild_id: GuildId,
    notifier: CompletionNotifier,
    active: Arc<AtomicBool>,
}

#[async_trait]
impl VoiceEventHandler for TrackCompletionHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = match ctx {
            EventContext::Track(tracks) => tracks
                .iter()
                .find_map(|(state, _handle)| match &state.playing {
                    PlayMode::Errored(e) => Some(format!("{e:?}")),
                    _ => None,
                })
                .map_or(Ok(()), Err),
            _ => Ok(()),
        };

        if let Err(reason) = &outcome {
            warn!("❌ Error en track para guild {}: {}", self.guild_id, reason);
        }

        self.active.store(false, Ordering::Release);
        if !self.notifier.notify(outcome) {
            debug!(
                "Completion for generation {} in guild {} already reported",
                self.notifier.generation(),
                self.guild_id
            );
        }

        None
    }
}

/// Opens songbird calls for guild players.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    type Sink = SongbirdSink;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<SongbirdSink> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::ConnectionError(e.to_string()))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(SongbirdSink::new(self.manager.clone(), guild_id, call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifier_fires_at_most_once_across_clones() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = CompletionNotifier::new(tx, 7);
        let twin = notifier.clone();

        assert!(notifier.notify(Ok(())));
        assert!(!twin.notify(Err("late error".into())));

        assert_eq!(
            rx.recv().await,
            Some(Completion {
                generation: 7,
                outcome: Ok(())
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn notifier_reports_closed_inbox() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let notifier = CompletionNotifier::new(tx, 1);
        assert!(!notifier.notify(Ok(())));
    }
}
