//! In-memory stand-ins for the voice transport, used by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;

use crate::{
    audio::{
        player::{CompletionInbox, GuildPlayer, PlayerDeps},
        queue::TrackRef,
        sink::{Completion, CompletionNotifier, OutputSink, VoiceConnector},
        transcoder::{Quality, Transcoder},
    },
    error::{MusicError, MusicResult},
    ui::announcer::Announcer,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Started(TrackRef),
    Stopped,
    Paused,
    Resumed,
    Volume(f32),
    Disconnected,
}

#[derive(Default)]
pub struct TransportLog {
    events: Mutex<Vec<SinkEvent>>,
    notifier: Mutex<Option<CompletionNotifier>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl TransportLog {
    fn record(&self, event: SinkEvent) {
        self.events.lock().push(event);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Ends the active stream the way a driver would.
    fn fire(&self, outcome: Result<(), String>) {
        if let Some(notifier) = self.notifier.lock().take() {
            notifier.notify(outcome);
        }
    }
}

pub struct FakeSink {
    log: Arc<TransportLog>,
    active: bool,
    paused: bool,
}

#[async_trait]
impl OutputSink for FakeSink {
    type Stream = TrackRef;

    async fn start(
        &mut self,
        stream: TrackRef,
        _volume: f32,
        notifier: CompletionNotifier,
    ) -> MusicResult<()> {
        self.log.record(SinkEvent::Started(stream));
        *self.log.notifier.lock() = Some(notifier);
        self.active = true;
        self.paused = false;
        Ok(())
    }

    fn stop(&mut self) {
        self.log.record(SinkEvent::Stopped);
        self.active = false;
        self.paused = false;
        self.log.fire(Ok(()));
    }

    fn pause(&mut self) {
        self.log.record(SinkEvent::Paused);
        self.paused = true;
    }

    fn resume(&mut self) {
        self.log.record(SinkEvent::Resumed);
        self.paused = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.record(SinkEvent::Volume(volume));
    }

    fn is_playing(&self) -> bool {
        self.active && !self.paused
    }

    fn is_paused(&self) -> bool {
        self.active && self.paused
    }

    async fn disconnect(&mut self) -> MusicResult<()> {
        self.stop();
        self.log.record(SinkEvent::Disconnected);
        self.log.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeConnector {
    log: Arc<TransportLog>,
    refuse: bool,
    hang: bool,
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    type Sink = FakeSink;

    async fn connect(&self, _guild_id: GuildId, _channel_id: ChannelId) -> MusicResult<FakeSink> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(MusicError::ConnectionError("transport refused".into()));
        }
        Ok(FakeSink {
            log: self.log.clone(),
            active: false,
            paused: false,
        })
    }
}

pub struct FakeTranscoder {
    failing: HashSet<String>,
    hanging: HashSet<String>,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    type Stream = TrackRef;

    async fn transcode(&self, track: &TrackRef, _quality: Quality) -> MusicResult<TrackRef> {
        if self.hanging.contains(track.as_str()) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(track.as_str()) {
            return Err(MusicError::TranscodeError("unsupported format".into()));
        }
        Ok(track.clone())
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    messages: Mutex<Vec<(ChannelId, String)>>,
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, channel_id: ChannelId, text: &str) {
        self.messages.lock().push((channel_id, text.to_string()));
    }
}

/// Blocks inside `announce` until released, to observe the player meanwhile.
#[derive(Default)]
pub struct GatedAnnouncer {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl Announcer for GatedAnnouncer {
    async fn announce(&self, _channel_id: ChannelId, _text: &str) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// How the fake transport misbehaves.
#[derive(Default)]
pub struct FakeBehavior {
    /// Tracks whose transcode fails.
    pub failing: Vec<&'static str>,
    /// Tracks whose transcode never finishes.
    pub hanging: Vec<&'static str>,
    pub refuse_connect: bool,
    pub hang_connect: bool,
}

pub fn fake_deps(
    log: Arc<TransportLog>,
    announcer: Arc<dyn Announcer>,
    behavior: FakeBehavior,
) -> PlayerDeps<FakeSink> {
    PlayerDeps {
        connector: Arc::new(FakeConnector {
            log,
            refuse: behavior.refuse_connect,
            hang: behavior.hang_connect,
        }),
        transcoder: Arc::new(FakeTranscoder {
            failing: track_set(&behavior.failing),
            hanging: track_set(&behavior.hanging),
        }),
        announcer,
        default_volume: 0.5,
        connect_timeout: Duration::from_secs(1),
        transcode_timeout: Duration::from_secs(1),
    }
}

fn track_set(tracks: &[&str]) -> HashSet<String> {
    tracks.iter().map(|s| s.to_string()).collect()
}

/// A player wired to fakes, with its inbox held by the test.
pub struct Harness {
    pub player: Arc<GuildPlayer<FakeSink>>,
    inbox: CompletionInbox,
    log: Arc<TransportLog>,
    announcer: Arc<RecordingAnnouncer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_behavior(FakeBehavior::default())
    }

    pub fn with_failing_tracks(failing: &[&'static str]) -> Self {
        Self::with_behavior(FakeBehavior {
            failing: failing.to_vec(),
            ..FakeBehavior::default()
        })
    }

    pub fn refusing_connections() -> Self {
        Self::with_behavior(FakeBehavior {
            refuse_connect: true,
            ..FakeBehavior::default()
        })
    }

    pub fn with_behavior(behavior: FakeBehavior) -> Self {
        Self::build(behavior, None)
    }

    pub fn with_announcer(announcer: Arc<dyn Announcer>, failing: &[&'static str]) -> Self {
        let behavior = FakeBehavior {
            failing: failing.to_vec(),
            ..FakeBehavior::default()
        };
        Self::build(behavior, Some(announcer))
    }

    fn build(behavior: FakeBehavior, announcer: Option<Arc<dyn Announcer>>) -> Self {
        let log = Arc::new(TransportLog::default());
        let recording = Arc::new(RecordingAnnouncer::default());
        let announcer = announcer.unwrap_or_else(|| recording.clone() as Arc<dyn Announcer>);
        let deps = fake_deps(log.clone(), announcer, behavior);
        let (player, inbox) = GuildPlayer::new(GuildId::new(1), ChannelId::new(100), deps);
        Self {
            player,
            inbox,
            log,
            announcer: recording,
        }
    }

    pub fn finish_current(&self, outcome: Result<(), String>) {
        self.log.fire(outcome);
    }

    pub async fn next_completion(&mut self) -> Completion {
        tokio::time::timeout(Duration::from_secs(1), self.inbox.recv())
            .await
            .expect("no completion arrived")
            .expect("inbox closed")
    }

    pub fn announcements(&self) -> Vec<String> {
        self.announcer
            .messages
            .lock()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn sink_events(&self) -> Vec<SinkEvent> {
        self.log.events.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.log.connects()
    }

    pub fn disconnects(&self) -> usize {
        self.log.disconnects.load(Ordering::SeqCst)
    }
}
