//! # Audio Module
//!
//! Per-guild music playback for the bot.
//!
//! ## Architecture
//!
//! ### [`transcoder`] - Media Transcoder
//! - Turns an opaque track reference into a decoded frame stream (ffmpeg)
//! - Playback quality only affects the requested bitrate
//!
//! ### [`sink`] - Voice Output
//! - One songbird call per guild, one stream at a time
//! - Track End/Error events are posted to the player's inbox, never called back
//!
//! ### [`player`] - Guild Player
//! - Queue, current track, volume and quality for one guild
//! - Play/pause/resume/skip/stop state machine
//! - Generation counter so a superseded stream cannot advance the queue
//!
//! ### [`registry`] - Player Registry
//! - Guild → player map, lazily populated, evicted on idle `leave`
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let registry = PlayerRegistry::new(deps);
//! let player = registry.get_or_create(guild_id, text_channel);
//!
//! player.play(Some("https://example.com/song.mp3".into()), voice_channel).await?;
//! player.pause().await?;
//! player.resume().await?;
//! player.skip().await?;
//! ```

pub mod player;
pub mod queue;
pub mod registry;
pub mod sink;
pub mod transcoder;

#[cfg(test)]
pub(crate) mod testing;
