//! Error types for the playback subsystem.
//!
//! Every variant renders as a short user-facing sentence: command handlers
//! send `err.to_string()` straight back to the channel.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicError {
    #[error("You must be connected to a voice channel.")]
    NoVoiceChannel,

    #[error("Error joining voice channel: {0}")]
    ConnectionError(String),

    #[error("Queue is empty! Add some music.")]
    QueueEmpty,

    #[error("Error playing {track}: {reason}")]
    PlaybackError { track: String, reason: String },

    #[error("Nothing is playing.")]
    NotPlaying,

    #[error("The player is not paused.")]
    NotPaused,

    #[error("Not connected to any voice channel.")]
    NotConnected,

    #[error("Invalid playback quality '{0}'. Choose from 'high', 'medium', or 'low'.")]
    InvalidQuality(String),

    #[error("Invalid queue index {index} (queue has {len} tracks).")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Could not transcode track: {0}")]
    TranscodeError(String),

    /// The player was evicted while a command still held it; retry on a fresh one.
    #[error("The player for this server was just shut down. Please try again.")]
    PlayerRetired,
}

pub type MusicResult<T> = std::result::Result<T, MusicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(MusicError::NotPlaying.to_string(), "Nothing is playing.");
        assert_eq!(
            MusicError::IndexOutOfRange { index: 5, len: 2 }.to_string(),
            "Invalid queue index 5 (queue has 2 tracks)."
        );
        assert!(MusicError::InvalidQuality("ultra".into())
            .to_string()
            .contains("'ultra'"));
    }
}
