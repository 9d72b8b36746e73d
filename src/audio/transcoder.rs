use async_trait::async_trait;
use songbird::input::{ChildContainer, Input};
use std::{
    fmt,
    process::{Command, Stdio},
    str::FromStr,
};
use tracing::{debug, info};

use crate::{
    audio::queue::TrackRef,
    error::{MusicError, MusicResult},
};

/// Calidad de reproducción. Advisory: only changes the bitrate handed to ffmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    High,
    Medium,
    Low,
}

impl Quality {
    pub fn bitrate_kbps(self) -> u32 {
        match self {
            Quality::High => 128,
            Quality::Medium => 96,
            Quality::Low => 64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = MusicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Quality::High),
            "medium" => Ok(Quality::Medium),
            "low" => Ok(Quality::Low),
            _ => Err(MusicError::InvalidQuality(s.to_string())),
        }
    }
}

/// Converts a track reference into a decoded frame stream.
///
/// Implementations must not block on the whole source: the returned stream
/// is consumed incrementally by the output sink.
#[async_trait]
pub trait Transcoder: Send + Sync + 'static {
    type Stream: Send + 'static;

    async fn transcode(&self, track: &TrackRef, quality: Quality) -> MusicResult<Self::Stream>;
}

/// Transcoder backed by an `ffmpeg` child process writing ogg/opus to stdout.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn ffmpeg_args(track: &TrackRef, quality: Quality) -> Vec<String> {
        let bitrate = format!("{}k", quality.bitrate_kbps());
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            track.as_str(),
            "-vn",
            "-acodec",
            "libopus",
            "-b:a",
            bitrate.as_str(),
            "-ar",
            "48000",
            "-ac",
            "2",
            "-f",
            "ogg",
            "-",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    type Stream = Input;

    async fn transcode(&self, track: &TrackRef, quality: Quality) -> MusicResult<Input> {
        let program = self.ffmpeg_path.clone();
        let args = Self::ffmpeg_args(track, quality);
        debug!("🎛️ Lanzando {} {:?}", program, args);

        let child = tokio::task::spawn_blocking(move || {
            Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
        })
        .await
        .map_err(|e| MusicError::TranscodeError(format!("transcoder task failed: {e}")))?
        .map_err(|e| MusicError::TranscodeError(format!("failed to spawn ffmpeg: {e}")))?;

        info!("🎵 ffmpeg iniciado para: {} ({})", track, quality);
        Ok(Input::from(ChildContainer::from(child)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_parsing_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Quality>().unwrap(), Quality::High);
        assert_eq!("Medium".parse::<Quality>().unwrap(), Quality::Medium);
        assert_eq!(" low ".parse::<Quality>().unwrap(), Quality::Low);
        assert_eq!(
            "ultra".parse::<Quality>().unwrap_err(),
            MusicError::InvalidQuality("ultra".into())
        );
    }

    #[test]
    fn ffmpeg_args_pass_track_verbatim_and_bitrate() {
        let track = TrackRef::from("https://example.com/a song.mp3?x=1");
        let args = FfmpegTranscoder::ffmpeg_args(&track, Quality::Low);

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "https://example.com/a song.mp3?x=1");

        let bitrate = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[bitrate + 1], "64k");
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_transcode_error() {
        let transcoder = FfmpegTranscoder::new("/nonexistent/bin/ffmpeg-missing");
        let result = transcoder
            .transcode(&TrackRef::from("song.mp3"), Quality::High)
            .await;
        assert!(matches!(result, Err(MusicError::TranscodeError(msg)) if msg.contains("spawn")));
    }
}
