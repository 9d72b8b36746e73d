//! Plain-text replies sent back to the invoking channel.

use crate::audio::{
    player::{JoinOutcome, PlaybackState, PlayOutcome, PlayerSnapshot, VolumeOutcome},
    queue::TrackRef,
};

/// (name, arguments, description) for every text command, in help order.
pub const COMMAND_HELP: &[(&str, &str, &str)] = &[
    ("join", "", "Connects the bot to your voice channel."),
    ("leave", "", "Disconnects the bot from the voice channel."),
    ("play", "[url]", "Plays a song, or resumes the queue when no url is given."),
    ("stop", "", "Stops the currently playing song."),
    ("pause", "", "Pauses the currently playing song."),
    ("resume", "", "Resumes playback after pausing."),
    ("skip", "", "Skips to the next song in the queue."),
    ("queue", "", "Shows the current playback queue."),
    ("nowplaying", "", "Shows the song that is playing."),
    ("remove", "<index>", "Removes a song from the queue by index."),
    ("clear", "", "Clears the entire playback queue."),
    ("volume", "<0-100>", "Sets the playback volume (0-100)."),
    ("quality", "<high|medium|low>", "Sets the playback quality (high, medium, low)."),
    ("ping", "", "Check if the bot is alive and responsive."),
    ("help", "", "Shows this message."),
    ("set_prefix", "<prefix>", "Sets the command prefix for the server."),
    ("get_prefix", "", "Retrieves the current command prefix for the server."),
    ("set_channel", "<#channel> <music|log>", "Sets a specific channel for bot actions."),
];

pub fn help(prefix: &str) -> String {
    let mut text = String::from("🎵 **Commands**\n");
    for (name, args, description) in COMMAND_HELP {
        let usage = if args.is_empty() {
            format!("{}{}", prefix, name)
        } else {
            format!("{}{} {}", prefix, name, args)
        };
        text.push_str(&format!("`{}` - {}\n", usage, description));
    }
    text
}

pub fn queue_listing(queue: &[TrackRef]) -> String {
    if queue.is_empty() {
        return "Queue is empty.".to_string();
    }
    let tracks: Vec<&str> = queue.iter().map(TrackRef::as_str).collect();
    format!("Queue: {}", tracks.join(", "))
}

pub fn now_playing(snapshot: &PlayerSnapshot) -> String {
    match (&snapshot.current_track, snapshot.state) {
        (Some(track), PlaybackState::Paused) => format!(
            "⏸️ Paused: {} ({}% volume, {} quality)",
            track, snapshot.volume_percent, snapshot.quality
        ),
        (Some(track), _) => format!(
            "🎵 Now playing: {} ({}% volume, {} quality)",
            track, snapshot.volume_percent, snapshot.quality
        ),
        (None, _) => "Nothing is playing.".to_string(),
    }
}

pub fn join(outcome: &JoinOutcome) -> String {
    match outcome {
        JoinOutcome::Joined(channel) => format!("🔊 Joined <#{}>", channel),
        JoinOutcome::AlreadyConnected => "Already connected to a voice channel.".to_string(),
    }
}

pub fn play(outcome: &PlayOutcome) -> String {
    match outcome {
        PlayOutcome::Started(track) => format!("Now playing: {}", track),
        PlayOutcome::Queued {
            position: Some(position),
            ..
        } => format!("Added to queue at position {}.", position),
        PlayOutcome::Queued {
            current,
            position: None,
        } => format!("Already playing: {}", current),
    }
}

pub fn volume(outcome: VolumeOutcome) -> String {
    match outcome {
        VolumeOutcome::Applied(percent) => format!("🔊 Volume set to {}%.", percent),
        VolumeOutcome::NothingPlaying => "Nothing is playing.".to_string(),
    }
}
