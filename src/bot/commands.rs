//! Text command parsing.
//!
//! Commands are plain messages starting with the guild prefix, e.g.
//! `!play https://example.com/song.mp3` or `!set_channel #music music`.

use serenity::model::id::ChannelId;
use thiserror::Error;

use crate::storage::{ChannelPurpose, UnknownPurpose};

/// Playback commands, routed to the guild's player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicCommand {
    Join,
    Leave,
    Play(Option<String>),
    Stop,
    Pause,
    Resume,
    Skip,
    Queue,
    NowPlaying,
    Remove(usize),
    Clear,
    Volume(i64),
    Quality(String),
}

/// Per-guild settings commands, routed to the settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    SetPrefix(String),
    GetPrefix,
    SetChannel {
        channel: ChannelId,
        purpose: ChannelPurpose,
    },
}

impl ConfigCommand {
    /// Writes need an administrator; reads don't.
    pub fn requires_admin(&self) -> bool {
        !matches!(self, ConfigCommand::GetPrefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Music(MusicCommand),
    Config(ConfigCommand),
    Ping,
    Help,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Unknown command '{0}'.")]
    Unknown(String),

    #[error("Missing argument. Usage: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid value '{value}'. Usage: {usage}")]
    InvalidArgument { value: String, usage: &'static str },

    #[error(transparent)]
    Purpose(#[from] UnknownPurpose),
}

/// Parses `content` if it starts with `prefix`.
///
/// Returns `None` for messages that aren't commands at all, so ordinary chat
/// never produces a reply.
pub fn parse(content: &str, prefix: &str) -> Option<Result<Command, CommandParseError>> {
    let body = content.trim_start().strip_prefix(prefix)?;
    let mut parts = body.splitn(2, char::is_whitespace);
    let name = parts.next().filter(|n| !n.is_empty())?;
    let rest = parts.next().map(str::trim).unwrap_or_default();

    Some(parse_command(&name.to_lowercase(), rest))
}

fn parse_command(name: &str, rest: &str) -> Result<Command, CommandParseError> {
    let music = |cmd| Ok(Command::Music(cmd));

    match name {
        "join" => music(MusicCommand::Join),
        "leave" => music(MusicCommand::Leave),
        "play" => music(MusicCommand::Play(
            Some(rest.to_string()).filter(|r| !r.is_empty()),
        )),
        "stop" => music(MusicCommand::Stop),
        "pause" => music(MusicCommand::Pause),
        "resume" => music(MusicCommand::Resume),
        "skip" => music(MusicCommand::Skip),
        "queue" => music(MusicCommand::Queue),
        "nowplaying" | "np" => music(MusicCommand::NowPlaying),
        "remove" => music(MusicCommand::Remove(number(rest, "remove <index>")?)),
        "clear" => music(MusicCommand::Clear),
        "volume" => music(MusicCommand::Volume(number(rest, "volume <0-100>")?)),
        "quality" => {
            let level = first_word(rest).ok_or(CommandParseError::MissingArgument(
                "quality <high|medium|low>",
            ))?;
            music(MusicCommand::Quality(level.to_string()))
        }
        "ping" => Ok(Command::Ping),
        "help" => Ok(Command::Help),
        "set_prefix" => {
            let prefix =
                first_word(rest).ok_or(CommandParseError::MissingArgument("set_prefix <prefix>"))?;
            Ok(Command::Config(ConfigCommand::SetPrefix(prefix.to_string())))
        }
        "get_prefix" => Ok(Command::Config(ConfigCommand::GetPrefix)),
        "set_channel" => parse_set_channel(rest),
        other => Err(CommandParseError::Unknown(other.to_string())),
    }
}

fn parse_set_channel(rest: &str) -> Result<Command, CommandParseError> {
    const USAGE: &str = "set_channel <#channel> <music|log>";

    let mut words = rest.split_whitespace();
    let (raw_channel, raw_purpose) = match (words.next(), words.next()) {
        (Some(c), Some(p)) => (c, p),
        _ => return Err(CommandParseError::MissingArgument(USAGE)),
    };

    let channel = channel_mention(raw_channel).ok_or_else(|| CommandParseError::InvalidArgument {
        value: raw_channel.to_string(),
        usage: USAGE,
    })?;
    let purpose = raw_purpose.parse::<ChannelPurpose>()?;

    Ok(Command::Config(ConfigCommand::SetChannel { channel, purpose }))
}

/// Accepts `<#123>` or a bare id.
fn channel_mention(raw: &str) -> Option<ChannelId> {
    let digits = raw
        .strip_prefix("<#")
        .and_then(|r| r.strip_suffix('>'))
        .unwrap_or(raw);
    digits
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
}

fn first_word(rest: &str) -> Option<&str> {
    rest.split_whitespace().next()
}

fn number<T: std::str::FromStr>(rest: &str, usage: &'static str) -> Result<T, CommandParseError> {
    let raw = first_word(rest).ok_or(CommandParseError::MissingArgument(usage))?;
    raw.parse().map_err(|_| CommandParseError::InvalidArgument {
        value: raw.to_string(),
        usage,
    })
}
