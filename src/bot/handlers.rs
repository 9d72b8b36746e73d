use anyhow::Result;
use serenity::{
    cache::Cache,
    model::{
        channel::Message,
        id::{ChannelId, GuildId, RoleId, UserId},
    },
    prelude::Context,
};
use std::time::Instant;
use tracing::{info, warn};

use crate::{
    audio::{player::GuildPlayer, queue::TrackRef, sink::OutputSink},
    bot::{
        commands::{Command, ConfigCommand, MusicCommand},
        permissions::Authorizer,
        GuildTuneBot,
    },
    error::MusicResult,
    storage::{ChannelPurpose, GuildSettingsStore},
    ui::messages,
};

/// Ejecuta un comando de texto y devuelve la respuesta para el canal
pub async fn handle_command(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    command: Command,
    prefix: &str,
    bot: &GuildTuneBot,
) -> Result<String> {
    info!(
        "📝 Comando {:?} usado por {} en guild {}",
        command, msg.author.name, guild_id
    );

    match command {
        Command::Music(music) => handle_music(ctx, msg, guild_id, music, bot).await,
        Command::Config(config) => handle_config(ctx, msg, guild_id, config, bot).await,
        Command::Ping => {
            let started = Instant::now();
            ctx.http.get_gateway().await?;
            Ok(format!("Pong! Latency: {}ms", started.elapsed().as_millis()))
        }
        Command::Help => Ok(messages::help(prefix)),
    }
}

async fn handle_music(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    command: MusicCommand,
    bot: &GuildTuneBot,
) -> Result<String> {
    let voice = get_user_voice_channel(ctx, guild_id, msg.author.id);
    let announce = bot.announce_channel(guild_id, msg.channel_id).await;

    let leaving = command == MusicCommand::Leave;
    let result = bot
        .registry
        .run(guild_id, announce, |player| {
            let command = command.clone();
            async move { execute_music(&player, command, voice).await }
        })
        .await;
    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Comando fallido en guild {}: {}", guild_id, e);
            format!("❌ {}", e)
        }
    };

    if leaving {
        bot.registry.evict_if_idle(guild_id);
    }
    Ok(reply)
}

/// Maps one playback command onto the player. Errors are caller-local.
pub async fn execute_music<S: OutputSink>(
    player: &GuildPlayer<S>,
    command: MusicCommand,
    voice: Option<ChannelId>,
) -> MusicResult<String> {
    let reply = match command {
        MusicCommand::Join => messages::join(&player.join(voice).await?),
        MusicCommand::Leave => {
            player.leave().await?;
            "👋 Disconnected from the voice channel.".to_string()
        }
        MusicCommand::Play(url) => {
            messages::play(&player.play(url.map(TrackRef::from), voice).await?)
        }
        MusicCommand::Stop => format!("⏹️ Stopped {}.", player.stop().await?),
        MusicCommand::Pause => {
            player.pause().await?;
            "⏸️ Paused.".to_string()
        }
        MusicCommand::Resume => {
            player.resume().await?;
            "▶️ Resumed.".to_string()
        }
        MusicCommand::Skip => format!("⏭️ Skipped {}.", player.skip().await?),
        MusicCommand::Queue => messages::queue_listing(&player.snapshot().await?.queue),
        MusicCommand::NowPlaying => messages::now_playing(&player.snapshot().await?),
        MusicCommand::Remove(index) => {
            format!("Removed {} from the queue.", player.dequeue(index).await?)
        }
        MusicCommand::Clear => {
            format!("🗑️ Cleared {} tracks from the queue.", player.clear_queue().await?)
        }
        MusicCommand::Volume(percent) => messages::volume(player.set_volume(percent).await?),
        MusicCommand::Quality(level) => {
            format!("🎚️ Playback quality set to {}.", player.set_quality(&level).await?)
        }
    };
    Ok(reply)
}

async fn handle_config(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    command: ConfigCommand,
    bot: &GuildTuneBot,
) -> Result<String> {
    let roles = msg
        .member
        .as_ref()
        .map(|member| member.roles.clone())
        .unwrap_or_default();

    if !check_config_access(
        bot.authorizer.as_ref(),
        &ctx.cache,
        guild_id,
        msg.author.id,
        &roles,
        &command,
    ) {
        warn!("🚫 {} sin permisos para {:?} en guild {}", msg.author.name, command, guild_id);
        return Ok("❌ You need administrator permissions to do that.".to_string());
    }

    let reply = execute_config(
        bot.storage.as_ref(),
        guild_id,
        &command,
        &bot.config.command_prefix,
    )
    .await?;

    if let ConfigCommand::SetChannel {
        channel,
        purpose: ChannelPurpose::Music,
    } = command
    {
        if let Some(player) = bot.registry.get(guild_id) {
            player.set_announce_channel(channel).await;
        }
    }
    Ok(reply)
}

pub fn check_config_access(
    authorizer: &dyn Authorizer,
    cache: &Cache,
    guild_id: GuildId,
    user_id: UserId,
    roles: &[RoleId],
    command: &ConfigCommand,
) -> bool {
    !command.requires_admin() || authorizer.can_configure(cache, guild_id, user_id, roles)
}

/// Applies a settings command. Storage failures propagate.
pub async fn execute_config(
    store: &dyn GuildSettingsStore,
    guild_id: GuildId,
    command: &ConfigCommand,
    default_prefix: &str,
) -> Result<String> {
    match command {
        ConfigCommand::SetPrefix(prefix) => {
            store.set_prefix(guild_id, prefix).await?;
            Ok(format!("Command prefix set to `{}`.", prefix))
        }
        ConfigCommand::GetPrefix => {
            let prefix = store
                .get_prefix(guild_id)
                .await?
                .unwrap_or_else(|| default_prefix.to_string());
            Ok(format!("Current command prefix is `{}`.", prefix))
        }
        ConfigCommand::SetChannel { channel, purpose } => {
            store.set_channel(guild_id, *purpose, *channel).await?;
            Ok(format!("Set {} channel to <#{}>.", purpose, channel))
        }
    }
}

// Funciones auxiliares

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
