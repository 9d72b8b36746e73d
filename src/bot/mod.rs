//! # Bot Module
//!
//! Discord gateway glue for guildtune.
//!
//! - Prefix text commands parsed by [`commands`] and executed by [`handlers`]
//! - Settings writes gated by an [`permissions::Authorizer`]
//! - Voice state updates that release a player's sink when Discord drops the bot
//!
//! The bot is built around [`GuildTuneBot`], which implements Serenity's
//! [`EventHandler`] trait and owns the [`PlayerRegistry`].

use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod permissions;

use crate::{
    audio::{registry::PlayerRegistry, sink::SongbirdSink},
    bot::{commands::CommandParseError, permissions::Authorizer},
    config::Config,
    storage::{ChannelPurpose, GuildSettingsStore},
};

/// Main Discord handler.
///
/// All fields are shared: serenity runs event callbacks concurrently, and the
/// registry serializes per-guild work inside each player.
pub struct GuildTuneBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    /// Per-guild prefix and channel settings
    storage: Arc<dyn GuildSettingsStore>,
    /// One player per guild, created on first command
    registry: Arc<PlayerRegistry<SongbirdSink>>,
    authorizer: Arc<dyn Authorizer>,
}

impl GuildTuneBot {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<dyn GuildSettingsStore>,
        registry: Arc<PlayerRegistry<SongbirdSink>>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            config,
            storage,
            registry,
            authorizer,
        }
    }

    /// Prefijo configurado para la guild, o el global
    async fn prefix_for(&self, guild_id: GuildId) -> String {
        match self.storage.get_prefix(guild_id).await {
            Ok(Some(prefix)) => prefix,
            Ok(None) => self.config.command_prefix.clone(),
            Err(e) => {
                warn!("No se pudo leer el prefijo de guild {}: {:?}", guild_id, e);
                self.config.command_prefix.clone()
            }
        }
    }

    /// The configured music channel, else the channel the command came from.
    async fn announce_channel(&self, guild_id: GuildId, fallback: ChannelId) -> ChannelId {
        self.storage
            .get_channel(guild_id, ChannelPurpose::Music)
            .await
            .ok()
            .flatten()
            .unwrap_or(fallback)
    }

    /// Mirrors a command failure into the guild's log channel, if one is set.
    async fn log_error(&self, ctx: &Context, guild_id: GuildId, text: &str) {
        let channel = match self.storage.get_channel(guild_id, ChannelPurpose::Log).await {
            Ok(Some(channel)) => channel,
            _ => return,
        };
        if let Err(e) = channel.say(&ctx.http, format!("⚠️ {}", text)).await {
            warn!("No se pudo escribir en el canal de logs de guild {}: {:?}", guild_id, e);
        }
    }
}

#[async_trait]
impl EventHandler for GuildTuneBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
    }

    /// Parses and executes prefix commands from guild text channels.
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let prefix = self.prefix_for(guild_id).await;
        let command = match commands::parse(&msg.content, &prefix) {
            None => return,
            Some(Err(CommandParseError::Unknown(name))) => {
                debug!("Comando desconocido '{}' en guild {}", name, guild_id);
                return;
            }
            Some(Err(e)) => {
                reply(&ctx, &msg, &format!("❌ {}", e)).await;
                return;
            }
            Some(Ok(command)) => command,
        };

        match handlers::handle_command(&ctx, &msg, guild_id, command, &prefix, self).await {
            Ok(text) => reply(&ctx, &msg, &text).await,
            Err(e) => {
                error!("Error manejando comando en guild {}: {:?}", guild_id, e);
                reply(&ctx, &msg, "❌ Something went wrong while running that command.").await;
                self.log_error(&ctx, guild_id, &format!("{:#}", e)).await;
            }
        }
    }

    /// Releases the player's sink when the bot is removed from voice.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };
        if old.and_then(|o| o.channel_id).is_none() {
            return;
        }

        info!("🔌 Bot desconectado en guild {}", guild_id);
        if let Some(player) = self.registry.get(guild_id) {
            player.handle_disconnect().await;
            drop(player);
            self.registry.evict_if_idle(guild_id);
        }
    }
}

async fn reply(ctx: &Context, msg: &Message, text: &str) {
    if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
        error!("Error al responder en canal {}: {:?}", msg.channel_id, e);
    }
}
