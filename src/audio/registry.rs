use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{future::Future, sync::Arc};
use tracing::{debug, info};

use crate::{
    audio::{
        player::{pump_completions, GuildPlayer, PlayerDeps},
        sink::OutputSink,
    },
    error::{MusicError, MusicResult},
};

// Each retry means a concurrent `leave` evicted the player we fetched.
const MAX_ATTEMPTS: usize = 3;

/// Process-scoped map of guild → player.
///
/// Players are created lazily by the first command for a guild and only
/// removed through [`PlayerRegistry::evict_if_idle`].
pub struct PlayerRegistry<S: OutputSink> {
    players: DashMap<GuildId, Arc<GuildPlayer<S>>>,
    deps: PlayerDeps<S>,
}

impl<S: OutputSink> PlayerRegistry<S> {
    pub fn new(deps: PlayerDeps<S>) -> Self {
        Self {
            players: DashMap::new(),
            deps,
        }
    }

    /// Obtiene el player de la guild o lo crea con estado por defecto.
    ///
    /// Creating a player also spawns the task that drains its completion
    /// inbox; must be called from within a tokio runtime.
    pub fn get_or_create(&self, guild_id: GuildId, announce_channel: ChannelId) -> Arc<GuildPlayer<S>> {
        if let Some(player) = self.players.get(&guild_id) {
            return player.clone();
        }

        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                let (player, inbox) = GuildPlayer::new(guild_id, announce_channel, self.deps.clone());
                tokio::spawn(pump_completions(Arc::downgrade(&player), inbox));
                info!("🎶 Player creado para guild {}", guild_id);
                player
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer<S>>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    /// Runs `op` against the guild's player, fetching a fresh one if the
    /// player it got was evicted before `op` could lock it.
    pub async fn run<T, F, Fut>(
        &self,
        guild_id: GuildId,
        announce_channel: ChannelId,
        op: F,
    ) -> MusicResult<T>
    where
        F: Fn(Arc<GuildPlayer<S>>) -> Fut,
        Fut: Future<Output = MusicResult<T>>,
    {
        let mut attempt = 1;
        loop {
            let player = self.get_or_create(guild_id, announce_channel);
            match op(player).await {
                Err(MusicError::PlayerRetired) if attempt < MAX_ATTEMPTS => {
                    debug!("Player retirado en guild {}, reintentando", guild_id);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Drops the guild's player when it has no sink, no current track and an
    /// empty queue. Returns whether it was removed.
    ///
    /// The player is retired under its own lock inside the map's removal, so
    /// a clone held elsewhere can no longer be used to connect.
    pub fn evict_if_idle(&self, guild_id: GuildId) -> bool {
        let removed = self
            .players
            .remove_if(&guild_id, |_, player| player.try_retire())
            .is_some();
        if removed {
            debug!("🧹 Player eliminado para guild {}", guild_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }
}
