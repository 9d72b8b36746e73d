use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, warn};

/// What a configured text channel is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPurpose {
    Music,
    Log,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid action '{0}'. Please use 'music' or 'log'.")]
pub struct UnknownPurpose(pub String);

impl FromStr for ChannelPurpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "music" => Ok(ChannelPurpose::Music),
            "log" => Ok(ChannelPurpose::Log),
            _ => Err(UnknownPurpose(s.to_string())),
        }
    }
}

impl fmt::Display for ChannelPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelPurpose::Music => f.write_str("music"),
            ChannelPurpose::Log => f.write_str("log"),
        }
    }
}

/// Configuración de servidor almacenada en JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub prefix: Option<String>,
    pub music_channel_id: Option<u64>,
    pub log_channel_id: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GuildSettings {
    fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            ..Self::default()
        }
    }

    pub fn channel(&self, purpose: ChannelPurpose) -> Option<ChannelId> {
        let raw = match purpose {
            ChannelPurpose::Music => self.music_channel_id,
            ChannelPurpose::Log => self.log_channel_id,
        };
        raw.filter(|id| *id != 0).map(ChannelId::new)
    }

    fn set_channel(&mut self, purpose: ChannelPurpose, channel_id: ChannelId) {
        let slot = match purpose {
            ChannelPurpose::Music => &mut self.music_channel_id,
            ChannelPurpose::Log => &mut self.log_channel_id,
        };
        *slot = Some(channel_id.get());
    }
}

/// Per-guild key/value settings. The backing store is swappable.
#[async_trait]
pub trait GuildSettingsStore: Send + Sync {
    async fn set_prefix(&self, guild_id: GuildId, prefix: &str) -> Result<()>;

    async fn get_prefix(&self, guild_id: GuildId) -> Result<Option<String>>;

    async fn set_channel(
        &self,
        guild_id: GuildId,
        purpose: ChannelPurpose,
        channel_id: ChannelId,
    ) -> Result<()>;

    async fn get_channel(&self, guild_id: GuildId, purpose: ChannelPurpose)
        -> Result<Option<ChannelId>>;
}

/// Manager de almacenamiento basado en archivos JSON, uno por guild.
pub struct JsonStorage {
    data_dir: PathBuf,
    servers_cache: RwLock<HashMap<u64, GuildSettings>>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        let servers_dir = data_dir.join("servers");
        fs::create_dir_all(&servers_dir)
            .await
            .with_context(|| format!("No se pudo crear {}", servers_dir.display()))?;

        info!("📁 Storage inicializado en: {}", data_dir.display());

        let storage = Self {
            data_dir,
            servers_cache: RwLock::new(HashMap::new()),
        };
        storage.load_all_servers().await?;
        Ok(storage)
    }

    fn server_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir
            .join("servers")
            .join(format!("guild_{}.json", guild_id))
    }

    /// Carga todas las configuraciones existentes en memoria
    async fn load_all_servers(&self) -> Result<()> {
        let mut entries = fs::read_dir(self.data_dir.join("servers")).await?;
        let mut loaded = HashMap::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<GuildSettings>(&content) {
                    Ok(settings) => {
                        loaded.insert(settings.guild_id, settings);
                    }
                    Err(e) => warn!("Configuración inválida en {}: {}", path.display(), e),
                },
                Err(e) => error!("Error leyendo {}: {}", path.display(), e),
            }
        }

        info!("📂 {} configuraciones de servidor cargadas", loaded.len());
        *self.servers_cache.write() = loaded;
        Ok(())
    }

    async fn save_server_config(&self, settings: &GuildSettings) -> Result<()> {
        let path = self.server_path(settings.guild_id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(settings)?;

        fs::write(&tmp, content)
            .await
            .with_context(|| format!("Error escribiendo {}", tmp.display()))?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Aplica un cambio a la configuración de la guild y la persiste
    async fn update(&self, guild_id: GuildId, change: impl FnOnce(&mut GuildSettings)) -> Result<()> {
        let snapshot = {
            let mut servers = self.servers_cache.write();
            let settings = servers
                .entry(guild_id.get())
                .or_insert_with(|| GuildSettings::new(guild_id.get()));
            change(settings);
            settings.updated_at = Some(Utc::now());
            settings.clone()
        };

        self.save_server_config(&snapshot).await?;
        info!("💾 Configuración actualizada para guild {}", guild_id);
        Ok(())
    }

    pub fn settings(&self, guild_id: GuildId) -> Option<GuildSettings> {
        self.servers_cache.read().get(&guild_id.get()).cloned()
    }
}

#[async_trait]
impl GuildSettingsStore for JsonStorage {
    async fn set_prefix(&self, guild_id: GuildId, prefix: &str) -> Result<()> {
        let prefix = prefix.to_string();
        self.update(guild_id, move |settings| settings.prefix = Some(prefix))
            .await
    }

    async fn get_prefix(&self, guild_id: GuildId) -> Result<Option<String>> {
        Ok(self.settings(guild_id).and_then(|s| s.prefix))
    }

    async fn set_channel(
        &self,
        guild_id: GuildId,
        purpose: ChannelPurpose,
        channel_id: ChannelId,
    ) -> Result<()> {
        self.update(guild_id, |settings| settings.set_channel(purpose, channel_id))
            .await
    }

    async fn get_channel(
        &self,
        guild_id: GuildId,
        purpose: ChannelPurpose,
    ) -> Result<Option<ChannelId>> {
        Ok(self.settings(guild_id).and_then(|s| s.channel(purpose)))
    }
}
