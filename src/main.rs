use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod storage;
mod ui;

use crate::audio::{
    player::PlayerDeps,
    registry::PlayerRegistry,
    sink::{SongbirdConnector, SongbirdSink},
    transcoder::FfmpegTranscoder,
};
use crate::bot::{permissions::AdministratorAuthorizer, GuildTuneBot};
use crate::config::Config;
use crate::storage::JsonStorage;
use crate::ui::announcer::ChannelAnnouncer;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guildtune=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando guildtune v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    // Inicializar almacenamiento JSON
    let storage = Arc::new(JsonStorage::new(config.data_dir.clone()).await?);

    // Voice manager, shared between the gateway and the players
    let manager = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));

    let deps: PlayerDeps<SongbirdSink> = PlayerDeps {
        connector: Arc::new(SongbirdConnector::new(manager.clone())),
        transcoder: Arc::new(FfmpegTranscoder::new(config.ffmpeg_path.clone())),
        announcer: Arc::new(ChannelAnnouncer::new(http)),
        default_volume: config.default_volume,
        connect_timeout: config.connect_timeout,
        transcode_timeout: config.transcode_timeout,
    };
    let registry = Arc::new(PlayerRegistry::new(deps));

    // Intents: text commands need MESSAGE_CONTENT
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = GuildTuneBot::new(
        config.clone(),
        storage,
        registry,
        Arc::new(AdministratorAuthorizer),
    );

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⚠️ Señal de shutdown recibida, cerrando...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Error al registrar Ctrl+C: {:?}", e),
        }
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let ffmpeg = async_process::Command::new(&config.ffmpeg_path)
        .arg("-version")
        .output()
        .await?;

    if ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg no disponible en {}", config.ffmpeg_path);
    }
}
