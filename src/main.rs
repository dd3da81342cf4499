use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{
    handoff::{self, CompletionHandoff},
    player::AudioPlayer,
    reaper::IdleReaper,
    store::SessionStore,
    voice::SongbirdBackend,
};
use crate::bot::JukeboxBot;
use crate::config::Config;
use crate::sources::{MetadataService, SpotifyClient, TrackResolver, YtDlpClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());

    // Extracción y metadatos
    let ytdlp = YtDlpClient::new(
        config.ytdlp_path.clone(),
        config.extraction_timeout,
        config.resolve_concurrency,
        config.max_playlist_size,
    );
    match ytdlp.verify().await {
        Ok(version) => info!("✅ yt-dlp {}", version),
        Err(e) => warn!("⚠️ yt-dlp no disponible: {:?}", e),
    }

    let spotify: Option<Arc<dyn MetadataService>> = match config.spotify_credentials() {
        Some((id, secret)) => Some(Arc::new(SpotifyClient::new(id, secret, config.max_playlist_size)?)),
        None => {
            info!("ℹ️ Spotify deshabilitado (sin credenciales)");
            None
        }
    };
    let resolver = TrackResolver::new(Arc::new(ytdlp), spotify, config.resolve_concurrency);

    // Voz y sesiones
    let songbird = Songbird::serenity();
    let (completions, completion_rx) = handoff::channel();
    let backend = Arc::new(SongbirdBackend::new(songbird.clone(), completions)?);
    let store = Arc::new(SessionStore::new(backend.clone(), backend));
    let player = Arc::new(AudioPlayer::new(store.clone(), resolver));

    // Tareas de fondo
    let shutdown = CancellationToken::new();
    tokio::spawn(CompletionHandoff::new(completion_rx, store.clone(), config.advance_delay).run(shutdown.clone()));
    tokio::spawn(IdleReaper::new(store.clone(), config.idle_timeout, config.reaper_interval).run(shutdown.clone()));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Crear handler del bot
    let handler = JukeboxBot::new(config.clone(), player);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
