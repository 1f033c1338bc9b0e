use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod bot;
mod config;
mod connector;
mod session;
mod sources;
mod ui;

use crate::bot::SessionBot;
use crate::config::Config;
use crate::connector::DiscordConnector;
use crate::session::{SessionDeps, SessionManager, SessionSettings};
use crate::sources::{AmbientLibrary, YtDlpResolver};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_music_sessions=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Music Sessions v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let resolver = YtDlpResolver::new(config.ytdlp_path.clone(), config.max_playlist_size);
    if let Err(e) = resolver.verify().await {
        warn!("⚠️ yt-dlp no verificado: {:?}", e);
    }
    let resolver = Arc::new(resolver);

    let ambient = Arc::new(AmbientLibrary::load(&config.elevator_dir).await?);
    if ambient.is_empty() {
        warn!("⚠️ Sin playlists ambientales: /elevator no estará disponible");
    }

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));
    let connector = Arc::new(DiscordConnector::new(http, songbird.clone()));

    let sessions = Arc::new(SessionManager::new(
        SessionDeps {
            connector,
            resolver: resolver.clone(),
            ambient,
        },
        SessionSettings::from(config.as_ref()),
    ));

    let handler = SessionBot::new(config.clone(), sessions.clone(), resolver);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!(
            "⚠️ Señal de shutdown recibida, cerrando {} sesiones...",
            sessions.len()
        );
        sessions.disconnect_all().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    let ytdlp_path = std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string());

    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new(&ytdlp_path)
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
