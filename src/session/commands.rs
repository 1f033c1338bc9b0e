//! Transition builders behind the public session API.
//!
//! Each builder captures its arguments and returns the transition closure;
//! applicability is decided inside the closure against the state the queue
//! hands over, never against a snapshot taken at call time.

use anyhow::{Context, Result};
use serenity::model::id::{ChannelId, UserId};
use std::{collections::VecDeque, future::Future, sync::Arc};
use tracing::{debug, info, warn};

use super::{
    state::{
        ActiveSession, ElevatorPlayback, MusicPlayback, PlaybackCommon, PlaybackValue,
        SessionState, Track,
    },
    SessionCore,
};
use crate::connector::{AudioResource, ConnectorError, PlayerHandle};

pub(crate) fn queue_tracks(
    core: Arc<SessionCore>,
    author: UserId,
    channel: ChannelId,
    state_channel: ChannelId,
    tracks: Vec<Track>,
) -> impl FnOnce(SessionState) -> TransitionFuture {
    move |state| {
        Box::pin(async move {
            let (mut state, fresh) = match state {
                SessionState::Disconnected => {
                    let music = PlaybackValue::Music(MusicPlayback::new(state_channel));
                    (open_episode(&core, channel, music).await?, true)
                }
                other => (other, false),
            };
            let connected = matches!(state, SessionState::Connected { .. });
            let max_queue_size = core.settings.max_queue_size;

            let Some(session) = state.active_mut() else {
                return Ok(state);
            };

            // Cambiar de modo cancela la playlist ambiental
            let switched = if let PlaybackValue::Elevator(elevator) = &session.playback {
                info!(
                    "🔄 Guild {}: modo ascensor reemplazado por cola de música",
                    core.guild_id
                );
                let common = PlaybackCommon {
                    is_paused: false,
                    ..elevator.common.clone()
                };
                session.playback = PlaybackValue::Music(MusicPlayback {
                    common,
                    current_track: None,
                    queue: VecDeque::new(),
                });
                true
            } else {
                false
            };

            if let PlaybackValue::Music(music) = &mut session.playback {
                let total = tracks.len();
                let accepted = total.min(max_queue_size.saturating_sub(music.queue.len()));
                let first_title = tracks.first().map(|t| t.title.clone());
                music.queue.extend(tracks.into_iter().take(accepted));
                info!(
                    "➕ Guild {}: {} canciones agregadas ({} en cola)",
                    core.guild_id,
                    accepted,
                    music.queue.len()
                );

                if !fresh && accepted > 0 {
                    music
                        .common
                        .pending_events
                        .push(tracks_added_notice(author, accepted, first_title.as_deref()));
                }
                if accepted < total {
                    music.common.pending_events.push(format!(
                        "⚠️ La cola está llena: {} canciones descartadas",
                        total - accepted
                    ));
                }
            }

            if switched && connected {
                return advance_music(&core, state).await;
            }
            Ok(state)
        })
    }
}

pub(crate) fn play_next_track(
    core: Arc<SessionCore>,
    author: UserId,
) -> impl FnOnce(SessionState) -> TransitionFuture {
    move |state| {
        Box::pin(async move {
            let SessionState::Connected { session, .. } = &state else {
                debug!("⏭️ Skip ignorado: la guild {} no está conectada", core.guild_id);
                return Ok(state);
            };
            let PlaybackValue::Music(music) = &session.playback else {
                debug!("⏭️ Skip ignorado en modo ascensor");
                return Ok(state);
            };

            if music.queue.is_empty() {
                info!("⏹️ Guild {}: skip con cola vacía, finalizando", core.guild_id);
                return Ok(teardown(&core, state, ConnectionTeardown::Destroy).await);
            }

            let notice = match &music.current_track {
                Some(track) => format!("⏭️ <@{}> saltó **{}**", author, track.title),
                None => format!("⏭️ <@{}> saltó la canción", author),
            };
            let mut state = state;
            if let Some(session) = state.active_mut() {
                session.playback.push_event(notice);
            }
            advance_music(&core, state).await
        })
    }
}

pub(crate) fn play_pause_track(
    core: Arc<SessionCore>,
) -> impl FnOnce(SessionState) -> TransitionFuture {
    move |mut state| {
        Box::pin(async move {
            let SessionState::Connected { session, .. } = &mut state else {
                debug!("⏯️ Pausa ignorada: la guild {} no está conectada", core.guild_id);
                return Ok(state);
            };
            let PlaybackValue::Music(music) = &mut session.playback else {
                debug!("⏯️ Pausa ignorada en modo ascensor");
                return Ok(state);
            };

            let connector = &core.deps.connector;
            let was_paused = music.common.is_paused;
            let applied = if was_paused {
                connector.unpause(&session.player).await
            } else {
                connector.pause(&session.player).await
            };

            if applied {
                music.common.is_paused = !was_paused;
                if was_paused {
                    info!("▶️ Reproducción reanudada en guild {}", core.guild_id);
                } else {
                    info!("⏸️ Reproducción pausada en guild {}", core.guild_id);
                }
            } else {
                warn!(
                    "⚠️ El player de la guild {} rechazó la pausa/reanudación",
                    core.guild_id
                );
            }
            Ok(state)
        })
    }
}

pub(crate) fn start_elevator(
    core: Arc<SessionCore>,
    channel: ChannelId,
    state_channel: ChannelId,
) -> impl FnOnce(SessionState) -> TransitionFuture {
    move |state| {
        Box::pin(async move {
            if !state.is_disconnected() {
                warn!(
                    "⚠️ Modo ascensor solicitado con la guild {} ya conectada; ignorado",
                    core.guild_id
                );
                return Ok(state);
            }

            let playlist = core
                .deps
                .ambient
                .pick_random()
                .context("No hay playlists ambientales disponibles")?;
            info!(
                "🛗 Guild {}: iniciando modo ascensor con {} archivos",
                core.guild_id,
                playlist.len()
            );

            let elevator = PlaybackValue::Elevator(ElevatorPlayback::new(state_channel, playlist));
            open_episode(&core, channel, elevator).await
        })
    }
}

pub(crate) fn disconnect(core: Arc<SessionCore>) -> impl FnOnce(SessionState) -> TransitionFuture {
    move |state| {
        Box::pin(async move { Ok(teardown(&core, state, ConnectionTeardown::Destroy).await) })
    }
}

pub(crate) type TransitionFuture =
    std::pin::Pin<Box<dyn Future<Output = Result<SessionState>> + Send + 'static>>;

/// Allocates connection and player for a new episode.
pub(crate) async fn open_episode(
    core: &SessionCore,
    channel: ChannelId,
    playback: PlaybackValue,
) -> Result<SessionState> {
    let connector = &core.deps.connector;
    let episode = core.next_episode();
    let sink = core.sink(episode);

    let connection = connector
        .join_voice_channel(core.guild_id, channel, sink.clone())
        .await
        .with_context(|| format!("Error al conectar al canal de voz {channel}"))?;

    let player = match connector.create_audio_player(core.guild_id, sink).await {
        Ok(player) => player,
        Err(e) => {
            if let Err(destroy_err) = connector.destroy(&connection).await {
                warn!("⚠️ No se pudo liberar la conexión: {}", destroy_err);
            }
            return Err(e).context("Error al crear el player de audio");
        }
    };

    info!(
        "🔊 Episodio {} ({}) iniciado en canal {} de guild {}",
        episode,
        playback.mode_name(),
        channel,
        core.guild_id
    );

    Ok(SessionState::Connecting(ActiveSession {
        episode,
        channel,
        connection,
        player,
        playback,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionTeardown {
    /// Destruir la conexión además de limpiar.
    Destroy,
    /// La plataforma ya cerró la conexión.
    AlreadyGone,
}

/// Stops and releases the player, removes the status message and thread and
/// resets to `Disconnected`. Every step is attempted even if a previous one
/// failed.
pub(crate) async fn teardown(
    core: &SessionCore,
    state: SessionState,
    mode: ConnectionTeardown,
) -> SessionState {
    let session = match state {
        SessionState::Disconnected => return SessionState::Disconnected,
        SessionState::Connecting(session) | SessionState::Connected { session, .. } => session,
    };
    let connector = &core.deps.connector;

    if !connector.stop(&session.player).await {
        debug!("⏹️ El player ya estaba detenido");
    }
    connector.release_player(&session.player).await;

    if let Some(status) = &session.playback.common().message {
        if let Some(thread) = &status.thread {
            if !connector.delete_thread(thread).await {
                warn!("⚠️ No se pudo eliminar el hilo {}", thread.thread_id);
            }
        }
        if let Err(e) = connector.delete_message(&status.message).await {
            warn!("⚠️ No se pudo eliminar el mensaje de estado: {}", e);
        }
    }

    if mode == ConnectionTeardown::Destroy {
        if let Err(e) = connector.destroy(&session.connection).await {
            warn!("⚠️ Error al destruir la conexión de voz: {}", e);
        }
    }

    info!(
        "👋 Episodio {} finalizado en guild {}",
        session.episode, core.guild_id
    );
    SessionState::Disconnected
}

/// Plays the next playable queue head. Tears the episode down when the
/// queue runs dry. No-op outside connected music mode.
pub(crate) async fn advance_music(core: &SessionCore, mut state: SessionState) -> Result<SessionState> {
    let SessionState::Connected { session, .. } = &mut state else {
        return Ok(state);
    };
    let player = session.player.clone();

    let started = match &mut session.playback {
        PlaybackValue::Music(music) => loop {
            let Some(track) = music.queue.pop_front() else {
                music.current_track = None;
                break false;
            };

            match start_track(core, &player, &track).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo: {}", track.title);
                    music.current_track = Some(track);
                    music.common.is_paused = false;
                    break true;
                }
                // Sin enlace el episodio sigue en silencio; la cola se conserva
                Err(e) if is_unlinked(&e) => {
                    warn!(
                        "🔇 Guild {}: {} en silencio, player sin enlazar",
                        core.guild_id, track.title
                    );
                    music.current_track = Some(track);
                    music.common.is_paused = false;
                    break true;
                }
                Err(e) => {
                    warn!("❌ No se pudo reproducir {}: {:#}", track.url, e);
                    music
                        .common
                        .pending_events
                        .push(format!("⚠️ No se pudo reproducir **{}**", track.title));
                }
            }
        },
        PlaybackValue::Elevator(_) => true,
    };

    if started {
        Ok(state)
    } else {
        info!("📭 Cola vacía en guild {}, finalizando episodio", core.guild_id);
        Ok(teardown(core, state, ConnectionTeardown::Destroy).await)
    }
}

/// Plays the playlist head, skipping unplayable files. Tears the episode
/// down when no file of the playlist can be played.
pub(crate) async fn play_ambient_head(
    core: &SessionCore,
    mut state: SessionState,
) -> Result<SessionState> {
    let SessionState::Connected { session, .. } = &mut state else {
        return Ok(state);
    };
    let player = session.player.clone();

    let started = match &mut session.playback {
        PlaybackValue::Elevator(elevator) => {
            let mut started = false;
            for _ in 0..elevator.playlist.len() {
                let file = elevator.playlist.head().clone();
                match core
                    .deps
                    .connector
                    .play(&player, AudioResource::File(file.path.clone()))
                    .await
                {
                    Ok(()) => {
                        debug!("🛗 Reproduciendo archivo ambiental: {}", file.name);
                        elevator.common.is_paused = false;
                        started = true;
                        break;
                    }
                    Err(ConnectorError::NotLinked) => {
                        warn!(
                            "🔇 Guild {}: modo ascensor en silencio, player sin enlazar",
                            core.guild_id
                        );
                        elevator.common.is_paused = false;
                        started = true;
                        break;
                    }
                    Err(e) => {
                        warn!("❌ Archivo ambiental {} no reproducible: {}", file.name, e);
                        elevator.playlist.rotate();
                    }
                }
            }
            started
        }
        PlaybackValue::Music(_) => true,
    };

    if started {
        Ok(state)
    } else {
        warn!(
            "⚠️ Ningún archivo ambiental reproducible en guild {}",
            core.guild_id
        );
        Ok(teardown(core, state, ConnectionTeardown::Destroy).await)
    }
}

/// Begins playback right after the connection became ready.
pub(crate) async fn start_playback(core: &SessionCore, state: SessionState) -> Result<SessionState> {
    let is_music = match state.active() {
        Some(session) => matches!(session.playback, PlaybackValue::Music(_)),
        None => return Ok(state),
    };

    if is_music {
        advance_music(core, state).await
    } else {
        play_ambient_head(core, state).await
    }
}

async fn start_track(core: &SessionCore, player: &PlayerHandle, track: &Track) -> Result<()> {
    let resource = core.deps.resolver.open_audio_stream(&track.url).await?;
    core.deps.connector.play(player, resource).await?;
    Ok(())
}

fn is_unlinked(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<ConnectorError>(),
        Some(ConnectorError::NotLinked)
    )
}

fn tracks_added_notice(author: UserId, count: usize, first_title: Option<&str>) -> String {
    match (count, first_title) {
        (1, Some(title)) => format!("🎶 <@{}> agregó **{}** a la cola", author, title),
        _ => format!("🎶 <@{}> agregó {} canciones a la cola", author, count),
    }
}
