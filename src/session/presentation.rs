//! Presentation sync.
//!
//! Runs inside the queue after every transition, before the commit. It keeps
//! the status message in step with the [`MessageDependencies`] projection and
//! moves pending notices into the companion thread.

use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    queue::Reconcile,
    state::{ActiveSession, EpisodeStage, PlaybackCommon, PlaybackValue, SessionState, StatusMessage},
};
use crate::connector::{StatusView, ViewMode, VoiceConnector};

/// Nombre del hilo acompañante.
pub const THREAD_NAME: &str = "🎵 Eventos de la sesión";

const UP_NEXT_PREVIEW: usize = 5;

pub struct PresentationSync {
    guild_id: GuildId,
    connector: Arc<dyn VoiceConnector>,
}

impl PresentationSync {
    pub fn new(guild_id: GuildId, connector: Arc<dyn VoiceConnector>) -> Self {
        Self {
            guild_id,
            connector,
        }
    }

    async fn publish(&self, common: &mut PlaybackCommon, view: &StatusView) -> bool {
        match self.connector.send_message(common.message_channel, view).await {
            Ok(message) => {
                debug!("📨 Mensaje de estado enviado en guild {}", self.guild_id);
                common.message = Some(StatusMessage {
                    message,
                    thread: None,
                });
                true
            }
            Err(e) => {
                warn!(
                    "⚠️ No se pudo enviar el mensaje de estado en guild {}: {}",
                    self.guild_id, e
                );
                false
            }
        }
    }

    async fn open_thread(&self, common: &mut PlaybackCommon) {
        let Some(status) = common.message.as_mut() else {
            return;
        };
        match self.connector.start_thread(&status.message, THREAD_NAME).await {
            Ok(thread) => status.thread = Some(thread),
            Err(e) => warn!(
                "⚠️ No se pudo crear el hilo en guild {}: {}",
                self.guild_id, e
            ),
        }
    }

    async fn flush_events(&self, common: &mut PlaybackCommon) {
        let Some(thread) = common.thread().copied() else {
            return;
        };

        for notice in common.pending_events.drain(..) {
            if let Err(e) = self.connector.send_thread_message(&thread, &notice).await {
                warn!("⚠️ Aviso perdido en guild {}: {}", self.guild_id, e);
            }
        }
    }
}

#[async_trait]
impl Reconcile<SessionState> for PresentationSync {
    async fn reconcile(&self, old: &SessionState, mut new: SessionState) -> SessionState {
        let Some(deps) = new.message_dependencies() else {
            return new;
        };
        let changed = old.message_dependencies().as_ref() != Some(&deps);
        let fresh_episode = old.episode() != Some(deps.episode);
        let Some(session) = new.active_mut() else {
            return new;
        };
        let view = render(session, deps.stage);
        let common = session.playback.common_mut();

        let mut thread_attempted = false;
        match &common.message {
            None if fresh_episode || changed => {
                if self.publish(common, &view).await {
                    self.open_thread(common).await;
                    thread_attempted = true;
                }
            }
            Some(status) if changed => {
                if let Err(e) = self.connector.edit_message(&status.message, &view).await {
                    warn!(
                        "⚠️ No se pudo actualizar el mensaje de estado en guild {}: {}",
                        self.guild_id, e
                    );
                }
            }
            _ => {}
        }

        if !common.pending_events.is_empty() {
            let missing_thread = common.message.as_ref().is_some_and(|m| m.thread.is_none());
            if missing_thread && !thread_attempted {
                self.open_thread(common).await;
            }
            self.flush_events(common).await;
        }

        new
    }
}

/// Builds the platform-neutral view of the status message.
pub fn render(session: &ActiveSession, stage: EpisodeStage) -> StatusView {
    let connecting = stage == EpisodeStage::Connecting;
    let is_paused = session.playback.common().is_paused;

    match &session.playback {
        PlaybackValue::Music(music) => {
            let title = match (&music.current_track, connecting) {
                (Some(track), _) => track.title.clone(),
                (None, true) => "Conectando…".to_string(),
                (None, false) => "Nada sonando".to_string(),
            };
            StatusView {
                mode: ViewMode::Music,
                connecting,
                is_paused,
                title,
                url: music.current_track.as_ref().map(|t| t.url.clone()),
                thumbnail: music.current_track.as_ref().and_then(|t| t.thumbnail.clone()),
                up_next: music
                    .queue
                    .iter()
                    .take(UP_NEXT_PREVIEW)
                    .map(|t| t.title.clone())
                    .collect(),
                remaining: music.queue.len(),
            }
        }
        PlaybackValue::Elevator(elevator) => StatusView {
            mode: ViewMode::Elevator,
            connecting,
            is_paused,
            title: elevator.playlist.head().name.clone(),
            url: None,
            thumbnail: None,
            up_next: elevator
                .playlist
                .files()
                .skip(1)
                .take(UP_NEXT_PREVIEW)
                .map(|f| f.name.clone())
                .collect(),
            remaining: elevator.playlist.len() - 1,
        },
    }
}
