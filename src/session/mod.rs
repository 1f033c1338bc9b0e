//! # Session Module
//!
//! Per-guild audio session state machine.
//!
//! Each guild owns exactly one [`GuildSession`]: a voice connection, an audio
//! player and a "now playing" status message with its companion thread. Every
//! state change, whatever its origin, is a transition submitted to the same
//! [`TransitionQueue`]:
//!
//! ```text
//!  slash commands / buttons ──┐
//!                             ├──▶ TransitionQueue ──▶ PresentationSync ──▶ commit
//!  songbird notifications ────┘     (one task per guild)
//! ```
//!
//! ## Components
//!
//! - [`state`] - [`SessionState`] and the playback value model
//! - [`queue`] - the single-consumer transition actor
//! - [`commands`] - transition builders behind the public API
//! - [`lifecycle`] - connection/player notifications turned into transitions
//! - [`presentation`] - status message and thread synchronisation
//!
//! Nothing here mutates state outside a running transition, so two skip
//! presses or a press racing a `player:idle` notification are totally ordered.

pub mod commands;
pub mod lifecycle;
pub mod presentation;
pub mod queue;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    config::Config,
    connector::VoiceConnector,
    sources::{ambient::AmbientLibrary, MediaResolver},
};

pub use lifecycle::{LifecycleEvent, LifecycleSink};
pub use queue::{Completion, TransitionQueue};
pub use state::{EpisodeId, SessionState, Track};

use presentation::PresentationSync;

/// Errores visibles para la capa de comandos.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("la sesión tiene demasiadas operaciones pendientes (máximo {backlog})")]
    Overloaded { backlog: usize },

    #[error("la sesión ya no está activa")]
    Closed,

    #[error("la operación falló: {0}")]
    TransitionFailed(String),
}

/// Limits applied to every session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Pending transitions accepted before `enqueue` fails fast.
    pub backlog: usize,
    pub max_queue_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            backlog: 100,
            max_queue_size: 1000,
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            backlog: config.transition_backlog,
            max_queue_size: config.max_queue_size,
        }
    }
}

/// External collaborators shared by all sessions.
#[derive(Clone)]
pub struct SessionDeps {
    pub connector: Arc<dyn VoiceConnector>,
    pub resolver: Arc<dyn MediaResolver>,
    pub ambient: Arc<AmbientLibrary>,
}

pub(crate) struct SessionCore {
    pub(crate) guild_id: GuildId,
    pub(crate) deps: SessionDeps,
    pub(crate) settings: SessionSettings,
    queue: TransitionQueue<SessionState>,
    next_episode: AtomicU64,
    this: Weak<SessionCore>,
}

impl SessionCore {
    pub(crate) fn enqueue<F, Fut>(&self, transition: F) -> Result<Completion, SessionError>
    where
        F: FnOnce(SessionState) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<SessionState>> + Send + 'static,
    {
        self.queue.enqueue(transition)
    }

    pub(crate) fn next_episode(&self) -> EpisodeId {
        EpisodeId(self.next_episode.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Sink whose notifications only apply while `episode` is current.
    pub(crate) fn sink(&self, episode: EpisodeId) -> LifecycleSink {
        LifecycleSink::new(self.this.clone(), episode)
    }
}

/// The audio session of one guild.
///
/// Cheap to clone; all clones submit to the same transition queue.
#[derive(Clone)]
pub struct GuildSession {
    core: Arc<SessionCore>,
}

impl GuildSession {
    /// Creates the session in `Disconnected` and spawns its queue task.
    pub fn new(guild_id: GuildId, deps: SessionDeps, settings: SessionSettings) -> Self {
        let core = Arc::new_cyclic(|this| {
            let sync = PresentationSync::new(guild_id, deps.connector.clone());
            SessionCore {
                guild_id,
                queue: TransitionQueue::spawn(
                    SessionState::Disconnected,
                    sync,
                    settings.backlog,
                    format!("guild {guild_id}"),
                ),
                deps,
                settings,
                next_episode: AtomicU64::new(0),
                this: this.clone(),
            }
        });

        Self { core }
    }

    pub fn guild_id(&self) -> GuildId {
        self.core.guild_id
    }

    /// Snapshot of the last committed state.
    pub fn get_state(&self) -> SessionState {
        self.core.queue.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.core.queue.subscribe()
    }

    /// Submits an arbitrary transition to this guild's queue.
    pub fn enqueue<F, Fut>(&self, transition: F) -> Result<Completion, SessionError>
    where
        F: FnOnce(SessionState) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<SessionState>> + Send + 'static,
    {
        self.core.enqueue(transition)
    }

    /// Appends `tracks` to the music queue, opening an episode in `channel`
    /// when disconnected. `state_channel` receives the status message.
    pub fn queue_tracks(
        &self,
        author: UserId,
        channel: ChannelId,
        state_channel: ChannelId,
        tracks: Vec<Track>,
    ) -> Result<Completion, SessionError> {
        self.enqueue(commands::queue_tracks(
            self.core.clone(),
            author,
            channel,
            state_channel,
            tracks,
        ))
    }

    pub fn play_next_track(&self, author: UserId) -> Result<Completion, SessionError> {
        self.enqueue(commands::play_next_track(self.core.clone(), author))
    }

    pub fn play_pause_track(&self) -> Result<Completion, SessionError> {
        self.enqueue(commands::play_pause_track(self.core.clone()))
    }

    pub fn start_elevator(
        &self,
        channel: ChannelId,
        state_channel: ChannelId,
    ) -> Result<Completion, SessionError> {
        self.enqueue(commands::start_elevator(
            self.core.clone(),
            channel,
            state_channel,
        ))
    }

    /// Submits the end of the current episode, if any.
    pub fn request_disconnect(&self) -> Result<Completion, SessionError> {
        self.enqueue(commands::disconnect(self.core.clone()))
    }

    /// Ends the current episode, if any, and waits for the commit.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.request_disconnect()?.wait().await
    }
}

/// Registro de sesiones por guild.
pub struct SessionManager {
    sessions: DashMap<GuildId, GuildSession>,
    deps: SessionDeps,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(deps: SessionDeps, settings: SessionSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            deps,
            settings,
        }
    }

    /// Returns the guild's session, creating it on first use.
    pub fn get_or_create(&self, guild_id: GuildId) -> GuildSession {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🆕 Sesión creada para guild {}", guild_id);
                GuildSession::new(guild_id, self.deps.clone(), self.settings)
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Desconecta todas las sesiones (apagado ordenado).
    pub async fn disconnect_all(&self) {
        let sessions: Vec<GuildSession> = self.sessions.iter().map(|s| s.clone()).collect();

        for session in sessions {
            if session.get_state().is_disconnected() {
                continue;
            }
            if let Err(e) = session.disconnect().await {
                warn!(
                    "⚠️ No se pudo desconectar la guild {}: {}",
                    session.guild_id(),
                    e
                );
            }
        }
    }
}
