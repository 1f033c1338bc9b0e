//! Lifecycle bridge.
//!
//! Converts connector notifications (`connection:ready`, `connection:
//! disconnected`, `connection:destroyed`, `player:idle`, `error`) into
//! transitions on the same queue the commands use, so externally-driven
//! changes can never race user-driven ones.

use std::{
    fmt,
    sync::{Arc, Weak},
};
use tracing::{debug, error, warn};

use super::{
    commands::{self, ConnectionTeardown},
    queue::Completion,
    state::{EpisodeId, PlaybackValue, SessionState},
    SessionCore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    ConnectionReady,
    ConnectionDisconnected,
    ConnectionDestroyed,
    PlayerIdle,
    PlayerError(String),
}

/// Destination for the notifications of one episode's connection and player.
///
/// Holds the session weakly: a sink kept alive by the platform after the
/// session is gone simply drops its notifications.
#[derive(Clone)]
pub struct LifecycleSink {
    core: Weak<SessionCore>,
    episode: EpisodeId,
}

impl fmt::Debug for LifecycleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleSink")
            .field("episode", &self.episode)
            .finish_non_exhaustive()
    }
}

impl LifecycleSink {
    pub(crate) fn new(core: Weak<SessionCore>, episode: EpisodeId) -> Self {
        Self { core, episode }
    }

    pub fn episode(&self) -> EpisodeId {
        self.episode
    }

    /// Queues the transition for `event`. Returns `None` when nothing was
    /// queued (session dropped, queue overloaded, or a log-only event).
    pub fn emit(&self, event: LifecycleEvent) -> Option<Completion> {
        let core = self.core.upgrade()?;

        if let LifecycleEvent::PlayerError(message) = &event {
            warn!(
                "🚨 Error del player en guild {} (episodio {}): {}",
                core.guild_id, self.episode, message
            );
            return None;
        }

        let episode = self.episode;
        let guild_id = core.guild_id;
        let transition_core = core.clone();
        match core.enqueue(move |state| on_event(transition_core, episode, event, state)) {
            Ok(completion) => Some(completion),
            Err(e) => {
                error!(
                    "❌ Evento de ciclo de vida descartado en guild {}: {}",
                    guild_id, e
                );
                None
            }
        }
    }
}

async fn on_event(
    core: Arc<SessionCore>,
    episode: EpisodeId,
    event: LifecycleEvent,
    state: SessionState,
) -> anyhow::Result<SessionState> {
    if let Some(current) = state.episode() {
        if current != episode {
            debug!(
                "🕰️ {:?} del episodio {} ignorado (actual: {})",
                event, episode, current
            );
            return Ok(state);
        }
    }

    match event {
        LifecycleEvent::ConnectionReady => connection_ready(&core, state).await,
        LifecycleEvent::ConnectionDisconnected => {
            Ok(connection_lost(&core, state, ConnectionTeardown::Destroy).await)
        }
        LifecycleEvent::ConnectionDestroyed => {
            Ok(connection_lost(&core, state, ConnectionTeardown::AlreadyGone).await)
        }
        LifecycleEvent::PlayerIdle => player_idle(&core, state).await,
        LifecycleEvent::PlayerError(_) => Ok(state),
    }
}

async fn connection_ready(core: &SessionCore, state: SessionState) -> anyhow::Result<SessionState> {
    match state {
        SessionState::Connecting(session) => {
            let subscription = core
                .deps
                .connector
                .subscribe(&session.connection, &session.player)
                .await;
            if subscription.is_none() {
                // Se continúa sin audio
                warn!(
                    "⚠️ No se pudo enlazar la conexión con el player en guild {}",
                    core.guild_id
                );
            }

            let connected = SessionState::Connected {
                session,
                subscription,
            };
            commands::start_playback(core, connected).await
        }
        SessionState::Connected { .. } => {
            debug!("🔁 connection:ready duplicado en guild {}", core.guild_id);
            Ok(state)
        }
        SessionState::Disconnected => {
            warn!(
                "⚠️ connection:ready recibido sin sesión en guild {}",
                core.guild_id
            );
            Ok(state)
        }
    }
}

async fn connection_lost(
    core: &SessionCore,
    state: SessionState,
    mode: ConnectionTeardown,
) -> SessionState {
    if state.is_disconnected() {
        debug!("🔌 Desconexión ya procesada en guild {}", core.guild_id);
        return state;
    }

    warn!("🔌 Conexión de voz perdida en guild {}", core.guild_id);
    commands::teardown(core, state, mode).await
}

async fn player_idle(core: &SessionCore, mut state: SessionState) -> anyhow::Result<SessionState> {
    match &mut state {
        SessionState::Disconnected => {
            debug!("💤 player:idle sin sesión en guild {}", core.guild_id);
            Ok(state)
        }
        SessionState::Connecting(_) => {
            warn!(
                "⚠️ player:idle mientras se conectaba en guild {}",
                core.guild_id
            );
            Ok(state)
        }
        SessionState::Connected { session, .. } => match &mut session.playback {
            PlaybackValue::Music(_) => commands::advance_music(core, state).await,
            PlaybackValue::Elevator(elevator) => {
                elevator.playlist.rotate();
                commands::play_ambient_head(core, state).await
            }
        },
    }
}
