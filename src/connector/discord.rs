//! Discord implementation of [`VoiceConnector`] on top of serenity's HTTP
//! client and songbird.
//!
//! songbird has no standalone player object: a "player" here is a slot that
//! owns the current [`TrackHandle`] of one guild and becomes usable once it is
//! linked to the guild's [`Call`] by [`VoiceConnector::subscribe`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::{
    all::{ChannelType, GuildId},
    builder::{CreateMessage, CreateThread, EditMessage},
    http::{Http, HttpError},
    model::id::ChannelId,
};
use songbird::{
    error::JoinError,
    events::CoreEvent,
    input::{File, Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, error, info};

use super::{
    AudioResource, ConnectorError, MessageRef, PlayerHandle, StatusView, Subscription, ThreadRef,
    VoiceConnection, VoiceConnector,
};
use crate::{
    session::{LifecycleEvent, LifecycleSink},
    ui::{buttons::status_buttons, embeds::status_embed},
};

/// Discord error codes with a dedicated [`ConnectorError`] variant.
const UNKNOWN_MESSAGE: isize = 10008;
const MISSING_ACCESS: isize = 50001;
const MISSING_PERMISSIONS: isize = 50013;

struct PlayerSlot {
    guild_id: GuildId,
    events: LifecycleSink,
    call: Option<Arc<tokio::sync::Mutex<Call>>>,
    track: Option<TrackHandle>,
    /// Bumped whenever the current track is replaced or stopped, so the end
    /// notification of a superseded track is not reported as `player:idle`.
    generation: Arc<AtomicU64>,
}

pub struct DiscordConnector {
    http: Arc<Http>,
    songbird: Arc<Songbird>,
    http_client: reqwest::Client,
    players: Mutex<HashMap<u64, PlayerSlot>>,
    next_player: AtomicU64,
}

impl DiscordConnector {
    pub fn new(http: Arc<Http>, songbird: Arc<Songbird>) -> Self {
        Self {
            http,
            songbird,
            http_client: reqwest::Client::new(),
            players: Mutex::new(HashMap::new()),
            next_player: AtomicU64::new(1),
        }
    }

    fn input_for(&self, resource: AudioResource) -> Input {
        match resource {
            AudioResource::Remote(url) => YoutubeDl::new(self.http_client.clone(), url).into(),
            AudioResource::File(path) => File::new(path).into(),
        }
    }

    fn with_track(&self, player: &PlayerHandle, op: impl FnOnce(&TrackHandle) -> bool) -> bool {
        let players = self.players.lock();
        match players.get(&player.id).and_then(|slot| slot.track.as_ref()) {
            Some(track) => op(track),
            None => false,
        }
    }
}

fn classify(err: serenity::Error) -> ConnectorError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &err {
        match response.error.code {
            UNKNOWN_MESSAGE => return ConnectorError::UnknownMessage,
            MISSING_ACCESS | MISSING_PERMISSIONS => {
                return ConnectorError::PermissionDenied(response.error.message.clone())
            }
            _ => {}
        }
    }
    ConnectorError::Http(err)
}

#[async_trait]
impl VoiceConnector for DiscordConnector {
    async fn join_voice_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: LifecycleSink,
    ) -> Result<VoiceConnection, ConnectorError> {
        info!("🔗 Uniéndose al canal {} en guild {}", channel_id, guild_id);

        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| ConnectorError::Join(e.to_string()))?;

        {
            let mut handler = call.lock().await;
            handler.remove_all_global_events();
            handler.add_global_event(
                Event::Core(CoreEvent::DriverReconnect),
                ConnectionNotifier {
                    events: events.clone(),
                    event: LifecycleEvent::ConnectionReady,
                },
            );
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                ConnectionNotifier {
                    events: events.clone(),
                    event: LifecycleEvent::ConnectionDisconnected,
                },
            );
        }

        // join() vuelve con el driver ya conectado
        events.emit(LifecycleEvent::ConnectionReady);

        Ok(VoiceConnection {
            guild_id,
            channel_id,
        })
    }

    async fn create_audio_player(
        &self,
        guild_id: GuildId,
        events: LifecycleSink,
    ) -> Result<PlayerHandle, ConnectorError> {
        let id = self.next_player.fetch_add(1, Ordering::Relaxed);
        self.players.lock().insert(
            id,
            PlayerSlot {
                guild_id,
                events,
                call: None,
                track: None,
                generation: Arc::new(AtomicU64::new(0)),
            },
        );
        debug!("🎛️ Player {} creado para guild {}", id, guild_id);
        Ok(PlayerHandle { guild_id, id })
    }

    async fn subscribe(
        &self,
        connection: &VoiceConnection,
        player: &PlayerHandle,
    ) -> Option<Subscription> {
        let call = self.songbird.get(connection.guild_id)?;
        let mut players = self.players.lock();
        let slot = players.get_mut(&player.id)?;
        slot.call = Some(call);
        Some(Subscription {
            guild_id: connection.guild_id,
            player_id: player.id,
        })
    }

    async fn play(
        &self,
        player: &PlayerHandle,
        resource: AudioResource,
    ) -> Result<(), ConnectorError> {
        // La generación cambia antes de reemplazar el track: el fin del
        // anterior ya no cuenta como player:idle
        let (call, notifier) = {
            let players = self.players.lock();
            let slot = players
                .get(&player.id)
                .ok_or(ConnectorError::UnknownPlayer(player.id))?;
            let call = slot.call.clone().ok_or(ConnectorError::NotLinked)?;
            let expected = slot.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let notifier = TrackNotifier {
                events: slot.events.clone(),
                generation: slot.generation.clone(),
                expected,
            };
            (call, notifier)
        };

        let track = call.lock().await.play_only_input(self.input_for(resource));
        track
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .map_err(|e| ConnectorError::Other(e.to_string()))?;
        track
            .add_event(Event::Track(TrackEvent::Error), notifier)
            .map_err(|e| ConnectorError::Other(e.to_string()))?;

        if let Some(slot) = self.players.lock().get_mut(&player.id) {
            slot.track = Some(track);
        }
        Ok(())
    }

    async fn pause(&self, player: &PlayerHandle) -> bool {
        self.with_track(player, |track| track.pause().is_ok())
    }

    async fn unpause(&self, player: &PlayerHandle) -> bool {
        self.with_track(player, |track| track.play().is_ok())
    }

    async fn stop(&self, player: &PlayerHandle) -> bool {
        let mut players = self.players.lock();
        let Some(slot) = players.get_mut(&player.id) else {
            return false;
        };
        slot.generation.fetch_add(1, Ordering::SeqCst);
        match slot.track.take() {
            Some(track) => track.stop().is_ok(),
            None => false,
        }
    }

    async fn release_player(&self, player: &PlayerHandle) {
        if let Some(slot) = self.players.lock().remove(&player.id) {
            slot.generation.fetch_add(1, Ordering::SeqCst);
            debug!("🎛️ Player {} liberado en guild {}", player.id, slot.guild_id);
        }
    }

    async fn destroy(&self, connection: &VoiceConnection) -> Result<(), ConnectorError> {
        match self.songbird.remove(connection.guild_id).await {
            Ok(()) => {
                info!("👋 Conexión de voz cerrada en guild {}", connection.guild_id);
                Ok(())
            }
            Err(JoinError::NoCall) => Err(ConnectorError::AlreadyDestroyed),
            Err(e) => Err(ConnectorError::Other(e.to_string())),
        }
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        view: &StatusView,
    ) -> Result<MessageRef, ConnectorError> {
        let message = channel_id
            .send_message(
                &*self.http,
                CreateMessage::new()
                    .embed(status_embed(view))
                    .components(status_buttons(view)),
            )
            .await
            .map_err(classify)?;

        Ok(MessageRef {
            channel_id,
            message_id: message.id,
        })
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        view: &StatusView,
    ) -> Result<(), ConnectorError> {
        message
            .channel_id
            .edit_message(
                &*self.http,
                message.message_id,
                EditMessage::new()
                    .embed(status_embed(view))
                    .components(status_buttons(view)),
            )
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), ConnectorError> {
        message
            .channel_id
            .delete_message(&*self.http, message.message_id)
            .await
            .map_err(classify)
    }

    async fn start_thread(
        &self,
        message: &MessageRef,
        name: &str,
    ) -> Result<ThreadRef, ConnectorError> {
        let thread = message
            .channel_id
            .create_thread_from_message(
                &*self.http,
                message.message_id,
                CreateThread::new(name).kind(ChannelType::PublicThread),
            )
            .await
            .map_err(classify)?;

        Ok(ThreadRef {
            thread_id: thread.id,
        })
    }

    async fn send_thread_message(
        &self,
        thread: &ThreadRef,
        content: &str,
    ) -> Result<(), ConnectorError> {
        thread
            .thread_id
            .say(&*self.http, content)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_thread(&self, thread: &ThreadRef) -> bool {
        match thread.thread_id.delete(&*self.http).await {
            Ok(_) => true,
            Err(e) => {
                debug!("No se pudo eliminar el hilo {}: {}", thread.thread_id, e);
                false
            }
        }
    }
}

/// Reenvía eventos del driver de voz al ciclo de vida de la sesión
struct ConnectionNotifier {
    events: LifecycleSink,
    event: LifecycleEvent,
}

#[async_trait]
impl VoiceEventHandler for ConnectionNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let event = match ctx {
            // Sin motivo: la desconexión la pidió el propio bot
            EventContext::DriverDisconnect(data) if data.reason.is_none() => {
                LifecycleEvent::ConnectionDestroyed
            }
            _ => self.event.clone(),
        };
        debug!("🔌 {:?} (episodio {})", event, self.events.episode());
        self.events.emit(event);
        None
    }
}

/// Reports the end (or failure) of the track it was registered on as
/// `player:idle`, at most once and only while that track is still current.
#[derive(Clone)]
struct TrackNotifier {
    events: LifecycleSink,
    generation: Arc<AtomicU64>,
    expected: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                if let songbird::tracks::PlayMode::Errored(e) = &state.playing {
                    error!("❌ Error en track: {}", e);
                    self.events.emit(LifecycleEvent::PlayerError(e.to_string()));
                }
            }
        }

        let claimed = self
            .generation
            .compare_exchange(
                self.expected,
                self.expected + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if claimed {
            self.events.emit(LifecycleEvent::PlayerIdle);
        } else {
            debug!(
                "🕰️ Fin de un track reemplazado ignorado (episodio {})",
                self.events.episode()
            );
        }

        // Elimina el handler del track
        Some(Event::Cancel)
    }
}
