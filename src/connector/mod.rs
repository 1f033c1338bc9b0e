//! # Connector Module
//!
//! Boundary between the session core and the chat platform.
//!
//! The core only talks to Discord through [`VoiceConnector`]: joining voice
//! channels, driving the audio player and maintaining the status message and
//! its companion thread. Lifecycle notifications flow back through the
//! [`LifecycleSink`] handed over when the connection and the player are
//! allocated.
//!
//! Every call is asynchronous and individually fault-reportable. The core
//! treats most failures as soft: they are logged at the call site and the
//! enclosing transition continues.
//!
//! - [`discord`] - serenity HTTP + songbird implementation

pub mod discord;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::path::PathBuf;
use thiserror::Error;

use crate::session::lifecycle::LifecycleSink;

pub use discord::DiscordConnector;

/// Conexión de voz activa en una guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConnection {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerHandle {
    pub guild_id: GuildId,
    pub id: u64,
}

/// Link between a connection and a player; audio only flows while it exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub guild_id: GuildId,
    pub player_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRef {
    pub thread_id: ChannelId,
}

/// Recurso reproducible por el player.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AudioResource {
    /// Stream remoto resuelto por yt-dlp.
    Remote(String),
    /// Archivo local (playlists ambientales).
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Music,
    Elevator,
}

/// Platform-neutral rendering of the status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub mode: ViewMode,
    pub connecting: bool,
    pub is_paused: bool,
    pub title: String,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    pub up_next: Vec<String>,
    pub remaining: usize,
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("permiso denegado: {0}")]
    PermissionDenied(String),

    #[error("mensaje desconocido o eliminado")]
    UnknownMessage,

    #[error("la conexión ya fue destruida")]
    AlreadyDestroyed,

    #[error("no se pudo unir al canal de voz: {0}")]
    Join(String),

    #[error("player desconocido: {0}")]
    UnknownPlayer(u64),

    /// The player has no subscription, so nothing it plays can be heard.
    #[error("el player no está enlazado a la conexión")]
    NotLinked,

    #[error(transparent)]
    Http(#[from] serenity::Error),

    #[error("{0}")]
    Other(String),
}

/// Operations the session core needs from the chat platform.
#[async_trait]
pub trait VoiceConnector: Send + Sync + 'static {
    /// Joins `channel_id`; connection notifications are reported to `events`.
    async fn join_voice_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: LifecycleSink,
    ) -> Result<VoiceConnection, ConnectorError>;

    /// Allocates a player; `player:idle` notifications are reported to `events`.
    async fn create_audio_player(
        &self,
        guild_id: GuildId,
        events: LifecycleSink,
    ) -> Result<PlayerHandle, ConnectorError>;

    async fn subscribe(
        &self,
        connection: &VoiceConnection,
        player: &PlayerHandle,
    ) -> Option<Subscription>;

    /// Starts `resource`, replacing the current track. Fails with
    /// [`ConnectorError::NotLinked`] while the player has no subscription.
    async fn play(&self, player: &PlayerHandle, resource: AudioResource)
        -> Result<(), ConnectorError>;

    async fn pause(&self, player: &PlayerHandle) -> bool;

    async fn unpause(&self, player: &PlayerHandle) -> bool;

    async fn stop(&self, player: &PlayerHandle) -> bool;

    /// Frees everything held for `player`. Called once per episode,
    /// whether or not the connection is destroyed.
    async fn release_player(&self, player: &PlayerHandle);

    async fn destroy(&self, connection: &VoiceConnection) -> Result<(), ConnectorError>;

    async fn send_message(
        &self,
        channel_id: ChannelId,
        view: &StatusView,
    ) -> Result<MessageRef, ConnectorError>;

    async fn edit_message(
        &self,
        message: &MessageRef,
        view: &StatusView,
    ) -> Result<(), ConnectorError>;

    async fn delete_message(&self, message: &MessageRef) -> Result<(), ConnectorError>;

    async fn start_thread(
        &self,
        message: &MessageRef,
        name: &str,
    ) -> Result<ThreadRef, ConnectorError>;

    async fn send_thread_message(
        &self,
        thread: &ThreadRef,
        content: &str,
    ) -> Result<(), ConnectorError>;

    async fn delete_thread(&self, thread: &ThreadRef) -> bool;
}
