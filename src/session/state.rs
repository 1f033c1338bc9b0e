//! Session state model.
//!
//! One [`SessionState`] value exists per guild. It is owned by that guild's
//! [`TransitionQueue`](super::queue::TransitionQueue) and replaced wholesale on
//! every commit, never mutated while another transition is running.

use serenity::model::id::ChannelId;
use std::{collections::VecDeque, fmt, path::PathBuf};

use crate::connector::{MessageRef, PlayerHandle, Subscription, ThreadRef, VoiceConnection};

/// Identificador monotónico de un episodio (Connecting → Disconnected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeId(pub u64);

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A playable item of the music queue. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track {
    pub title: String,
    pub url: String,
    pub thumbnail: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            thumbnail: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// Archivo local de una playlist ambiental.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AmbientFile {
    pub name: String,
    pub path: PathBuf,
}

impl AmbientFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Non-empty rotating list of ambient files. The head is the file playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    files: VecDeque<AmbientFile>,
}

impl Playlist {
    /// Returns `None` for an empty file list.
    pub fn new(files: impl IntoIterator<Item = AmbientFile>) -> Option<Self> {
        let files: VecDeque<_> = files.into_iter().collect();
        if files.is_empty() {
            None
        } else {
            Some(Self { files })
        }
    }

    pub fn head(&self) -> &AmbientFile {
        // No vacía por construcción
        &self.files[0]
    }

    /// Moves the current head to the tail.
    pub fn rotate(&mut self) {
        self.files.rotate_left(1);
    }

    pub fn files(&self) -> impl Iterator<Item = &AmbientFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Handle del mensaje de estado y su hilo acompañante.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: MessageRef,
    pub thread: Option<ThreadRef>,
}

/// Fields shared by both playback modes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackCommon {
    pub is_paused: bool,
    pub message_channel: ChannelId,
    pub message: Option<StatusMessage>,
    /// Notices waiting for the companion thread to exist.
    pub pending_events: Vec<String>,
}

impl PlaybackCommon {
    pub fn new(message_channel: ChannelId) -> Self {
        Self {
            is_paused: false,
            message_channel,
            message: None,
            pending_events: Vec::new(),
        }
    }

    pub fn thread(&self) -> Option<&ThreadRef> {
        self.message.as_ref().and_then(|m| m.thread.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MusicPlayback {
    pub common: PlaybackCommon,
    pub current_track: Option<Track>,
    pub queue: VecDeque<Track>,
}

impl MusicPlayback {
    pub fn new(message_channel: ChannelId) -> Self {
        Self {
            common: PlaybackCommon::new(message_channel),
            current_track: None,
            queue: VecDeque::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElevatorPlayback {
    pub common: PlaybackCommon,
    pub playlist: Playlist,
}

impl ElevatorPlayback {
    pub fn new(message_channel: ChannelId, playlist: Playlist) -> Self {
        Self {
            common: PlaybackCommon::new(message_channel),
            playlist,
        }
    }
}

/// Playback mode of an episode.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackValue {
    Music(MusicPlayback),
    Elevator(ElevatorPlayback),
}

impl PlaybackValue {
    pub fn common(&self) -> &PlaybackCommon {
        match self {
            PlaybackValue::Music(music) => &music.common,
            PlaybackValue::Elevator(elevator) => &elevator.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut PlaybackCommon {
        match self {
            PlaybackValue::Music(music) => &mut music.common,
            PlaybackValue::Elevator(elevator) => &mut elevator.common,
        }
    }

    pub fn push_event(&mut self, notice: impl Into<String>) {
        self.common_mut().pending_events.push(notice.into());
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            PlaybackValue::Music(_) => "music",
            PlaybackValue::Elevator(_) => "elevator",
        }
    }
}

/// Everything an occupied voice channel owns: handles plus playback value.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub episode: EpisodeId,
    pub channel: ChannelId,
    pub connection: VoiceConnection,
    pub player: PlayerHandle,
    pub playback: PlaybackValue,
}

/// Estado de la sesión de audio de una guild.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting(ActiveSession),
    Connected {
        session: ActiveSession,
        /// `None` when linking the connection to the player failed.
        subscription: Option<Subscription>,
    },
}

impl SessionState {
    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Disconnected => None,
            SessionState::Connecting(session) | SessionState::Connected { session, .. } => {
                Some(session)
            }
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveSession> {
        match self {
            SessionState::Disconnected => None,
            SessionState::Connecting(session) | SessionState::Connected { session, .. } => {
                Some(session)
            }
        }
    }

    pub fn episode(&self) -> Option<EpisodeId> {
        self.active().map(|session| session.episode)
    }

    pub fn stage(&self) -> Option<EpisodeStage> {
        match self {
            SessionState::Disconnected => None,
            SessionState::Connecting(_) => Some(EpisodeStage::Connecting),
            SessionState::Connected { .. } => Some(EpisodeStage::Connected),
        }
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, SessionState::Disconnected)
    }

    /// Projection of the fields the status message depends on.
    pub fn message_dependencies(&self) -> Option<MessageDependencies> {
        let stage = self.stage()?;
        let session = self.active()?;
        let content = match &session.playback {
            PlaybackValue::Music(music) => PlaybackContent::Music {
                current: music.current_track.clone(),
                queue: music.queue.iter().cloned().collect(),
            },
            PlaybackValue::Elevator(elevator) => PlaybackContent::Elevator {
                head: elevator.playlist.head().clone(),
                playlist: elevator.playlist.files().cloned().collect(),
            },
        };

        Some(MessageDependencies {
            episode: session.episode,
            stage,
            is_paused: session.playback.common().is_paused,
            content,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeStage {
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackContent {
    Music {
        current: Option<Track>,
        queue: Vec<Track>,
    },
    Elevator {
        head: AmbientFile,
        playlist: Vec<AmbientFile>,
    },
}

/// Value-type projection compared between commits to decide re-renders.
/// Connection handles and pending notices are deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDependencies {
    pub episode: EpisodeId,
    pub stage: EpisodeStage,
    pub is_paused: bool,
    pub content: PlaybackContent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::GuildId;

    fn file(name: &str) -> AmbientFile {
        AmbientFile::new(name, format!("/ambient/{name}.mp3"))
    }

    fn active(playback: PlaybackValue) -> ActiveSession {
        let guild_id = GuildId::new(1);
        ActiveSession {
            episode: EpisodeId(1),
            channel: ChannelId::new(10),
            connection: VoiceConnection {
                guild_id,
                channel_id: ChannelId::new(10),
            },
            player: PlayerHandle { guild_id, id: 1 },
            playback,
        }
    }

    #[test]
    fn playlist_rejects_empty_list() {
        assert!(Playlist::new(Vec::new()).is_none());
    }

    #[test]
    fn playlist_rotation_moves_head_to_tail() {
        let mut playlist = Playlist::new([file("a"), file("b"), file("c")]).unwrap();
        playlist.rotate();

        assert_eq!(playlist.head(), &file("b"));
        assert_eq!(
            playlist.files().cloned().collect::<Vec<_>>(),
            vec![file("b"), file("c"), file("a")]
        );
    }

    #[test]
    fn tracks_compare_structurally() {
        let a = Track::new("Song", "https://example.com/a").with_thumbnail("t.jpg");
        let b = Track::new("Song", "https://example.com/a").with_thumbnail("t.jpg");
        assert_eq!(a, b);
        assert_ne!(a, Track::new("Song", "https://example.com/a"));
    }

    #[test]
    fn disconnected_has_no_dependencies() {
        assert_eq!(SessionState::Disconnected.message_dependencies(), None);
    }

    #[test]
    fn dependencies_ignore_pending_events() {
        let mut music = MusicPlayback::new(ChannelId::new(20));
        music.queue.push_back(Track::new("One", "https://example.com/1"));
        let state = SessionState::Connecting(active(PlaybackValue::Music(music.clone())));

        music.common.pending_events.push("aviso".to_string());
        let noisy = SessionState::Connecting(active(PlaybackValue::Music(music)));

        assert_eq!(state.message_dependencies(), noisy.message_dependencies());
    }

    #[test]
    fn dependencies_track_stage_and_pause() {
        let music = PlaybackValue::Music(MusicPlayback::new(ChannelId::new(20)));
        let connecting = SessionState::Connecting(active(music.clone()));
        let connected = SessionState::Connected {
            session: active(music),
            subscription: None,
        };
        assert_ne!(
            connecting.message_dependencies(),
            connected.message_dependencies()
        );

        let mut paused = connected.clone();
        if let SessionState::Connected { session, .. } = &mut paused {
            session.playback.common_mut().is_paused = true;
        }
        assert_ne!(connected.message_dependencies(), paused.message_dependencies());
    }
}
