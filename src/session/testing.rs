//! Recording connector for session tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use super::{
    lifecycle::{LifecycleEvent, LifecycleSink},
    queue::Completion,
};
use crate::connector::{
    AudioResource, ConnectorError, MessageRef, PlayerHandle, StatusView, Subscription, ThreadRef,
    VoiceConnection, VoiceConnector,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorCall {
    Join(ChannelId),
    CreatePlayer,
    Subscribe,
    Play(AudioResource),
    Pause,
    Unpause,
    Stop,
    ReleasePlayer,
    Destroy,
    SendMessage(ChannelId),
    EditMessage(MessageId),
    DeleteMessage(MessageId),
    StartThread(MessageId),
    ThreadMessage(String),
    DeleteThread(ChannelId),
}

pub struct FakeConnector {
    calls: Mutex<Vec<ConnectorCall>>,
    sinks: Mutex<Vec<LifecycleSink>>,
    last_view: Mutex<Option<StatusView>>,
    unplayable: Mutex<HashSet<AudioResource>>,
    /// Players allocated and not yet released, with their link state.
    players: Mutex<HashMap<u64, bool>>,
    next_id: AtomicU64,
    fail_join: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_start_thread: AtomicBool,
    fail_delete_thread: AtomicBool,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            sinks: Mutex::new(Vec::new()),
            last_view: Mutex::new(None),
            unplayable: Mutex::new(HashSet::new()),
            players: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1000),
            fail_join: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            fail_start_thread: AtomicBool::new(false),
            fail_delete_thread: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<ConnectorCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count(&self, predicate: impl Fn(&ConnectorCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Players handed out and never released.
    pub fn live_players(&self) -> usize {
        self.players.lock().len()
    }

    pub fn last_view(&self) -> Option<StatusView> {
        self.last_view.lock().clone()
    }

    /// Fires `event` through the sink of the most recent episode.
    pub fn emit(&self, event: LifecycleEvent) -> Option<Completion> {
        let sink = self.sinks.lock().last().cloned()?;
        sink.emit(event)
    }

    /// Fires `event` through the first sink ever handed out.
    pub fn emit_first(&self, event: LifecycleEvent) -> Option<Completion> {
        let sink = self.sinks.lock().first().cloned()?;
        sink.emit(event)
    }

    pub fn fail_join(&self, fail: bool) {
        self.fail_join.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_start_thread(&self, fail: bool) {
        self.fail_start_thread.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete_thread(&self, fail: bool) {
        self.fail_delete_thread.store(fail, Ordering::SeqCst);
    }

    pub fn make_unplayable(&self, resource: AudioResource) {
        self.unplayable.lock().insert(resource);
    }

    fn record(&self, call: ConnectorCall) {
        self.calls.lock().push(call);
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn join_voice_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: LifecycleSink,
    ) -> Result<VoiceConnection, ConnectorError> {
        self.record(ConnectorCall::Join(channel_id));
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(ConnectorError::PermissionDenied("CONNECT".to_string()));
        }
        self.sinks.lock().push(events);
        Ok(VoiceConnection {
            guild_id,
            channel_id,
        })
    }

    async fn create_audio_player(
        &self,
        guild_id: GuildId,
        _events: LifecycleSink,
    ) -> Result<PlayerHandle, ConnectorError> {
        self.record(ConnectorCall::CreatePlayer);
        let id = self.next_id();
        self.players.lock().insert(id, false);
        Ok(PlayerHandle { guild_id, id })
    }

    async fn subscribe(
        &self,
        _connection: &VoiceConnection,
        player: &PlayerHandle,
    ) -> Option<Subscription> {
        self.record(ConnectorCall::Subscribe);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return None;
        }
        *self.players.lock().get_mut(&player.id)? = true;
        Some(Subscription {
            guild_id: player.guild_id,
            player_id: player.id,
        })
    }

    async fn play(
        &self,
        player: &PlayerHandle,
        resource: AudioResource,
    ) -> Result<(), ConnectorError> {
        self.record(ConnectorCall::Play(resource.clone()));
        match self.players.lock().get(&player.id) {
            None => return Err(ConnectorError::UnknownPlayer(player.id)),
            Some(false) => return Err(ConnectorError::NotLinked),
            Some(true) => {}
        }
        if self.unplayable.lock().contains(&resource) {
            return Err(ConnectorError::Other("recurso corrupto".to_string()));
        }
        Ok(())
    }

    async fn pause(&self, _player: &PlayerHandle) -> bool {
        self.record(ConnectorCall::Pause);
        true
    }

    async fn unpause(&self, _player: &PlayerHandle) -> bool {
        self.record(ConnectorCall::Unpause);
        true
    }

    async fn stop(&self, _player: &PlayerHandle) -> bool {
        self.record(ConnectorCall::Stop);
        true
    }

    async fn release_player(&self, player: &PlayerHandle) {
        self.record(ConnectorCall::ReleasePlayer);
        self.players.lock().remove(&player.id);
    }

    async fn destroy(&self, _connection: &VoiceConnection) -> Result<(), ConnectorError> {
        self.record(ConnectorCall::Destroy);
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        view: &StatusView,
    ) -> Result<MessageRef, ConnectorError> {
        self.record(ConnectorCall::SendMessage(channel_id));
        *self.last_view.lock() = Some(view.clone());
        Ok(MessageRef {
            channel_id,
            message_id: MessageId::new(self.next_id()),
        })
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        view: &StatusView,
    ) -> Result<(), ConnectorError> {
        self.record(ConnectorCall::EditMessage(message.message_id));
        *self.last_view.lock() = Some(view.clone());
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), ConnectorError> {
        self.record(ConnectorCall::DeleteMessage(message.message_id));
        Ok(())
    }

    async fn start_thread(
        &self,
        message: &MessageRef,
        _name: &str,
    ) -> Result<ThreadRef, ConnectorError> {
        self.record(ConnectorCall::StartThread(message.message_id));
        if self.fail_start_thread.load(Ordering::SeqCst) {
            return Err(ConnectorError::PermissionDenied(
                "CREATE_PUBLIC_THREADS".to_string(),
            ));
        }
        Ok(ThreadRef {
            thread_id: ChannelId::new(self.next_id()),
        })
    }

    async fn send_thread_message(
        &self,
        _thread: &ThreadRef,
        content: &str,
    ) -> Result<(), ConnectorError> {
        self.record(ConnectorCall::ThreadMessage(content.to_string()));
        Ok(())
    }

    async fn delete_thread(&self, thread: &ThreadRef) -> bool {
        self.record(ConnectorCall::DeleteThread(thread.thread_id));
        !self.fail_delete_thread.load(Ordering::SeqCst)
    }
}
