//! Ready-to-spawn channel facades used by the rest of the application.
//!
//! Each facade owns the actor ref plus the watch receivers that back the connectivity flag and
//! the badge counts.

use kameo::prelude::{Actor, ActorRef};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::PushConfig;
use crate::core::{
    ChannelEvent, ChannelKind, ChannelStats, ExponentialBackoff, NotificationRecord, ToastId,
    ToastSink, Visibility, WebSocketResult,
};
use crate::transport::WsTransport;
use crate::transport::tungstenite::TungsteniteTransport;
use crate::ws::{
    AlertsHandler, ChannelActor, ChannelActorArgs, ClearNotifications, DismissNotification,
    GetChannelStats, GetNotifications, GetUnreadCount, SetPanelOpen, ToastClosed, UnreadHandler,
    VisibilityTrigger, flatten_send, spawn_visibility_policy,
};

pub type AlertsActor<S, T> = ChannelActor<AlertsHandler<S>, ExponentialBackoff, T>;
pub type UnreadActor<T> = ChannelActor<UnreadHandler, ExponentialBackoff, T>;

/// UI-facing toast commands emitted by [`ChannelToastSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastEvent {
    Show {
        id: ToastId,
        record: NotificationRecord,
    },
    Dismiss {
        id: ToastId,
    },
}

/// Toast sink that forwards show/dismiss requests to a UI task over an unbounded channel.
pub struct ChannelToastSink {
    tx: mpsc::UnboundedSender<ToastEvent>,
    next_id: u64,
}

impl ChannelToastSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ToastEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, next_id: 0 }, rx)
    }
}

impl ToastSink for ChannelToastSink {
    fn show(&mut self, record: &NotificationRecord) -> ToastId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = ToastId(self.next_id);
        // A closed UI receiver just means nobody renders toasts anymore.
        let _ = self.tx.send(ToastEvent::Show {
            id,
            record: record.clone(),
        });
        id
    }

    fn dismiss(&mut self, id: ToastId) {
        let _ = self.tx.send(ToastEvent::Dismiss { id });
    }
}

/// Alerts channel: notification list, toasts and a connectivity flag.
pub struct AlertsChannel<S, T = TungsteniteTransport>
where
    S: ToastSink,
    T: WsTransport,
{
    actor: ActorRef<AlertsActor<S, T>>,
    connected: watch::Receiver<bool>,
    notifications: watch::Receiver<Vec<NotificationRecord>>,
}

impl<S, T> AlertsChannel<S, T>
where
    S: ToastSink,
    T: WsTransport,
{
    pub fn spawn(config: &PushConfig, transport: T, sink: S) -> Self {
        let handler = AlertsHandler::new(config.max_messages, config.toast.policy(), sink);
        let notifications = handler.subscribe();
        let (connected_tx, connected) = watch::channel(false);

        let actor = AlertsActor::spawn(ChannelActorArgs {
            profile: config.profile(ChannelKind::Alerts),
            policy: config.alerts.backoff(),
            handler,
            transport,
            buffers: config.buffers(),
            connected_tx,
        });

        Self {
            actor,
            connected,
            notifications,
        }
    }

    /// Bind the channel to a subject id and open it. Empty ids leave the channel closed.
    pub async fn mount(&self, subject: impl Into<String>) -> WebSocketResult<()> {
        flatten_send(
            self.actor
                .ask(ChannelEvent::Mount {
                    subject: subject.into(),
                })
                .await,
        )
    }

    /// Close for good: no further reconnects, active toasts dismissed.
    pub async fn unmount(&self) -> WebSocketResult<()> {
        flatten_send(self.actor.ask(ChannelEvent::Unmount).await)
    }

    pub async fn set_visibility(&self, visibility: Visibility) -> WebSocketResult<()> {
        flatten_send(self.actor.ask(ChannelEvent::Visibility(visibility)).await)
    }

    pub fn attach_visibility<V>(&self, trigger: V) -> JoinHandle<()>
    where
        V: VisibilityTrigger,
    {
        spawn_visibility_policy(self.actor.clone(), trigger)
    }

    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn notifications(&self) -> watch::Receiver<Vec<NotificationRecord>> {
        self.notifications.clone()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.borrow().len()
    }

    pub async fn list(&self) -> WebSocketResult<Vec<NotificationRecord>> {
        flatten_send(self.actor.ask(GetNotifications).await)
    }

    pub async fn dismiss(&self, index: usize) -> WebSocketResult<Option<NotificationRecord>> {
        flatten_send(self.actor.ask(DismissNotification { index }).await)
    }

    pub async fn clear_all(&self) -> WebSocketResult<()> {
        flatten_send(self.actor.ask(ClearNotifications).await)
    }

    pub async fn set_panel_open(&self, open: bool) -> WebSocketResult<()> {
        flatten_send(self.actor.ask(SetPanelOpen { open }).await)
    }

    pub async fn toast_closed(&self, id: ToastId) -> WebSocketResult<bool> {
        flatten_send(self.actor.ask(ToastClosed { id }).await)
    }

    pub async fn stats(&self) -> WebSocketResult<ChannelStats> {
        flatten_send(self.actor.ask(GetChannelStats).await)
    }

    pub fn actor_ref(&self) -> &ActorRef<AlertsActor<S, T>> {
        &self.actor
    }
}

/// Chat channel: server-authoritative unread badge plus a connectivity flag.
pub struct UnreadChannel<T = TungsteniteTransport>
where
    T: WsTransport,
{
    actor: ActorRef<UnreadActor<T>>,
    connected: watch::Receiver<bool>,
    unread: watch::Receiver<u64>,
}

impl<T> UnreadChannel<T>
where
    T: WsTransport,
{
    pub fn spawn(config: &PushConfig, transport: T) -> Self {
        let handler = UnreadHandler::new();
        let unread = handler.subscribe();
        let (connected_tx, connected) = watch::channel(false);

        let actor = UnreadActor::spawn(ChannelActorArgs {
            profile: config.profile(ChannelKind::Unread),
            policy: config.unread.backoff(),
            handler,
            transport,
            buffers: config.buffers(),
            connected_tx,
        });

        Self {
            actor,
            connected,
            unread,
        }
    }

    pub async fn mount(&self, subject: impl Into<String>) -> WebSocketResult<()> {
        flatten_send(
            self.actor
                .ask(ChannelEvent::Mount {
                    subject: subject.into(),
                })
                .await,
        )
    }

    pub async fn unmount(&self) -> WebSocketResult<()> {
        flatten_send(self.actor.ask(ChannelEvent::Unmount).await)
    }

    pub async fn set_visibility(&self, visibility: Visibility) -> WebSocketResult<()> {
        flatten_send(self.actor.ask(ChannelEvent::Visibility(visibility)).await)
    }

    pub fn attach_visibility<V>(&self, trigger: V) -> JoinHandle<()>
    where
        V: VisibilityTrigger,
    {
        spawn_visibility_policy(self.actor.clone(), trigger)
    }

    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn unread(&self) -> watch::Receiver<u64> {
        self.unread.clone()
    }

    pub fn unread_count(&self) -> u64 {
        *self.unread.borrow()
    }

    pub async fn refresh_unread(&self) -> WebSocketResult<u64> {
        flatten_send(self.actor.ask(GetUnreadCount).await)
    }

    pub async fn stats(&self) -> WebSocketResult<ChannelStats> {
        flatten_send(self.actor.ask(GetChannelStats).await)
    }

    pub fn actor_ref(&self) -> &ActorRef<UnreadActor<T>> {
        &self.actor
    }
}
