//! Kameo actor that drives one push channel.
//!
//! The actor mailbox serializes socket callbacks, timer callbacks and UI events. Lifecycle
//! decisions live in [`ChannelMachine`]; the actor only executes the commands it returns and
//! feeds the results back in as events. Socket reads run in a separate reader task that
//! classifies frames before they reach the mailbox.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::StreamExt;
use kameo::error::{ActorStopReason, SendError};
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, WeakActorRef};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use super::handler::{AlertsHandler, PushHandler, UnreadHandler};
use super::writer::{WriterClose, WriterWrite, WsWriterActor};
use crate::core::{
    ChannelCommand, ChannelEvent, ChannelMachine, ChannelProfile, ChannelStats, Classification,
    MessageClassifier, NotificationRecord, ReconnectPolicy, SocketId, TimerId, ToastId, ToastSink,
    WebSocketBufferConfig, WebSocketError, WebSocketResult, WsCloseFrame, WsFrame,
};
use crate::transport::WsTransport;

/// Arguments passed when constructing a channel actor.
pub struct ChannelActorArgs<H, R, T>
where
    H: PushHandler,
    R: ReconnectPolicy,
    T: WsTransport,
{
    pub profile: ChannelProfile,
    pub policy: R,
    pub handler: H,
    pub transport: T,
    pub buffers: WebSocketBufferConfig,
    /// Receives `true` only while the channel is open.
    pub connected_tx: watch::Sender<bool>,
}

struct LiveSocket<W>
where
    W: futures_util::Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    id: SocketId,
    writer: ActorRef<WsWriterActor<W>>,
    reader_task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

pub struct ChannelActor<H, R, T>
where
    H: PushHandler,
    R: ReconnectPolicy,
    T: WsTransport,
{
    machine: ChannelMachine<R>,
    handler: H,
    transport: T,
    buffers: WebSocketBufferConfig,
    classifier: MessageClassifier,
    actor_ref: ActorRef<Self>,
    connecting: Option<(SocketId, JoinHandle<()>)>,
    live: Option<LiveSocket<T::Writer>>,
    reconnect_task: Option<JoinHandle<()>>,
    heartbeat_task: Option<JoinHandle<()>>,
    connected_tx: watch::Sender<bool>,
    messages: u64,
}

impl<H, R, T> Actor for ChannelActor<H, R, T>
where
    H: PushHandler,
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Args = ChannelActorArgs<H, R, T>;
    type Error = WebSocketError;

    fn name() -> &'static str {
        "ChannelActor"
    }

    async fn on_start(args: Self::Args, ctx: ActorRef<Self>) -> WebSocketResult<Self> {
        let ChannelActorArgs {
            profile,
            policy,
            handler,
            transport,
            buffers,
            connected_tx,
        } = args;

        connected_tx.send_replace(false);

        Ok(Self {
            machine: ChannelMachine::new(profile, policy),
            handler,
            transport,
            buffers,
            classifier: MessageClassifier::new(),
            actor_ref: ctx,
            connecting: None,
            live: None,
            reconnect_task: None,
            heartbeat_task: None,
            connected_tx,
            messages: 0,
        })
    }

    async fn on_stop(
        &mut self,
        _ctx: WeakActorRef<Self>,
        _reason: ActorStopReason,
    ) -> WebSocketResult<()> {
        abort_task(&mut self.reconnect_task);
        abort_task(&mut self.heartbeat_task);
        if let Some((_, task)) = self.connecting.take() {
            task.abort();
        }
        if let Some(live) = self.live.take() {
            shutdown_socket(live).await;
        }
        self.connected_tx.send_replace(false);
        Ok(())
    }
}

fn abort_task(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}

async fn shutdown_socket<W>(live: LiveSocket<W>)
where
    W: futures_util::Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    let _ = live.shutdown_tx.send(true);
    live.reader_task.abort();
    let _ = live.writer.tell(WriterClose).send().await;
    let _ = live.writer.stop_gracefully().await;
}

/// Collapse a mailbox error into the crate error type.
pub(crate) fn flatten_send<M, V>(res: Result<V, SendError<M, WebSocketError>>) -> WebSocketResult<V> {
    match res {
        Ok(value) => Ok(value),
        Err(SendError::HandlerError(err)) => Err(err),
        Err(SendError::ActorNotRunning(_)) | Err(SendError::ActorStopped) => Err(
            WebSocketError::ActorError("channel actor is not running".to_string()),
        ),
        Err(_) => Err(WebSocketError::ActorError(
            "channel actor did not accept the request".to_string(),
        )),
    }
}

impl<H, R, T> ChannelActor<H, R, T>
where
    H: PushHandler,
    R: ReconnectPolicy,
    T: WsTransport,
{
    fn label(&self) -> &'static str {
        self.handler.kind().as_str()
    }

    /// Run one event through the machine, executing commands until no follow-up events remain.
    async fn apply(&mut self, event: ChannelEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for command in self.machine.reduce(event) {
                if let Some(follow_up) = self.execute(command).await {
                    queue.push_back(follow_up);
                }
            }
        }
        let open = self.machine.state().is_open();
        self.connected_tx.send_if_modified(|connected| {
            let changed = *connected != open;
            *connected = open;
            changed
        });
    }

    async fn execute(&mut self, command: ChannelCommand) -> Option<ChannelEvent> {
        match command {
            ChannelCommand::Connect { socket, url } => {
                self.spawn_connect(socket, url);
                None
            }
            ChannelCommand::CloseSocket { socket } => {
                self.close_socket(socket).await;
                None
            }
            ChannelCommand::ForceClose { socket, reason } => {
                self.close_socket(socket).await;
                Some(ChannelEvent::Closed { socket, reason })
            }
            ChannelCommand::ScheduleReconnect { timer, delay } => {
                self.schedule_reconnect(timer, delay);
                None
            }
            ChannelCommand::CancelReconnect => {
                abort_task(&mut self.reconnect_task);
                None
            }
            ChannelCommand::StartHeartbeat { timer, interval } => {
                self.start_heartbeat(timer, interval);
                None
            }
            ChannelCommand::StopHeartbeat => {
                abort_task(&mut self.heartbeat_task);
                None
            }
            ChannelCommand::Send { socket, frame } => self.send(socket, frame).await,
            ChannelCommand::Deliver(message) => {
                self.messages = self.messages.saturating_add(1);
                let now = tokio::time::Instant::now().into_std();
                self.handler.on_message(message, now);
                None
            }
            ChannelCommand::Teardown => {
                self.handler.on_teardown();
                None
            }
        }
    }

    fn spawn_connect(&mut self, socket: SocketId, url: String) {
        if let Some((_, task)) = self.connecting.take() {
            task.abort();
        }

        let actor_ref = self.actor_ref.clone();
        let transport = self.transport.clone();
        let buffers = self.buffers;
        let label = self.label();
        debug!(channel = label, socket, url = %url, "connecting");

        let task = tokio::spawn(async move {
            match transport.connect(url, buffers).await {
                Ok((reader, writer)) => {
                    let _ = actor_ref
                        .tell(SocketReady::<T> {
                            socket,
                            reader,
                            writer,
                        })
                        .send()
                        .await;
                }
                Err(err) => {
                    let _ = actor_ref
                        .tell(ChannelEvent::Errored {
                            socket,
                            error: err.to_string(),
                        })
                        .send()
                        .await;
                }
            }
        });
        self.connecting = Some((socket, task));
    }

    async fn close_socket(&mut self, socket: SocketId) {
        if let Some((pending, task)) = self.connecting.take() {
            if pending == socket {
                task.abort();
            } else {
                self.connecting = Some((pending, task));
            }
        }

        if self.live.as_ref().is_some_and(|live| live.id == socket)
            && let Some(live) = self.live.take()
        {
            debug!(channel = self.label(), socket, "closing socket");
            shutdown_socket(live).await;
        }
    }

    fn schedule_reconnect(&mut self, timer: TimerId, delay: Duration) {
        abort_task(&mut self.reconnect_task);
        let actor_ref = self.actor_ref.clone();
        self.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = actor_ref
                .tell(ChannelEvent::ReconnectDue { timer })
                .send()
                .await;
        }));
    }

    fn start_heartbeat(&mut self, timer: TimerId, interval: Duration) {
        abort_task(&mut self.heartbeat_task);
        if interval.is_zero() {
            warn!(channel = self.label(), "heartbeat interval is zero; heartbeat disabled");
            return;
        }

        let actor_ref = self.actor_ref.clone();
        self.heartbeat_task = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if actor_ref
                    .tell(ChannelEvent::HeartbeatTick { timer })
                    .send()
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    async fn send(&mut self, socket: SocketId, frame: WsFrame) -> Option<ChannelEvent> {
        let live = self.live.as_ref().filter(|live| live.id == socket)?;
        // A failed write must come back as `Errored`.
        match flatten_send(live.writer.ask(WriterWrite { frame }).await) {
            Ok(()) => None,
            Err(err) => {
                let error = err.to_string();
                warn!(channel = self.label(), socket, error = %error, "websocket writer send failed");
                Some(ChannelEvent::Errored { socket, error })
            }
        }
    }

    fn on_socket_ready(&mut self, socket: SocketId, reader: T::Reader, writer: T::Writer) -> bool {
        if self
            .connecting
            .as_ref()
            .is_some_and(|(pending, _)| *pending == socket)
        {
            self.connecting = None;
        }
        if !self.machine.is_current(socket) || self.live.is_some() {
            debug!(channel = self.label(), socket, "discarding superseded connection");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let writer = WsWriterActor::spawn(WsWriterActor::new(writer));
        let reader_task = self.spawn_reader(socket, reader, shutdown_rx);
        self.live = Some(LiveSocket {
            id: socket,
            writer,
            reader_task,
            shutdown_tx,
        });
        true
    }

    fn spawn_reader(
        &self,
        socket: SocketId,
        mut reader: T::Reader,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let actor_ref = self.actor_ref.clone();
        let classifier = self.classifier;
        let label = self.label();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    res = shutdown_rx.changed() => {
                        if res.is_err() || *shutdown_rx.borrow_and_update() { break; }
                    }
                    frame = reader.next() => {
                        let event = match frame {
                            Some(Ok(WsFrame::Close(close))) => {
                                let reason = close
                                    .as_ref()
                                    .map(WsCloseFrame::describe)
                                    .unwrap_or_else(|| "remote closed".to_string());
                                info!(channel = label, socket, reason = %reason, "received websocket close frame");
                                ChannelEvent::Closed { socket, reason }
                            }
                            Some(Ok(frame)) => match classifier.classify(&frame) {
                                Classification::Payload(message) => {
                                    ChannelEvent::Inbound { socket, message }
                                }
                                Classification::Control(tag) => {
                                    debug!(channel = label, socket, tag, "control frame dropped");
                                    continue;
                                }
                                Classification::Protocol => continue,
                                Classification::Malformed(error) => {
                                    debug!(channel = label, socket, error = %error, "malformed frame dropped");
                                    continue;
                                }
                            },
                            Some(Err(err)) => ChannelEvent::Errored {
                                socket,
                                error: err.to_string(),
                            },
                            None => ChannelEvent::Closed {
                                socket,
                                reason: "stream ended".to_string(),
                            },
                        };

                        let terminal = !matches!(event, ChannelEvent::Inbound { .. });
                        if actor_ref.tell(event).send().await.is_err() || terminal {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn stats(&self) -> ChannelStats {
        let retry = self.machine.retry();
        ChannelStats {
            state: self.machine.state(),
            retry_count: retry.retry_count,
            last_delay: retry.last_delay,
            connect_attempts: self.machine.connect_attempts(),
            reconnects_scheduled: self.machine.reconnects_scheduled(),
            messages: self.messages,
        }
    }
}

impl<H, R, T> KameoMessage<ChannelEvent> for ChannelActor<H, R, T>
where
    H: PushHandler,
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        event: ChannelEvent,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.apply(event).await;
        Ok(())
    }
}

/// A connect attempt finished; the reader/writer belong to `socket`.
pub struct SocketReady<T: WsTransport> {
    pub socket: SocketId,
    pub reader: T::Reader,
    pub writer: T::Writer,
}

impl<H, R, T> KameoMessage<SocketReady<T>> for ChannelActor<H, R, T>
where
    H: PushHandler,
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        msg: SocketReady<T>,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let SocketReady {
            socket,
            reader,
            writer,
        } = msg;
        if self.on_socket_ready(socket, reader, writer) {
            self.apply(ChannelEvent::Opened { socket }).await;
        }
        Ok(())
    }
}

pub struct GetChannelStats;

impl<H, R, T> KameoMessage<GetChannelStats> for ChannelActor<H, R, T>
where
    H: PushHandler,
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Reply = WebSocketResult<ChannelStats>;

    async fn handle(
        &mut self,
        _msg: GetChannelStats,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.stats())
    }
}

/// User dismissed one entry of the notification list.
#[derive(Debug, Clone, Copy)]
pub struct DismissNotification {
    pub index: usize,
}

/// "Clear all" on the notification list.
#[derive(Debug, Clone, Copy)]
pub struct ClearNotifications;

#[derive(Debug, Clone, Copy)]
pub struct SetPanelOpen {
    pub open: bool,
}

/// The toast subsystem closed a ticket (timeout or click).
#[derive(Debug, Clone, Copy)]
pub struct ToastClosed {
    pub id: ToastId,
}

#[derive(Debug, Clone, Copy)]
pub struct GetNotifications;

impl<S, R, T> KameoMessage<DismissNotification> for ChannelActor<AlertsHandler<S>, R, T>
where
    S: ToastSink,
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Reply = WebSocketResult<Option<NotificationRecord>>;

    async fn handle(
        &mut self,
        msg: DismissNotification,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.handler.dismiss(msg.index))
    }
}

impl<S, R, T> KameoMessage<ClearNotifications> for ChannelActor<AlertsHandler<S>, R, T>
where
    S: ToastSink,
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        _msg: ClearNotifications,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.handler.clear();
        Ok(())
    }
}

impl<S, R, T> KameoMessage<SetPanelOpen> for ChannelActor<AlertsHandler<S>, R, T>
where
    S: ToastSink,
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        msg: SetPanelOpen,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.handler.set_panel_open(msg.open);
        Ok(())
    }
}

impl<S, R, T> KameoMessage<ToastClosed> for ChannelActor<AlertsHandler<S>, R, T>
where
    S: ToastSink,
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Reply = WebSocketResult<bool>;

    async fn handle(
        &mut self,
        msg: ToastClosed,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.handler.toast_closed(msg.id))
    }
}

impl<S, R, T> KameoMessage<GetNotifications> for ChannelActor<AlertsHandler<S>, R, T>
where
    S: ToastSink,
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Reply = WebSocketResult<Vec<NotificationRecord>>;

    async fn handle(
        &mut self,
        _msg: GetNotifications,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.handler.buffer().to_vec())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetUnreadCount;

impl<R, T> KameoMessage<GetUnreadCount> for ChannelActor<UnreadHandler, R, T>
where
    R: ReconnectPolicy,
    T: WsTransport,
{
    type Reply = WebSocketResult<u64>;

    async fn handle(
        &mut self,
        _msg: GetUnreadCount,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.handler.value())
    }
}
