//! Channel lifecycle as a pure state machine.
//!
//! Socket callbacks, timer callbacks and UI triggers arrive as [`ChannelEvent`]s; the machine
//! mutates its state and answers with [`ChannelCommand`]s for the runtime to execute. Nothing
//! here touches a socket or a clock.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::backoff::ReconnectPolicy;
use super::classifier::InboundMessage;
use super::endpoint::ChannelEndpoint;
use super::frame::WsFrame;
use super::heartbeat::TextHeartbeat;
use super::types::{ChannelKind, ConnectionState, SocketId, TimerId};
use super::visibility::{Visibility, needs_reconnect};

/// Inputs to the channel state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The consuming component mounted with this subject id.
    Mount { subject: String },
    /// Explicit request to (re)open the channel.
    Connect,
    Opened { socket: SocketId },
    Inbound {
        socket: SocketId,
        message: InboundMessage,
    },
    Errored { socket: SocketId, error: String },
    Closed { socket: SocketId, reason: String },
    ReconnectDue { timer: TimerId },
    HeartbeatTick { timer: TimerId },
    Visibility(Visibility),
    /// The consuming component unmounted.
    Unmount,
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCommand {
    Connect { socket: SocketId, url: String },
    /// Close without reporting back; the socket is already forgotten.
    CloseSocket { socket: SocketId },
    /// Close and feed `Closed` back into the machine.
    ForceClose { socket: SocketId, reason: String },
    ScheduleReconnect { timer: TimerId, delay: Duration },
    CancelReconnect,
    StartHeartbeat { timer: TimerId, interval: Duration },
    StopHeartbeat,
    Send { socket: SocketId, frame: WsFrame },
    Deliver(InboundMessage),
    /// Release consumer-owned UI artifacts (active toasts).
    Teardown,
}

/// Mutable backoff bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub retry_count: u32,
    pub last_delay: Option<Duration>,
    pub reconnect_timer: Option<TimerId>,
    pub heartbeat_timer: Option<TimerId>,
}

/// Static description of one channel.
#[derive(Clone, Debug)]
pub struct ChannelProfile {
    pub kind: ChannelKind,
    pub endpoint: ChannelEndpoint,
    pub heartbeat: Option<TextHeartbeat>,
}

pub struct ChannelMachine<R>
where
    R: ReconnectPolicy,
{
    profile: ChannelProfile,
    policy: R,
    state: ConnectionState,
    subject: Option<String>,
    socket: Option<SocketId>,
    retry: RetryState,
    next_id: u64,
    connect_attempts: u64,
    reconnects_scheduled: u64,
}

impl<R> ChannelMachine<R>
where
    R: ReconnectPolicy,
{
    pub fn new(profile: ChannelProfile, policy: R) -> Self {
        Self {
            profile,
            policy,
            state: ConnectionState::Closed,
            subject: None,
            socket: None,
            retry: RetryState::default(),
            next_id: 0,
            connect_attempts: 0,
            reconnects_scheduled: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn socket(&self) -> Option<SocketId> {
        self.socket
    }

    pub fn retry(&self) -> &RetryState {
        &self.retry
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn profile(&self) -> &ChannelProfile {
        &self.profile
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    pub fn reconnects_scheduled(&self) -> u64 {
        self.reconnects_scheduled
    }

    pub fn is_current(&self, socket: SocketId) -> bool {
        self.socket == Some(socket)
    }

    fn label(&self) -> &'static str {
        self.profile.kind.as_str()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    pub fn reduce(&mut self, event: ChannelEvent) -> Vec<ChannelCommand> {
        let mut out = Vec::new();
        match event {
            ChannelEvent::Mount { subject } => self.on_mount(subject, &mut out),
            ChannelEvent::Connect => self.open(&mut out),
            ChannelEvent::Opened { socket } => self.on_opened(socket, &mut out),
            ChannelEvent::Inbound { socket, message } => {
                if self.is_current(socket) && self.state.is_open() {
                    out.push(ChannelCommand::Deliver(message));
                } else {
                    debug!(channel = self.label(), socket, "dropping frame from stale socket");
                }
            }
            ChannelEvent::Errored { socket, error } => {
                if self.is_current(socket) {
                    debug!(channel = self.label(), socket, error = %error, "socket error; forcing close");
                    out.push(ChannelCommand::ForceClose {
                        socket,
                        reason: error,
                    });
                }
            }
            ChannelEvent::Closed { socket, reason } => self.on_closed(socket, reason, &mut out),
            ChannelEvent::ReconnectDue { timer } => {
                if self.retry.reconnect_timer != Some(timer) {
                    debug!(channel = self.label(), timer, "ignoring stale reconnect timer");
                    return out;
                }
                self.retry.reconnect_timer = None;
                self.open(&mut out);
            }
            ChannelEvent::HeartbeatTick { timer } => {
                if self.retry.heartbeat_timer != Some(timer) || !self.state.is_open() {
                    return out;
                }
                if let (Some(socket), Some(heartbeat)) = (self.socket, self.profile.heartbeat.as_ref()) {
                    out.push(ChannelCommand::Send {
                        socket,
                        frame: heartbeat.create_ping(),
                    });
                }
            }
            ChannelEvent::Visibility(visibility) => {
                if needs_reconnect(visibility, self.state, self.socket.is_some()) {
                    info!(channel = self.label(), state = ?self.state, "page visible; reopening channel");
                    self.open(&mut out);
                }
            }
            ChannelEvent::Unmount => self.on_unmount(&mut out),
        }
        out
    }

    fn on_mount(&mut self, subject: String, out: &mut Vec<ChannelCommand>) {
        if self.state == ConnectionState::ManuallyClosed {
            self.state = ConnectionState::Closed;
        }
        self.clear_timers(out);
        self.retry = RetryState::default();
        let subject = subject.trim().to_string();
        self.subject = (!subject.is_empty()).then_some(subject);

        match self.target_url() {
            Some(url) => self.open_url(url, out),
            None => {
                // The previous socket belongs to the old subject.
                if let Some(socket) = self.socket.take() {
                    out.push(ChannelCommand::CloseSocket { socket });
                }
                self.state = ConnectionState::Closed;
            }
        }
    }

    /// Open a channel: guarded by subject presence, replaces any prior socket/timers.
    fn open(&mut self, out: &mut Vec<ChannelCommand>) {
        if self.state == ConnectionState::ManuallyClosed {
            debug!(channel = self.label(), "open ignored: channel manually closed");
            return;
        }
        if let Some(url) = self.target_url() {
            self.open_url(url, out);
        }
    }

    fn target_url(&self) -> Option<String> {
        let Some(subject) = self.subject.as_deref() else {
            debug!(channel = self.label(), "open ignored: no subject id");
            return None;
        };
        match self.profile.endpoint.resolve(subject) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(channel = self.label(), error = %err, "cannot build channel url");
                None
            }
        }
    }

    fn open_url(&mut self, url: String, out: &mut Vec<ChannelCommand>) {
        self.clear_timers(out);
        if let Some(previous) = self.socket.take() {
            out.push(ChannelCommand::CloseSocket { socket: previous });
        }

        let socket = self.allocate_id();
        self.socket = Some(socket);
        self.state = ConnectionState::Connecting;
        self.connect_attempts = self.connect_attempts.saturating_add(1);
        out.push(ChannelCommand::Connect { socket, url });
    }

    fn on_opened(&mut self, socket: SocketId, out: &mut Vec<ChannelCommand>) {
        if !self.is_current(socket) {
            out.push(ChannelCommand::CloseSocket { socket });
            return;
        }
        self.state = ConnectionState::Open;
        self.retry.retry_count = 0;
        self.retry.last_delay = None;
        info!(channel = self.label(), socket, "channel open");

        if let Some(heartbeat) = self.profile.heartbeat.as_ref() {
            let interval = heartbeat.interval();
            if self.retry.heartbeat_timer.take().is_some() {
                out.push(ChannelCommand::StopHeartbeat);
            }
            let timer = self.allocate_id();
            self.retry.heartbeat_timer = Some(timer);
            out.push(ChannelCommand::StartHeartbeat { timer, interval });
        }
    }

    fn on_closed(&mut self, socket: SocketId, reason: String, out: &mut Vec<ChannelCommand>) {
        if !self.is_current(socket) {
            debug!(channel = self.label(), socket, "ignoring close of stale socket");
            return;
        }
        self.socket = None;
        out.push(ChannelCommand::CloseSocket { socket });
        if self.retry.heartbeat_timer.take().is_some() {
            out.push(ChannelCommand::StopHeartbeat);
        }
        if self.state == ConnectionState::ManuallyClosed {
            return;
        }

        self.retry.retry_count = self.retry.retry_count.saturating_add(1);
        let attempt = self.retry.retry_count;
        match self.policy.next_delay(attempt) {
            Some(delay) => {
                if self.retry.reconnect_timer.take().is_some() {
                    out.push(ChannelCommand::CancelReconnect);
                }
                let timer = self.allocate_id();
                self.retry.reconnect_timer = Some(timer);
                self.retry.last_delay = Some(delay);
                self.state = ConnectionState::Reconnecting;
                self.reconnects_scheduled = self.reconnects_scheduled.saturating_add(1);
                warn!(
                    channel = self.label(),
                    socket,
                    reason = %reason,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "channel closed; reconnect scheduled"
                );
                out.push(ChannelCommand::ScheduleReconnect { timer, delay });
            }
            None => {
                self.state = ConnectionState::Closed;
                warn!(
                    channel = self.label(),
                    socket,
                    reason = %reason,
                    attempt,
                    "channel closed; retry budget exhausted"
                );
            }
        }
    }

    fn on_unmount(&mut self, out: &mut Vec<ChannelCommand>) {
        self.state = ConnectionState::ManuallyClosed;
        self.clear_timers(out);
        if let Some(socket) = self.socket.take() {
            out.push(ChannelCommand::CloseSocket { socket });
        }
        self.retry = RetryState::default();
        out.push(ChannelCommand::Teardown);
        info!(channel = self.label(), "channel manually closed");
    }

    fn clear_timers(&mut self, out: &mut Vec<ChannelCommand>) {
        if self.retry.reconnect_timer.take().is_some() {
            out.push(ChannelCommand::CancelReconnect);
        }
        if self.retry.heartbeat_timer.take().is_some() {
            out.push(ChannelCommand::StopHeartbeat);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backoff::ExponentialBackoff;
    use bytes::Bytes;

    fn alerts_machine() -> ChannelMachine<ExponentialBackoff> {
        ChannelMachine::new(
            ChannelProfile {
                kind: ChannelKind::Alerts,
                endpoint: ChannelEndpoint::new(
                    "wss://crm.example.com",
                    "/api/v1/ws/notification/{subject}",
                ),
                heartbeat: Some(TextHeartbeat::default()),
            },
            ExponentialBackoff::alerts(),
        )
    }

    fn unread_machine() -> ChannelMachine<ExponentialBackoff> {
        ChannelMachine::new(
            ChannelProfile {
                kind: ChannelKind::Unread,
                endpoint: ChannelEndpoint::new("wss://crm.example.com", "/ws/notify?u={subject}"),
                heartbeat: None,
            },
            ExponentialBackoff::unread(),
        )
    }

    fn connect_socket(commands: &[ChannelCommand]) -> SocketId {
        commands
            .iter()
            .find_map(|c| match c {
                ChannelCommand::Connect { socket, .. } => Some(*socket),
                _ => None,
            })
            .expect("connect command")
    }

    fn reconnect_timer(commands: &[ChannelCommand]) -> (TimerId, Duration) {
        commands
            .iter()
            .find_map(|c| match c {
                ChannelCommand::ScheduleReconnect { timer, delay } => Some((*timer, *delay)),
                _ => None,
            })
            .expect("reconnect scheduled")
    }

    fn heartbeat_timer(commands: &[ChannelCommand]) -> TimerId {
        commands
            .iter()
            .find_map(|c| match c {
                ChannelCommand::StartHeartbeat { timer, .. } => Some(*timer),
                _ => None,
            })
            .expect("heartbeat started")
    }

    fn closed(socket: SocketId) -> ChannelEvent {
        ChannelEvent::Closed {
            socket,
            reason: "test".to_string(),
        }
    }

    fn mount(machine: &mut ChannelMachine<ExponentialBackoff>) -> SocketId {
        let commands = machine.reduce(ChannelEvent::Mount {
            subject: "EMP7".to_string(),
        });
        connect_socket(&commands)
    }

    #[test]
    fn mount_requires_subject() {
        let mut machine = alerts_machine();
        let commands = machine.reduce(ChannelEvent::Mount {
            subject: "  ".to_string(),
        });
        assert!(commands.is_empty());
        assert_eq!(machine.state(), ConnectionState::Closed);
        assert!(machine.reduce(ChannelEvent::Connect).is_empty());
    }

    #[test]
    fn mount_builds_url_and_connects() {
        let mut machine = alerts_machine();
        let commands = machine.reduce(ChannelEvent::Mount {
            subject: "EMP7".to_string(),
        });
        assert_eq!(
            commands,
            vec![ChannelCommand::Connect {
                socket: 1,
                url: "wss://crm.example.com/api/v1/ws/notification/EMP7".to_string(),
            }]
        );
        assert_eq!(machine.state(), ConnectionState::Connecting);
    }

    #[test]
    fn open_close_schedules_single_reconnect_with_retry_one() {
        let mut machine = alerts_machine();
        let socket = mount(&mut machine);

        let commands = machine.reduce(ChannelEvent::Opened { socket });
        heartbeat_timer(&commands);
        assert_eq!(machine.state(), ConnectionState::Open);

        let commands = machine.reduce(closed(socket));
        assert!(commands.contains(&ChannelCommand::CloseSocket { socket }));
        assert!(commands.contains(&ChannelCommand::StopHeartbeat));
        let (timer, delay) = reconnect_timer(&commands);
        assert_eq!(
            commands
                .iter()
                .filter(|c| matches!(c, ChannelCommand::ScheduleReconnect { .. }))
                .count(),
            1
        );
        assert!(delay >= Duration::from_millis(2_000));
        assert!(delay <= Duration::from_millis(2_500));
        assert_eq!(machine.state(), ConnectionState::Reconnecting);
        assert_eq!(machine.retry().retry_count, 1);

        let commands = machine.reduce(ChannelEvent::ReconnectDue { timer });
        let next = connect_socket(&commands);
        assert_ne!(next, socket);
        assert_eq!(machine.retry().retry_count, 1);
        assert_eq!(machine.connect_attempts(), 2);
    }

    #[test]
    fn retry_count_resets_on_open() {
        let mut machine = unread_machine();
        let mut socket = mount(&mut machine);
        for _ in 0..4 {
            let (timer, _) = reconnect_timer(&machine.reduce(closed(socket)));
            socket = connect_socket(&machine.reduce(ChannelEvent::ReconnectDue { timer }));
        }
        assert_eq!(machine.retry().retry_count, 4);
        machine.reduce(ChannelEvent::Opened { socket });
        assert_eq!(machine.retry().retry_count, 0);
        assert_eq!(machine.retry().last_delay, None);
    }

    #[test]
    fn alerts_channel_stops_after_retry_ceiling() {
        let mut machine = alerts_machine();
        let mut socket = mount(&mut machine);
        for attempt in 1..=10u32 {
            let (timer, delay) = reconnect_timer(&machine.reduce(closed(socket)));
            assert!(delay >= ExponentialBackoff::alerts().base_delay(attempt));
            socket = connect_socket(&machine.reduce(ChannelEvent::ReconnectDue { timer }));
        }

        let commands = machine.reduce(closed(socket));
        assert!(
            !commands
                .iter()
                .any(|c| matches!(c, ChannelCommand::ScheduleReconnect { .. }))
        );
        assert_eq!(machine.state(), ConnectionState::Closed);
        assert_eq!(machine.retry().retry_count, 11);
        assert!(machine.retry().reconnect_timer.is_none());
    }

    #[test]
    fn unread_channel_retries_indefinitely() {
        let mut machine = unread_machine();
        let mut socket = mount(&mut machine);
        for _ in 0..40 {
            let (timer, delay) = reconnect_timer(&machine.reduce(closed(socket)));
            assert!(delay <= Duration::from_millis(20_250));
            socket = connect_socket(&machine.reduce(ChannelEvent::ReconnectDue { timer }));
        }
        assert_eq!(machine.retry().retry_count, 40);
    }

    #[test]
    fn error_forces_close_which_then_reconnects() {
        let mut machine = unread_machine();
        let socket = mount(&mut machine);
        let commands = machine.reduce(ChannelEvent::Errored {
            socket,
            error: "refused".to_string(),
        });
        assert_eq!(
            commands,
            vec![ChannelCommand::ForceClose {
                socket,
                reason: "refused".to_string(),
            }]
        );
        reconnect_timer(&machine.reduce(closed(socket)));
    }

    #[test]
    fn unmount_is_terminal() {
        let mut machine = alerts_machine();
        let socket = mount(&mut machine);
        let (timer, _) = reconnect_timer(&machine.reduce(closed(socket)));

        let commands = machine.reduce(ChannelEvent::Unmount);
        assert!(commands.contains(&ChannelCommand::CancelReconnect));
        assert!(commands.contains(&ChannelCommand::Teardown));
        assert_eq!(machine.state(), ConnectionState::ManuallyClosed);

        assert!(machine.reduce(ChannelEvent::ReconnectDue { timer }).is_empty());
        assert!(machine.reduce(ChannelEvent::Connect).is_empty());
        assert!(
            machine
                .reduce(ChannelEvent::Visibility(Visibility::Visible))
                .is_empty()
        );
        assert_eq!(machine.state(), ConnectionState::ManuallyClosed);
    }

    #[test]
    fn unmount_closes_live_socket_and_stops_heartbeat() {
        let mut machine = alerts_machine();
        let socket = mount(&mut machine);
        machine.reduce(ChannelEvent::Opened { socket });

        let commands = machine.reduce(ChannelEvent::Unmount);
        assert_eq!(
            commands,
            vec![
                ChannelCommand::StopHeartbeat,
                ChannelCommand::CloseSocket { socket },
                ChannelCommand::Teardown,
            ]
        );
        // A close event that races the unmount never reschedules.
        assert!(machine.reduce(closed(socket)).is_empty());
    }

    #[test]
    fn remount_after_unmount_reconnects_with_fresh_retry_state() {
        let mut machine = alerts_machine();
        let socket = mount(&mut machine);
        machine.reduce(closed(socket));
        machine.reduce(ChannelEvent::Unmount);

        mount(&mut machine);
        assert_eq!(machine.state(), ConnectionState::Connecting);
        assert_eq!(machine.retry().retry_count, 0);
    }

    #[test]
    fn remount_with_empty_subject_closes_open_socket() {
        let mut machine = alerts_machine();
        let socket = mount(&mut machine);
        let timer = heartbeat_timer(&machine.reduce(ChannelEvent::Opened { socket }));

        let commands = machine.reduce(ChannelEvent::Mount {
            subject: String::new(),
        });
        assert_eq!(
            commands,
            vec![
                ChannelCommand::StopHeartbeat,
                ChannelCommand::CloseSocket { socket },
            ]
        );
        assert_eq!(machine.state(), ConnectionState::Closed);
        assert_eq!(machine.socket(), None);
        assert_eq!(machine.subject(), None);
        assert!(machine.retry().reconnect_timer.is_none());
        assert!(machine.reduce(ChannelEvent::HeartbeatTick { timer }).is_empty());
        // The socket is already forgotten, so its close never schedules a retry.
        assert!(machine.reduce(closed(socket)).is_empty());
    }

    #[test]
    fn remount_with_unresolvable_url_closes_open_socket() {
        let mut machine = ChannelMachine::new(
            ChannelProfile {
                kind: ChannelKind::Unread,
                endpoint: ChannelEndpoint::new("wss://crm.example.com", "/ws/notify?u={subject}"),
                heartbeat: None,
            },
            ExponentialBackoff::unread(),
        );
        let socket = mount(&mut machine);
        machine.reduce(ChannelEvent::Opened { socket });
        // Swap in a profile whose base URL cannot be a websocket endpoint.
        machine.profile.endpoint = ChannelEndpoint::new("https://crm.example.com", "/ws/notify?u={subject}");

        let commands = machine.reduce(ChannelEvent::Mount {
            subject: "EMP8".to_string(),
        });
        assert_eq!(commands, vec![ChannelCommand::CloseSocket { socket }]);
        assert_eq!(machine.state(), ConnectionState::Closed);
    }

    #[test]
    fn remount_with_new_subject_replaces_socket() {
        let mut machine = alerts_machine();
        let socket = mount(&mut machine);
        machine.reduce(ChannelEvent::Opened { socket });

        let commands = machine.reduce(ChannelEvent::Mount {
            subject: "EMP8".to_string(),
        });
        assert!(commands.contains(&ChannelCommand::StopHeartbeat));
        assert!(commands.contains(&ChannelCommand::CloseSocket { socket }));
        assert!(commands.contains(&ChannelCommand::Connect {
            socket: socket + 2,
            url: "wss://crm.example.com/api/v1/ws/notification/EMP8".to_string(),
        }));
        assert_eq!(machine.state(), ConnectionState::Connecting);
    }

    #[test]
    fn heartbeat_sends_ping_only_while_open() {
        let mut machine = alerts_machine();
        let socket = mount(&mut machine);
        let timer = heartbeat_timer(&machine.reduce(ChannelEvent::Opened { socket }));

        assert_eq!(
            machine.reduce(ChannelEvent::HeartbeatTick { timer }),
            vec![ChannelCommand::Send {
                socket,
                frame: WsFrame::text_static("ping"),
            }]
        );

        machine.reduce(closed(socket));
        assert!(machine.reduce(ChannelEvent::HeartbeatTick { timer }).is_empty());
    }

    #[test]
    fn unread_channel_has_no_heartbeat() {
        let mut machine = unread_machine();
        let socket = mount(&mut machine);
        let commands = machine.reduce(ChannelEvent::Opened { socket });
        assert!(commands.is_empty());
    }

    #[test]
    fn inbound_is_delivered_only_from_current_open_socket() {
        let mut machine = unread_machine();
        let socket = mount(&mut machine);
        let message = InboundMessage {
            kind: Some("notify.snapshot".to_string()),
            payload: Bytes::from_static(b"{}"),
            received_at_ms: 1,
        };

        machine.reduce(ChannelEvent::Opened { socket });
        assert_eq!(
            machine.reduce(ChannelEvent::Inbound {
                socket,
                message: message.clone(),
            }),
            vec![ChannelCommand::Deliver(message.clone())]
        );
        assert!(
            machine
                .reduce(ChannelEvent::Inbound {
                    socket: socket + 100,
                    message,
                })
                .is_empty()
        );
    }

    #[test]
    fn visibility_reopens_only_when_not_open() {
        let mut machine = alerts_machine();
        let socket = mount(&mut machine);
        machine.reduce(ChannelEvent::Opened { socket });
        assert!(
            machine
                .reduce(ChannelEvent::Visibility(Visibility::Visible))
                .is_empty()
        );

        let (timer, _) = reconnect_timer(&machine.reduce(closed(socket)));
        assert!(
            machine
                .reduce(ChannelEvent::Visibility(Visibility::Hidden))
                .is_empty()
        );

        let commands = machine.reduce(ChannelEvent::Visibility(Visibility::Visible));
        assert_eq!(commands[0], ChannelCommand::CancelReconnect);
        connect_socket(&commands);
        // The superseded timer can no longer open a competing socket.
        assert!(machine.reduce(ChannelEvent::ReconnectDue { timer }).is_empty());
    }

    #[test]
    fn replacing_a_socket_closes_the_previous_one() {
        let mut machine = alerts_machine();
        let first = mount(&mut machine);
        let commands = machine.reduce(ChannelEvent::Connect);
        assert_eq!(commands[0], ChannelCommand::CloseSocket { socket: first });
        let second = connect_socket(&commands);

        // A late open from the replaced socket is rejected.
        assert_eq!(
            machine.reduce(ChannelEvent::Opened { socket: first }),
            vec![ChannelCommand::CloseSocket { socket: first }]
        );
        assert_eq!(machine.socket(), Some(second));
        assert_eq!(machine.state(), ConnectionState::Connecting);
    }

    #[test]
    fn visibility_revives_exhausted_channel_once() {
        let mut machine = alerts_machine();
        let mut socket = mount(&mut machine);
        for _ in 1..=10 {
            let (timer, _) = reconnect_timer(&machine.reduce(closed(socket)));
            socket = connect_socket(&machine.reduce(ChannelEvent::ReconnectDue { timer }));
        }
        machine.reduce(closed(socket));
        assert_eq!(machine.state(), ConnectionState::Closed);

        let revived = connect_socket(&machine.reduce(ChannelEvent::Visibility(Visibility::Visible)));
        machine.reduce(ChannelEvent::Opened { socket: revived });
        assert_eq!(machine.retry().retry_count, 0);
    }
}
