//! Reusable test utilities for driving push channels without a real socket.
//!
//! [`MockTransport::listener`] returns the transport handed to a channel plus a
//! [`MockListener`] that yields one [`MockServer`] per successful connect, so tests can observe
//! reconnects, push frames and drop sockets from the server side.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Sink, Stream};
use tokio::sync::mpsc;

use crate::core::{WebSocketBufferConfig, WebSocketError, WsFrame};
use crate::transport::{WsTransport, WsTransportConnectFuture};

struct MockShared {
    accept_tx: mpsc::UnboundedSender<MockServer>,
    attempts: AtomicUsize,
    refuse: AtomicBool,
}

/// A transport backed by in-memory channels.
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<MockShared>,
}

impl MockTransport {
    /// Build a transport + listener pair.
    pub fn listener() -> (Self, MockListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            Self {
                shared: Arc::new(MockShared {
                    accept_tx,
                    attempts: AtomicUsize::new(0),
                    refuse: AtomicBool::new(false),
                }),
            },
            MockListener { accept_rx },
        )
    }

    /// Every `connect` call so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::Acquire)
    }

    /// While set, connects fail the way an unreachable host would.
    pub fn set_refuse(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::Release);
    }
}

impl WsTransport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn connect(
        &self,
        url: String,
        _buffers: WebSocketBufferConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer> {
        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            shared.attempts.fetch_add(1, Ordering::AcqRel);
            if shared.refuse.load(Ordering::Acquire) {
                return Err(WebSocketError::ConnectionFailed(format!(
                    "{url}: connection refused"
                )));
            }

            let (sent_tx, sent_rx) = mpsc::unbounded_channel::<WsFrame>();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<WsFrame>();
            let server = MockServer {
                url,
                outbound_rx: sent_rx,
                inbound_tx: Some(inbound_tx),
            };
            shared.accept_tx.send(server).map_err(|_| {
                WebSocketError::ConnectionFailed("mock listener dropped".to_string())
            })?;
            Ok((MockReader { rx: inbound_rx }, MockWriter { sent_tx }))
        })
    }
}

/// Receives the server side of every connection made through a [`MockTransport`].
pub struct MockListener {
    accept_rx: mpsc::UnboundedReceiver<MockServer>,
}

impl MockListener {
    pub async fn accept(&mut self) -> Option<MockServer> {
        self.accept_rx.recv().await
    }

    pub async fn accept_timeout(&mut self, timeout: Duration) -> Option<MockServer> {
        tokio::time::timeout(timeout, self.accept_rx.recv())
            .await
            .unwrap_or_default()
    }

    /// Non-blocking check for a pending connection.
    pub fn try_accept(&mut self) -> Option<MockServer> {
        self.accept_rx.try_recv().ok()
    }
}

/// Why a frame could not be pushed to the client.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum MockServerError {
    #[error("mock socket already dropped")]
    SocketDropped,
    #[error("mock channel reader is gone")]
    ChannelClosed,
}

/// Server-side handle of one mock connection.
pub struct MockServer {
    url: String,
    outbound_rx: mpsc::UnboundedReceiver<WsFrame>,
    inbound_tx: Option<mpsc::UnboundedSender<WsFrame>>,
}

impl MockServer {
    /// URL the client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Receive a frame written by the channel.
    pub async fn recv_outbound(&mut self) -> Option<WsFrame> {
        self.outbound_rx.recv().await
    }

    pub async fn recv_outbound_timeout(&mut self, timeout: Duration) -> Option<WsFrame> {
        tokio::time::timeout(timeout, self.outbound_rx.recv())
            .await
            .unwrap_or_default()
    }

    pub fn send_inbound(&self, frame: WsFrame) -> Result<(), MockServerError> {
        let Some(tx) = self.inbound_tx.as_ref() else {
            return Err(MockServerError::SocketDropped);
        };
        tx.send(frame).map_err(|_| MockServerError::ChannelClosed)
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), MockServerError> {
        self.send_inbound(WsFrame::text(text))
    }

    /// Simulate an abrupt server-side drop: the client reader sees end-of-stream.
    pub fn drop_socket(&mut self) {
        self.inbound_tx = None;
    }

    /// Make every later client write fail while the socket stays readable.
    pub fn fail_writes(&mut self) {
        self.outbound_rx.close();
    }

    /// Whether the client has stopped reading this socket.
    pub fn is_closed_by_client(&self) -> bool {
        self.inbound_tx.as_ref().is_none_or(|tx| tx.is_closed())
    }
}

/// Reader side for [`MockTransport`].
pub struct MockReader {
    rx: mpsc::UnboundedReceiver<WsFrame>,
}

impl Stream for MockReader {
    type Item = Result<WsFrame, WebSocketError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

/// Writer side for [`MockTransport`].
pub struct MockWriter {
    sent_tx: mpsc::UnboundedSender<WsFrame>,
}

impl Sink<WsFrame> for MockWriter {
    type Error = WebSocketError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsFrame) -> Result<(), Self::Error> {
        self.get_mut()
            .sent_tx
            .send(item)
            .map_err(|_| WebSocketError::TransportError {
                context: "mock_write",
                error: "server side of the mock socket is gone".to_string(),
            })
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
