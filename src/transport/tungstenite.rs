use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Sink, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, accept_async as tungstenite_accept,
    connect_async_tls_with_config as tungstenite_connect_tls,
    tungstenite::{
        Message as NativeMessage, Utf8Bytes,
        protocol::{CloseFrame as NativeCloseFrame, WebSocketConfig},
    },
};
use tracing::debug;

use crate::core::{WebSocketBufferConfig, WebSocketError, WsCloseFrame, WsFrame};
use crate::transport::{WsTransport, WsTransportConnectFuture};

type TungsteniteStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// rustls 0.23 needs a process-level CryptoProvider before the first TLS config is built.
fn install_rustls_crypto_provider() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        // Err means another provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

fn transport_error(context: &'static str, err: impl ToString) -> WebSocketError {
    WebSocketError::TransportError {
        context,
        error: err.to_string(),
    }
}

fn close_from_native(frame: Option<NativeCloseFrame>) -> Option<WsCloseFrame> {
    frame.map(|f| WsCloseFrame {
        code: u16::from(f.code),
        reason: AsRef::<Bytes>::as_ref(&f.reason).clone(),
    })
}

fn utf8_or_none(bytes: Bytes) -> Option<Utf8Bytes> {
    Utf8Bytes::try_from(bytes).ok()
}

fn close_to_native(frame: WsCloseFrame) -> NativeCloseFrame {
    NativeCloseFrame {
        code: frame.code.into(),
        reason: utf8_or_none(frame.reason).unwrap_or_else(|| Utf8Bytes::from_static("")),
    }
}

fn frame_from_native(msg: NativeMessage) -> WsFrame {
    match msg {
        NativeMessage::Text(text) => WsFrame::Text(AsRef::<Bytes>::as_ref(&text).clone()),
        NativeMessage::Binary(bytes) => WsFrame::Binary(bytes),
        NativeMessage::Ping(bytes) => WsFrame::Ping(bytes),
        NativeMessage::Pong(bytes) => WsFrame::Pong(bytes),
        NativeMessage::Close(frame) => WsFrame::Close(close_from_native(frame)),
        NativeMessage::Frame(_) => WsFrame::Binary(Bytes::new()),
    }
}

fn frame_to_native(frame: WsFrame) -> NativeMessage {
    match frame {
        WsFrame::Text(bytes) => match utf8_or_none(bytes.clone()) {
            Some(text) => NativeMessage::Text(text),
            None => NativeMessage::Binary(bytes),
        },
        WsFrame::Binary(bytes) => NativeMessage::Binary(bytes),
        WsFrame::Ping(bytes) => NativeMessage::Ping(bytes),
        WsFrame::Pong(bytes) => NativeMessage::Pong(bytes),
        WsFrame::Close(frame) => NativeMessage::Close(frame.map(close_to_native)),
    }
}

fn tungstenite_config(buffers: WebSocketBufferConfig) -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(buffers.max_message_bytes))
        .max_frame_size(Some(buffers.max_frame_bytes))
        .write_buffer_size(buffers.write_buffer_bytes)
        .max_write_buffer_size(buffers.max_write_buffer_bytes)
}

/// tokio-tungstenite backed transport. Handles both `ws://` and `wss://` URLs.
#[derive(Clone, Default)]
pub struct TungsteniteTransport {
    connector: Option<Connector>,
}

impl TungsteniteTransport {
    pub fn with_connector(connector: Connector) -> Self {
        Self {
            connector: Some(connector),
        }
    }

    pub fn rustls(config: Arc<rustls::ClientConfig>) -> Self {
        Self::with_connector(Connector::Rustls(config))
    }
}

pub struct TungsteniteReader {
    inner: futures_util::stream::SplitStream<TungsteniteStream>,
}

impl Stream for TungsteniteReader {
    type Item = Result<WsFrame, WebSocketError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx).map(|next| {
            next.map(|res| {
                res.map(frame_from_native)
                    .map_err(|err| transport_error("read", err))
            })
        })
    }
}

pub struct TungsteniteWriter {
    inner: futures_util::stream::SplitSink<TungsteniteStream, NativeMessage>,
}

impl Sink<WsFrame> for TungsteniteWriter {
    type Error = WebSocketError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner)
            .poll_ready(cx)
            .map_err(|e| transport_error("write", e))
    }

    fn start_send(mut self: Pin<&mut Self>, item: WsFrame) -> Result<(), Self::Error> {
        Pin::new(&mut self.inner)
            .start_send(frame_to_native(item))
            .map_err(|e| transport_error("write", e))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner)
            .poll_flush(cx)
            .map_err(|e| transport_error("write", e))
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner)
            .poll_close(cx)
            .map_err(|e| transport_error("write", e))
    }
}

fn split(stream: TungsteniteStream) -> (TungsteniteReader, TungsteniteWriter) {
    let (write, read) = stream.split();
    (
        TungsteniteReader { inner: read },
        TungsteniteWriter { inner: write },
    )
}

impl WsTransport for TungsteniteTransport {
    type Reader = TungsteniteReader;
    type Writer = TungsteniteWriter;

    fn connect(
        &self,
        url: String,
        buffers: WebSocketBufferConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer> {
        let connector = self.connector.clone();
        Box::pin(async move {
            install_rustls_crypto_provider();
            debug!(url = %url, "opening websocket");

            let (stream, response) =
                tungstenite_connect_tls(url, Some(tungstenite_config(buffers)), true, connector)
                    .await
                    .map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))?;
            debug!(status = %response.status(), "websocket handshake complete");

            Ok(split(stream))
        })
    }
}

/// Accept an incoming plain websocket connection, split the same way as a client connection.
///
/// Used by loopback tests and local push servers.
pub async fn accept_async(
    stream: TcpStream,
) -> Result<(TungsteniteReader, TungsteniteWriter), WebSocketError> {
    let ws = tungstenite_accept(MaybeTlsStream::Plain(stream))
        .await
        .map_err(|err| WebSocketError::ConnectionFailed(err.to_string()))?;
    Ok(split(ws))
}
