use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream};

use crate::core::{WebSocketBufferConfig, WebSocketError, WsFrame};

pub mod tungstenite;

/// Boxed future returned by [`WsTransport::connect`].
pub type WsTransportConnectFuture<R, W> =
    Pin<Box<dyn Future<Output = Result<(R, W), WebSocketError>> + Send>>;

/// Transport boundary for websocket IO.
///
/// The channel actor owns lifecycle state; the transport only produces a split reader/writer
/// pair per connection attempt. Every reconnect calls `connect` again.
pub trait WsTransport: Clone + Send + Sync + 'static {
    type Reader: Stream<Item = Result<WsFrame, WebSocketError>> + Send + Unpin + 'static;
    type Writer: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static;

    fn connect(
        &self,
        url: String,
        buffers: WebSocketBufferConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer>;
}
