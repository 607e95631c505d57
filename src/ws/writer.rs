use std::ops::ControlFlow;

use futures_util::{Sink, SinkExt};
use kameo::error::ActorStopReason;
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, PanicError, WeakActorRef};
use tracing::{debug, error};

use crate::core::{WebSocketError, WebSocketResult, WsFrame};

/// Owns the transport writer of one socket and serializes writes to it.
///
/// One writer actor exists per socket; replacing the socket stops the old writer.
pub struct WsWriterActor<W>
where
    W: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    writer: W,
    closed: bool,
}

impl<W> WsWriterActor<W>
where
    W: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            closed: false,
        }
    }
}

impl<W> Actor for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    type Args = Self;
    type Error = WebSocketError;

    async fn on_start(args: Self::Args, _ctx: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(args)
    }

    async fn on_panic(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        err: PanicError,
    ) -> Result<ControlFlow<ActorStopReason>, Self::Error> {
        error!(target: "push-ws-writer", error = ?err, "websocket writer stopped");
        Ok(ControlFlow::Break(ActorStopReason::Panicked(err)))
    }
}

#[derive(Clone, Debug)]
pub struct WriterWrite {
    pub frame: WsFrame,
}

impl<W> KameoMessage<WriterWrite> for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        msg: WriterWrite,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if self.closed {
            return Err(WebSocketError::InvalidState("writer closed".to_string()));
        }
        debug!(target: "push-ws-writer", "sending websocket frame to wire");
        self.writer.send(msg.frame).await
    }
}

/// Send a close frame and close the sink. Failures are logged, not returned.
#[derive(Clone, Copy, Debug)]
pub struct WriterClose;

impl<W> KameoMessage<WriterClose> for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        _msg: WriterClose,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.writer.feed(WsFrame::Close(None)).await;
        if let Err(err) = self.writer.close().await {
            debug!(target: "push-ws-writer", error = %err, "websocket close failed");
        }
        Ok(())
    }
}
